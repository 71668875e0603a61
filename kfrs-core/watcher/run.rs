use futures::{StreamExt, TryStreamExt};
use kube::api::{Api, DynamicObject};
use kube::runtime::reflector::{self, reflector};
use kube::runtime::watcher::{self, DefaultBackoff, Event, watcher};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::model::ResourceKey;
use crate::stream_backoff::StreamBackoff;
use crate::watcher::queue::RetryQueue;

/// Runs one kind's watch stream until cancelled, pushing every observed change's key onto
/// `queue` and keeping `writer`'s informer cache in sync with what passes through.
///
/// Built on [`kube::runtime::watcher`], which already retries the underlying list+watch
/// cycle on disconnect and replays a full relist as a burst of `Apply` events; [`StreamBackoff`]
/// adds the pause between retries without resetting on the `Init` event that precedes them.
/// [`reflector`] observes the same stream transparently, caching the last-seen state of every
/// object so the queue's worker can resolve a key back into an object later.
///
/// `ready` fires once, on the first `InitDone`, signalling that the initial cache sync for
/// this kind has completed.
pub async fn watch_kind(
    kind: String,
    api: Api<DynamicObject>,
    config: watcher::Config,
    writer: reflector::store::Writer<DynamicObject>,
    queue: RetryQueue,
    cancellation_token: CancellationToken,
    mut ready: Option<oneshot::Sender<()>>,
) {
    let mut stream = reflector(writer, StreamBackoff::new(watcher(api, config), DefaultBackoff::default())).boxed();

    loop {
        let event = tokio::select! {
            () = cancellation_token.cancelled() => break,
            event = stream.try_next() => event,
        };

        match event {
            Ok(Some(event)) => {
                if matches!(event, Event::InitDone) {
                    if let Some(sender) = ready.take() {
                        let _ = sender.send(());
                    }
                }
                handle_event(&kind, event, &queue);
            },
            Ok(None) => break,
            Err(error) => {
                tracing::warn!(%kind, %error, "watch stream error");
            },
        }
    }
}

/// Enqueues the key of every changed object. Add/Update/Delete collapse naturally since only
/// the key travels through the queue; the worker re-derives the current action from the
/// informer cache when it dequeues the key.
fn handle_event(kind: &str, event: Event<DynamicObject>, queue: &RetryQueue) {
    match event {
        Event::Init | Event::InitDone => {},
        Event::InitApply(object) | Event::Apply(object) | Event::Delete(object) => {
            queue.push(ResourceKey::from_object(kind, &object));
        },
    }
}
