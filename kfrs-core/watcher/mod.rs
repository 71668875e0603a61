pub use self::queue::{MAX_PROCESS_RETRY, RetryQueue};

use kube::api::{Api, DynamicObject};
use kube::discovery::ApiResource;
use kube::runtime::reflector::{self, ObjectRef, Store};
use kube::runtime::watcher;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bus::EventSender;
use crate::error::WatcherError;
use crate::model::{Action, Notification, ResourceKey};
use kfrs_common::tasks::wait_for_task;

mod queue;
mod run;

const GRACE_PERIOD: std::time::Duration = std::time::Duration::from_secs(10);

/// How long a newly started watcher has to observe an initial cache sync before it is
/// considered unhealthy and retired without ever being registered.
const STARTUP_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

/// Watches one Kubernetes kind and forwards every change onto the shared event bus.
///
/// Owns two tasks: the raw `kube::runtime::watcher` stream (wrapped in a [`reflector`] that
/// keeps a local cache of the kind's objects) feeding a [`RetryQueue`] of keys, and a worker
/// that resolves each dequeued key against that cache and sends the result onto the bus,
/// retrying failed sends with backoff. Both tasks are cancelled and joined together on
/// [`KindWatcher::stop`].
pub struct KindWatcher {
    kind: String,
    cancellation_token: CancellationToken,
    watch_task: JoinHandle<()>,
    worker_task: JoinHandle<()>,
}

impl KindWatcher {
    /// Starts both tasks and waits for the first `InitDone` before returning, analogous to
    /// `WaitForCacheSync`. A watcher that never syncs within [`STARTUP_TIMEOUT`] is torn down
    /// and reported as a [`WatcherError::StartupTimeout`] instead of being handed back.
    pub async fn start(
        kind: String,
        api: Api<DynamicObject>,
        resource: ApiResource,
        config: watcher::Config,
        bus: EventSender,
    ) -> Result<Self, WatcherError> {
        let cancellation_token = CancellationToken::new();
        let (queue, handle) = RetryQueue::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let (reader, writer) = reflector::store();

        let watch_task = tokio::spawn(run::watch_kind(
            kind.clone(),
            api,
            config,
            writer,
            queue.clone(),
            cancellation_token.clone(),
            Some(ready_tx),
        ));

        let worker_task = tokio::spawn(queue::run(handle, queue, cancellation_token.clone(), move |key| {
            let bus = bus.clone();
            let reader = reader.clone();
            let resource = resource.clone();
            async move { deliver(&bus, &reader, &resource, key).await }
        }));

        let watcher = Self {
            kind,
            cancellation_token,
            watch_task,
            worker_task,
        };

        match tokio::time::timeout(STARTUP_TIMEOUT, ready_rx).await {
            Ok(Ok(())) => Ok(watcher),
            _ => {
                let kind = watcher.kind.clone();
                watcher.stop().await;
                Err(WatcherError::StartupTimeout {
                    kind,
                    timeout: STARTUP_TIMEOUT,
                })
            },
        }
    }

    pub async fn stop(self) {
        self.cancellation_token.cancel();
        wait_for_task(Some(self.watch_task), &format!("{} watch", self.kind), GRACE_PERIOD).await;
        wait_for_task(Some(self.worker_task), &format!("{} worker", self.kind), GRACE_PERIOD).await;
    }
}

/// Resolves `key` against the informer cache and sends the resulting [`Notification`] onto
/// the bus. The object is present for an upsert, absent for a delete; either way, sending to
/// a closed bus is treated as a no-op rather than a processing failure, since it means the
/// recorder has already shut down.
async fn deliver(bus: &EventSender, store: &Store<DynamicObject>, resource: &ApiResource, key: ResourceKey) -> bool {
    let mut object_ref = ObjectRef::new_with(&key.name, resource.clone());
    if let Some(namespace) = &key.namespace {
        object_ref = object_ref.within(namespace);
    }

    let action = match store.get(&object_ref) {
        Some(object) => Action::Upsert(object),
        None => Action::Delete,
    };

    if bus.send(Notification { key, action }).await.is_err() {
        tracing::debug!("bus closed, dropping notification");
    }
    true
}
