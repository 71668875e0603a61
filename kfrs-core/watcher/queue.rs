use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::model::ResourceKey;

/// Requeues that exceed this many attempts are dropped and logged, mirroring the original
/// implementation's `client-go` workqueue default of giving up on a key after 6 retries.
pub const MAX_PROCESS_RETRY: u8 = 6;

const MIN_RETRY_DELAY: Duration = Duration::from_millis(5);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(1000);

/// Deduplicating retry queue sitting between a kind's raw watch stream and the worker that
/// resolves each key against the informer cache.
///
/// Keys, not objects, flow through this queue: repeated Add/Update/Delete events for the same
/// object collapse into a single pending entry, mirroring a `client-go` workqueue's dirty set.
/// A failed delivery is requeued with a per-key exponential backoff, up to
/// [`MAX_PROCESS_RETRY`] attempts, after which it is dropped and logged rather than retried
/// forever.
#[derive(Clone)]
pub struct RetryQueue {
    sender: mpsc::UnboundedSender<ResourceKey>,
    pending: Arc<Mutex<HashSet<ResourceKey>>>,
}

pub struct RetryQueueHandle {
    receiver: mpsc::UnboundedReceiver<ResourceKey>,
    pending: Arc<Mutex<HashSet<ResourceKey>>>,
}

impl RetryQueue {
    pub fn new() -> (Self, RetryQueueHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(HashSet::new()));
        (
            Self {
                sender,
                pending: pending.clone(),
            },
            RetryQueueHandle { receiver, pending },
        )
    }

    /// Enqueues `key`, unless it is already waiting to be processed.
    pub fn push(&self, key: ResourceKey) {
        let mut pending = self.pending.lock().unwrap_or_else(|poison| poison.into_inner());
        if pending.insert(key.clone()) {
            let _ = self.sender.send(key);
        }
    }
}

/// Drains the queue, calling `process` for each key and requeuing on failure with backoff.
/// Runs until `cancellation_token` fires or every [`RetryQueue`] handle is dropped.
pub async fn run<F, Fut>(mut handle: RetryQueueHandle, queue: RetryQueue, cancellation_token: CancellationToken, process: F)
where
    F: Fn(ResourceKey) -> Fut + Clone,
    Fut: Future<Output = bool>,
{
    let mut attempts: HashMap<ResourceKey, u8> = HashMap::new();

    loop {
        let key = tokio::select! {
            () = cancellation_token.cancelled() => break,
            key = handle.receiver.recv() => match key {
                Some(key) => key,
                None => break,
            },
        };

        // The key has left the channel: a push for the same key from here on must re-enqueue.
        handle.pending.lock().unwrap_or_else(|poison| poison.into_inner()).remove(&key);

        if process.clone()(key.clone()).await {
            attempts.remove(&key);
            continue;
        }

        let attempt = *attempts
            .entry(key.clone())
            .and_modify(|count| *count += 1)
            .or_insert(1);

        if attempt > MAX_PROCESS_RETRY {
            tracing::error!(%key, attempts = attempt, "giving up after too many processing failures");
            attempts.remove(&key);
            continue;
        }

        let delay = retry_delay(attempt);
        let requeue = queue.clone();
        let requeue_cancellation = cancellation_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = requeue_cancellation.cancelled() => (),
                () = sleep(delay) => requeue.push(key),
            }
        });
    }
}

fn retry_delay(attempt: u8) -> Duration {
    let mut backoff = ExponentialBuilder::default()
        .with_min_delay(MIN_RETRY_DELAY)
        .with_max_delay(MAX_RETRY_DELAY)
        .with_max_times(MAX_PROCESS_RETRY as usize)
        .build();

    (0..attempt).filter_map(|_| backoff.next()).last().unwrap_or(MIN_RETRY_DELAY)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Mutex;

    use super::*;

    fn sample_key(name: &str) -> ResourceKey {
        ResourceKey {
            kind: "Pod".into(),
            namespace: Some("default".into()),
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn retries_failed_items_until_success() {
        let (queue, handle) = RetryQueue::new();
        let cancellation_token = CancellationToken::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let attempts_clone = Arc::clone(&attempts);
        let seen_clone = Arc::clone(&seen);
        let worker_token = cancellation_token.clone();
        let worker = tokio::spawn(run(handle, queue.clone(), worker_token, move |key| {
            let attempts = Arc::clone(&attempts_clone);
            let seen = Arc::clone(&seen_clone);
            async move {
                let count = attempts.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    return false;
                }
                seen.lock().await.push(key.name.clone());
                true
            }
        }));

        queue.push(sample_key("web"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancellation_token.cancel();
        let _ = worker.await;

        assert_eq!(seen.lock().await.as_slice(), ["web"]);
        assert!(attempts.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn repeated_push_before_dequeue_collapses_to_one_entry() {
        let (queue, handle) = RetryQueue::new();
        let cancellation_token = CancellationToken::new();
        let seen = Arc::new(AtomicUsize::new(0));

        queue.push(sample_key("web"));
        queue.push(sample_key("web"));
        queue.push(sample_key("web"));

        let seen_clone = Arc::clone(&seen);
        let worker_token = cancellation_token.clone();
        let worker = tokio::spawn(run(handle, queue.clone(), worker_token, move |_key| {
            let seen = Arc::clone(&seen_clone);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            }
        }));

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancellation_token.cancel();
        let _ = worker.await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn retry_delay_stays_within_bounds() {
        for attempt in 1..=MAX_PROCESS_RETRY {
            let delay = retry_delay(attempt);
            assert!(delay >= MIN_RETRY_DELAY);
            assert!(delay <= MAX_RETRY_DELAY);
        }
    }
}
