use std::time::Duration;
use tokio::task::JoinHandle;

/// Awaits a task's completion, aborting it if it overruns `grace_period`.
///
/// Unlike a synchronous busy-wait this never blocks the executor: it is meant
/// to be `.await`ed from another async task during a component's `stop()`.
pub async fn wait_for_task<T>(task: Option<JoinHandle<T>>, task_name: &str, grace_period: Duration) {
    let Some(task) = task else {
        return;
    };

    if task.is_finished() {
        let _ = task.await;
        return;
    }

    tokio::select! {
        result = &task => {
            if let Err(error) = result
                && error.is_panic()
            {
                tracing::error!("{task_name} task panicked: {error}");
            }
        },
        () = tokio::time::sleep(grace_period) => {
            tracing::warn!("{task_name} task did not stop within {grace_period:?}, aborting");
            task.abort();
            let _ = task.await;
        },
    }
}
