use tokio::sync::mpsc;

use crate::model::Notification;

/// Bounded channel carrying [`Notification`]s from every per-kind watcher to the recorder.
///
/// A single bus is shared by the whole watcher pool: each `KindWatcher` holds a clone of
/// the [`EventSender`], the recorder holds the sole [`EventReceiver`].
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

pub type EventSender = mpsc::Sender<Notification>;
pub type EventReceiver = mpsc::Receiver<Notification>;

pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity)
}
