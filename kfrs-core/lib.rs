pub use self::error::{RecorderError, SupervisorError, VcsError, WatcherError};
pub use self::model::{Action, GroupVersionKind, Notification, ResourceKey};
pub use self::supervisor::run;

pub mod bus;
pub mod canonical;
pub mod client;
pub mod discovery;
pub mod health;
pub mod observer;
pub mod recorder;
pub mod vcs;

mod error;
mod model;
mod stream_backoff;
mod supervisor;
mod watcher;
