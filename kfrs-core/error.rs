use std::path::PathBuf;
use std::time::Duration;

/// Errors reaching into the Kubernetes API: client bootstrap, discovery, and a single
/// kind's watch stream failing to reach an initial cache sync.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    #[error("kubernetes client error: {0}")]
    Kube(#[from] kube::Error),

    #[error("kubernetes config error: {0}")]
    KubeConfig(#[from] kube::config::KubeconfigError),

    #[error("invalid api server url {0:?}: {1}")]
    InvalidApiServer(String, #[source] http::uri::InvalidUri),

    #[error("api discovery error: {0}")]
    Discovery(#[from] kube::discovery::Error),

    #[error("{kind} watcher did not observe an initial cache sync within {timeout:?}")]
    StartupTimeout { kind: String, timeout: Duration },
}

/// Errors writing the mirror directory.
#[derive(thiserror::Error, Debug)]
pub enum RecorderError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("yaml serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Errors running or timing out a `git` subprocess.
#[derive(thiserror::Error, Debug)]
pub enum VcsError {
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git command failed: {0}")]
    Git(String),

    #[error("git command timed out after {0:?}")]
    GitTimeout(Duration),
}

/// Fatal startup failures. The only error type that escapes to `main`.
#[derive(thiserror::Error, Debug)]
pub enum SupervisorError {
    #[error(transparent)]
    Watcher(#[from] WatcherError),

    #[error(transparent)]
    Vcs(#[from] VcsError),

    #[error("health endpoint error: {0}")]
    Health(#[from] std::io::Error),
}
