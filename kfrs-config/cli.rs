use clap::Parser;
use std::time::Duration;

use crate::APP_NAME;

fn parse_duration(value: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(value)
}

/// `katafygio-rs` continuously mirrors a Kubernetes cluster's live objects into
/// a local git-versioned directory of YAML files.
#[derive(Parser, Debug)]
#[command(name = APP_NAME, version, about, long_about = None)]
pub struct Args {
    /// Local directory used both as the on-disk mirror and the git working tree.
    #[arg(long, default_value = "./kubernetes-backup")]
    pub local_dir: String,

    /// Git remote URL to clone from and push to. Left empty, a local-only repository is used.
    #[arg(long, default_value = "")]
    pub git_url: String,

    /// Resource kind to exclude from observation (repeatable).
    #[arg(long = "exclude-kind")]
    pub exclude_kind: Vec<String>,

    /// Specific object to exclude, as `kind/namespace/name` (repeatable).
    #[arg(long = "exclude-object")]
    pub exclude_object: Vec<String>,

    /// Label selector applied to every watched kind.
    #[arg(long, default_value = "")]
    pub filter: String,

    /// Informer relist and discovery interval.
    #[arg(long, value_parser = parse_duration, default_value = "60s")]
    pub resync_interval: Duration,

    /// TCP port for the `/health` endpoint.
    #[arg(long, default_value_t = 8080)]
    pub healthcheck_port: u16,

    /// Explicit Kubernetes API server URL. Left empty, discovered from the kubeconfig/in-cluster config.
    #[arg(long, default_value = "")]
    pub api_server: String,

    /// Path to the kubeconfig file (defaults to `$KUBECONFIG` or `~/.kube/config`).
    #[arg(long, env = "KUBECONFIG")]
    pub kube_config: Option<String>,

    /// Disable all filesystem and git mutations; useful for audits and tests.
    #[arg(long)]
    pub dry_run: bool,

    /// Minimum log level (`trace`, `debug`, `info`, `warn`, `error`, or an `EnvFilter` expression).
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Where log lines are written: `stderr` (default) or a file path.
    #[arg(long, default_value = "stderr")]
    pub log_output: String,
}
