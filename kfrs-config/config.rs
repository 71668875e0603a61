use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::Args;

pub const APP_NAME: &str = "katafygio-rs";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sweep interval for the recorder's obsolete-file garbage collection, tied to the
/// discovery/resync interval unless overridden here.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Interval between git working tree checks.
pub const DEFAULT_VCS_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Max execution time for any single `git` subprocess invocation.
pub const DEFAULT_VCS_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Resolved, immutable configuration for one run of the observer pipeline.\
/// Built once from parsed CLI [`Args`]; every component borrows from it.
#[derive(Clone, Debug)]
pub struct Config {
    pub local_dir: PathBuf,
    pub git_url: Option<String>,
    pub exclude_kind: HashSet<String>,
    pub exclude_object: HashSet<String>,
    pub filter: Option<String>,
    pub resync_interval: Duration,
    pub sweep_interval: Duration,
    pub vcs_check_interval: Duration,
    pub vcs_command_timeout: Duration,
    pub healthcheck_port: u16,
    pub api_server: Option<String>,
    pub kube_config: Option<String>,
    pub dry_run: bool,
}

impl From<&Args> for Config {
    fn from(args: &Args) -> Self {
        Self {
            local_dir: PathBuf::from(&args.local_dir),
            git_url: non_empty(&args.git_url),
            exclude_kind: args.exclude_kind.iter().cloned().collect(),
            exclude_object: args.exclude_object.iter().cloned().collect(),
            filter: non_empty(&args.filter),
            resync_interval: args.resync_interval,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            vcs_check_interval: DEFAULT_VCS_CHECK_INTERVAL,
            vcs_command_timeout: DEFAULT_VCS_COMMAND_TIMEOUT,
            healthcheck_port: args.healthcheck_port,
            api_server: non_empty(&args.api_server),
            kube_config: args.kube_config.clone(),
            dry_run: args.dry_run,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() { None } else { Some(value.to_owned()) }
}
