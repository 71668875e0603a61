use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use kfrs_common::tasks::wait_for_task;

use crate::error::VcsError;

const GRACE_PERIOD: Duration = Duration::from_secs(10);

pub const DEFAULT_GIT_AUTHOR: &str = "Katafygio";
pub const DEFAULT_GIT_EMAIL: &str = "katafygio@localhost";
pub const DEFAULT_GIT_MESSAGE: &str = "Kubernetes cluster change";

pub struct GitSyncConfig {
    pub local_dir: PathBuf,
    pub git_url: Option<String>,
    pub author: String,
    pub email: String,
    pub message: String,
    pub check_interval: Duration,
    pub command_timeout: Duration,
    pub dry_run: bool,
}

impl GitSyncConfig {
    pub fn new(local_dir: PathBuf, git_url: Option<String>, check_interval: Duration, command_timeout: Duration, dry_run: bool) -> Self {
        Self {
            local_dir,
            git_url,
            author: DEFAULT_GIT_AUTHOR.to_owned(),
            email: DEFAULT_GIT_EMAIL.to_owned(),
            message: DEFAULT_GIT_MESSAGE.to_owned(),
            check_interval,
            command_timeout,
            dry_run,
        }
    }
}

/// Keeps the mirror directory committed (and pushed, if a remote is configured) to git.
///
/// Grounded on the original implementation's git store: `init`/`clone` once on start, then a
/// ticking check that commits any pending change and pushes it, skipping push entirely for a
/// local-only repository (no `git_url`).
pub struct GitSync {
    cancellation_token: CancellationToken,
    task: JoinHandle<()>,
}

impl GitSync {
    pub async fn start(config: GitSyncConfig) -> Result<Self, VcsError> {
        clone_or_init(&config).await?;

        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval(config.check_interval);
            loop {
                tokio::select! {
                    () = task_token.cancelled() => break,
                    _ = ticker.tick() => commit_and_push(&config).await,
                }
            }
        });

        Ok(Self { cancellation_token, task })
    }

    pub async fn stop(self) {
        self.cancellation_token.cancel();
        wait_for_task(Some(self.task), "git sync", GRACE_PERIOD).await;
    }
}

async fn clone_or_init(config: &GitSyncConfig) -> Result<(), VcsError> {
    if !config.dry_run {
        tokio::fs::create_dir_all(&config.local_dir)
            .await
            .map_err(|source| io_error(&config.local_dir, source))?;
    }

    match &config.git_url {
        Some(url) => run_git(config, &["clone", url, "."]).await?,
        None => run_git(config, &["init", &config.local_dir.to_string_lossy()]).await?,
    }

    run_git(config, &["config", "user.name", &config.author]).await?;
    run_git(config, &["config", "user.email", &config.email]).await?;

    Ok(())
}

async fn commit_and_push(config: &GitSyncConfig) {
    match commit(config).await {
        Ok(false) => return,
        Ok(true) => {},
        Err(error) => {
            tracing::warn!(%error, "git commit failed");
            return;
        },
    }

    if config.git_url.is_none() {
        return;
    }

    if let Err(error) = run_git(config, &["push"]).await {
        tracing::warn!(%error, "git push failed");
    }
}

async fn commit(config: &GitSyncConfig) -> Result<bool, VcsError> {
    if !status_has_changes(config).await? {
        return Ok(false);
    }

    run_git(config, &["add", "-A"]).await?;
    run_git(config, &["commit", "-m", &config.message]).await?;
    Ok(true)
}

async fn status_has_changes(config: &GitSyncConfig) -> Result<bool, VcsError> {
    if config.dry_run {
        return Ok(false);
    }

    let output = run_git_output(config, &["status", "--porcelain"]).await?;
    Ok(!output.trim().is_empty())
}

async fn run_git(config: &GitSyncConfig, args: &[&str]) -> Result<(), VcsError> {
    run_git_in(config, &config.local_dir, args).await
}

async fn run_git_in(config: &GitSyncConfig, dir: &Path, args: &[&str]) -> Result<(), VcsError> {
    if config.dry_run {
        return Ok(());
    }

    run_git_output_in(config, dir, args).await.map(|_| ())
}

async fn run_git_output(config: &GitSyncConfig, args: &[&str]) -> Result<String, VcsError> {
    run_git_output_in(config, &config.local_dir, args).await
}

async fn run_git_output_in(config: &GitSyncConfig, dir: &Path, args: &[&str]) -> Result<String, VcsError> {
    let git_dir = config.local_dir.join(".git");
    let mut command = Command::new("git");
    command.args(args).current_dir(dir).env("GIT_DIR", &git_dir);

    let output = tokio::time::timeout(config.command_timeout, command.output())
        .await
        .map_err(|_| VcsError::GitTimeout(config.command_timeout))?
        .map_err(|source| io_error(dir, source))?;

    if !output.status.success() {
        return Err(VcsError::Git(format!(
            "git {} failed with {}: {}",
            args.join(" "),
            output.status,
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn io_error(path: &Path, source: std::io::Error) -> VcsError {
    VcsError::Io {
        path: path.to_owned(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn config(dir: PathBuf) -> GitSyncConfig {
        GitSyncConfig::new(dir, None, Duration::from_millis(50), Duration::from_secs(5), false)
    }

    #[tokio::test]
    async fn clone_or_init_creates_local_repository() {
        let dir = tempdir().unwrap();
        let local_dir = dir.path().join("mirror");
        let cfg = config(local_dir.clone());

        clone_or_init(&cfg).await.unwrap();

        assert!(local_dir.join(".git").is_dir());
    }

    #[tokio::test]
    async fn commit_picks_up_new_file_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let local_dir = dir.path().join("mirror");
        let cfg = config(local_dir.clone());
        clone_or_init(&cfg).await.unwrap();

        tokio::fs::write(local_dir.join("pod-default-web.yaml"), "kind: Pod\n").await.unwrap();

        assert!(commit(&cfg).await.unwrap());
        assert!(!commit(&cfg).await.unwrap());
    }

    #[tokio::test]
    async fn dry_run_never_invokes_git() {
        let dir = tempdir().unwrap();
        let local_dir = dir.path().join("mirror");
        let mut cfg = config(local_dir.clone());
        cfg.dry_run = true;

        clone_or_init(&cfg).await.unwrap();
        assert!(!local_dir.join(".git").exists());
        assert!(!commit(&cfg).await.unwrap());
    }

    #[tokio::test]
    async fn command_timeout_is_surfaced() {
        let dir = tempdir().unwrap();
        let local_dir = dir.path().join("mirror");
        let cfg = config(local_dir.clone());
        clone_or_init(&cfg).await.unwrap();

        let mut timed_out = config(local_dir);
        timed_out.command_timeout = Duration::from_nanos(1);
        let result = run_git(&timed_out, &["status"]).await;

        assert!(matches!(result, Err(VcsError::GitTimeout(_))));
    }
}
