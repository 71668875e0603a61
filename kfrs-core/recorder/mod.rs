pub use self::fs::{MirrorFs, RealFs};
#[cfg(test)]
pub use self::fs::MockFs;

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use kfrs_common::tasks::wait_for_task;

use crate::bus::EventReceiver;
use crate::canonical;
use crate::model::{Action, Notification, ResourceKey};

mod fs;

const GRACE_PERIOD: Duration = Duration::from_secs(10);

pub struct RecorderConfig {
    pub local_dir: PathBuf,
    pub exclude_object: HashSet<String>,
    pub sweep_interval: Duration,
    pub dry_run: bool,
}

/// Mirrors every [`Notification`] from the bus onto the local directory as canonicalized
/// YAML, one file per object, and periodically sweeps away mirror files whose object no
/// longer exists anywhere upstream.
///
/// Grounded on the original implementation's recorder: `Upsert` writes/overwrites
/// `<kind>-<namespace>-<name>.yaml`, `Delete` removes it, and the sweep only ever touches
/// files this recorder itself could have written (the `.yaml` extension), leaving any other
/// file in the directory (a README, a `.git` tree, stray `.txt` notes) untouched.
pub struct Recorder {
    cancellation_token: CancellationToken,
    task: JoinHandle<()>,
}

impl Recorder {
    pub fn start(config: RecorderConfig, mirror_fs: Arc<dyn MirrorFs>, bus: EventReceiver) -> Self {
        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.clone();

        let task = tokio::spawn(async move {
            run(config, mirror_fs, bus, task_token).await;
        });

        Self { cancellation_token, task }
    }

    pub async fn stop(self) {
        self.cancellation_token.cancel();
        wait_for_task(Some(self.task), "recorder", GRACE_PERIOD).await;
    }
}

async fn run(config: RecorderConfig, mirror_fs: Arc<dyn MirrorFs>, mut bus: EventReceiver, cancellation_token: CancellationToken) {
    let mut known_files: HashSet<PathBuf> = HashSet::new();
    let mut sweep = interval(config.sweep_interval);
    sweep.tick().await; // first tick fires immediately; skip it, the watchers haven't synced yet

    loop {
        tokio::select! {
            () = cancellation_token.cancelled() => break,
            _ = sweep.tick() => sweep_stale_files(&config, &mirror_fs, &known_files).await,
            notification = bus.recv() => match notification {
                Some(notification) => process(&config, &mirror_fs, &mut known_files, notification).await,
                None => break,
            },
        }
    }
}

async fn process(config: &RecorderConfig, mirror_fs: &Arc<dyn MirrorFs>, known_files: &mut HashSet<PathBuf>, notification: Notification) {
    if is_excluded(&config.exclude_object, &notification.key) {
        return;
    }

    let path = config.local_dir.join(format!("{}.yaml", notification.key.file_stem()));

    match notification.action {
        Action::Upsert(object) => {
            known_files.insert(path.clone());
            if config.dry_run {
                tracing::info!(key = %notification.key, "dry-run: would write mirror file");
                return;
            }

            match canonical::to_yaml(object) {
                Ok(yaml) => {
                    if let Err(error) = mirror_fs.write_atomic(&path, &yaml).await {
                        tracing::error!(key = %notification.key, %error, "failed to write mirror file");
                    }
                },
                Err(error) => tracing::error!(key = %notification.key, %error, "failed to canonicalize object"),
            }
        },
        Action::Delete => {
            known_files.remove(&path);
            if config.dry_run {
                tracing::info!(key = %notification.key, "dry-run: would remove mirror file");
                return;
            }

            if let Err(error) = mirror_fs.remove(&path).await {
                tracing::error!(key = %notification.key, %error, "failed to remove mirror file");
            }
        },
    }
}

fn is_excluded(exclude_object: &HashSet<String>, key: &ResourceKey) -> bool {
    let namespace = key.namespace.as_deref().unwrap_or("");
    exclude_object.contains(&format!("{}/{}/{}", key.kind, namespace, key.name))
}

async fn sweep_stale_files(config: &RecorderConfig, mirror_fs: &Arc<dyn MirrorFs>, known_files: &HashSet<PathBuf>) {
    if config.dry_run {
        return;
    }

    let on_disk = match mirror_fs.list_yaml_files(&config.local_dir).await {
        Ok(files) => files,
        Err(error) => {
            tracing::warn!(%error, "failed to list mirror directory during sweep");
            return;
        },
    };

    for stale in on_disk.difference(known_files) {
        tracing::info!(path = %stale.display(), "sweeping obsolete mirror file");
        if let Err(error) = mirror_fs.remove(stale).await {
            tracing::warn!(path = %stale.display(), %error, "failed to sweep mirror file");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use kube::api::{DynamicObject, TypeMeta};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::bus;

    use super::*;

    fn config(dir: PathBuf) -> RecorderConfig {
        RecorderConfig {
            local_dir: dir,
            exclude_object: HashSet::new(),
            sweep_interval: Duration::from_secs(3600),
            dry_run: false,
        }
    }

    fn object(name: &str) -> DynamicObject {
        DynamicObject {
            types: Some(TypeMeta {
                api_version: "v1".into(),
                kind: "Pod".into(),
            }),
            metadata: ObjectMeta {
                name: Some(name.into()),
                namespace: Some("default".into()),
                ..Default::default()
            },
            data: json!({ "spec": {} }),
        }
    }

    #[tokio::test]
    async fn upsert_then_delete_round_trips_on_disk() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path().to_owned());
        let mirror_fs: Arc<dyn MirrorFs> = Arc::new(RealFs);
        let mut known = HashSet::new();

        let key = ResourceKey {
            kind: "Pod".into(),
            namespace: Some("default".into()),
            name: "web".into(),
        };
        let path = cfg.local_dir.join("pod-default-web.yaml");

        process(&cfg, &mirror_fs, &mut known, Notification {
            key: key.clone(),
            action: Action::Upsert(object("web")),
        })
        .await;
        assert!(tokio::fs::metadata(&path).await.is_ok());

        process(&cfg, &mirror_fs, &mut known, Notification {
            key,
            action: Action::Delete,
        })
        .await;
        assert!(tokio::fs::metadata(&path).await.is_err());
    }

    #[tokio::test]
    async fn excluded_object_is_never_written() {
        let dir = tempdir().unwrap();
        let mut cfg = config(dir.path().to_owned());
        cfg.exclude_object.insert("Pod/default/web".into());
        let mirror_fs: Arc<dyn MirrorFs> = Arc::new(RealFs);
        let mut known = HashSet::new();

        process(&cfg, &mirror_fs, &mut known, Notification {
            key: ResourceKey {
                kind: "Pod".into(),
                namespace: Some("default".into()),
                name: "web".into(),
            },
            action: Action::Upsert(object("web")),
        })
        .await;

        assert!(tokio::fs::metadata(cfg.local_dir.join("pod-default-web.yaml")).await.is_err());
    }

    #[tokio::test]
    async fn sweep_removes_unknown_yaml_but_keeps_other_files() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path().to_owned());
        let mirror_fs: Arc<dyn MirrorFs> = Arc::new(RealFs);

        tokio::fs::write(cfg.local_dir.join("roguefile.yaml"), "kind: Old\n").await.unwrap();
        tokio::fs::write(cfg.local_dir.join("notes.txt"), "keep me").await.unwrap();

        sweep_stale_files(&cfg, &mirror_fs, &HashSet::new()).await;

        assert!(tokio::fs::metadata(cfg.local_dir.join("roguefile.yaml")).await.is_err());
        assert!(tokio::fs::metadata(cfg.local_dir.join("notes.txt")).await.is_ok());
    }

    #[tokio::test]
    async fn dry_run_never_touches_disk() {
        let dir = tempdir().unwrap();
        let mut cfg = config(dir.path().to_owned());
        cfg.dry_run = true;
        let mirror_fs: Arc<dyn MirrorFs> = Arc::new(RealFs);
        let mut known = HashSet::new();

        process(&cfg, &mirror_fs, &mut known, Notification {
            key: ResourceKey {
                kind: "Pod".into(),
                namespace: Some("default".into()),
                name: "web".into(),
            },
            action: Action::Upsert(object("web")),
        })
        .await;

        assert!(tokio::fs::metadata(cfg.local_dir.join("pod-default-web.yaml")).await.is_err());
    }

    #[tokio::test]
    async fn failing_filesystem_surfaces_error_without_blocking_bus_delivery() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path().to_owned());
        let mirror_fs: Arc<dyn MirrorFs> = Arc::new(MockFs::failing());

        let (tx, rx) = bus::channel(4);
        let recorder = Recorder::start(cfg, mirror_fs, rx);

        let send = tx.send(Notification {
            key: ResourceKey {
                kind: "Pod".into(),
                namespace: Some("default".into()),
                name: "web".into(),
            },
            action: Action::Upsert(object("web")),
        });
        tokio::time::timeout(Duration::from_secs(1), send).await.unwrap().unwrap();

        drop(tx);
        tokio::time::timeout(Duration::from_secs(1), recorder.stop()).await.unwrap();
    }

    #[tokio::test]
    async fn full_pipeline_through_bus_writes_file() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path().to_owned());
        let mirror_fs: Arc<dyn MirrorFs> = Arc::new(RealFs);

        let (tx, rx) = bus::channel(4);
        let recorder = Recorder::start(cfg, mirror_fs, rx);

        tx.send(Notification {
            key: ResourceKey {
                kind: "Pod".into(),
                namespace: Some("default".into()),
                name: "web".into(),
            },
            action: Action::Upsert(object("web")),
        })
        .await
        .unwrap();

        drop(tx);
        recorder.stop().await;

        assert!(tokio::fs::metadata(dir.path().join("pod-default-web.yaml")).await.is_ok());
    }
}
