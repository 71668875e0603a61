use std::collections::{HashMap, HashSet};
use std::time::Duration;

use kube::discovery::ApiResource;
use kube::runtime::watcher;
use kube::Client;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use kfrs_common::tasks::wait_for_task;
use kfrs_common::ResettableBackoff;

use crate::bus::EventSender;
use crate::client::dynamic_api;
use crate::discovery;
use crate::model::GroupVersionKind;
use crate::watcher::KindWatcher;

const GRACE_PERIOD: Duration = Duration::from_secs(10);

pub struct ObserverConfig {
    pub exclude_kind: HashSet<String>,
    pub filter: Option<String>,
    pub resync_interval: Duration,
}

/// Owns the discovery loop and the pool of per-kind [`KindWatcher`]s it keeps in sync with
/// the cluster's API surface.
///
/// On every discovery tick, newly-visible watchable kinds get a watcher started and kinds
/// that disappeared (CRD uninstalled, `exclude_kind` changed) get theirs stopped. Mirrors the
/// original implementation's periodic controller registration pass, generalized from a
/// fixed controller list to an arbitrary discovered set.
pub struct Observer {
    cancellation_token: CancellationToken,
    task: JoinHandle<()>,
}

impl Observer {
    pub fn start(client: Client, config: ObserverConfig, bus: EventSender) -> Self {
        let cancellation_token = CancellationToken::new();
        let task_token = cancellation_token.clone();

        let task = tokio::spawn(async move {
            run(client, config, bus, task_token).await;
        });

        Self { cancellation_token, task }
    }

    pub async fn stop(self) {
        self.cancellation_token.cancel();
        wait_for_task(Some(self.task), "observer", GRACE_PERIOD).await;
    }
}

async fn run(client: Client, config: ObserverConfig, bus: EventSender, cancellation_token: CancellationToken) {
    let mut watchers: HashMap<GroupVersionKind, KindWatcher> = HashMap::new();
    let mut backoff = ResettableBackoff::default();
    let mut next_interval = config.resync_interval;

    while !cancellation_token.is_cancelled() {
        let resources = match discovery::discover(&client).await {
            Ok(resources) => {
                backoff.reset();
                next_interval = config.resync_interval;
                resources
            },
            Err(error) => {
                tracing::warn!(%error, "discovery pass failed, keeping existing watchers");
                next_interval = backoff.next_backoff().unwrap_or(config.resync_interval);
                tokio::select! {
                    () = cancellation_token.cancelled() => break,
                    () = sleep(next_interval) => (),
                }
                continue;
            },
        };
        let wanted = discovery::watchable(resources, &config.exclude_kind);

        reconcile(&client, &mut watchers, wanted, config.filter.as_deref(), &bus).await;

        tokio::select! {
            () = cancellation_token.cancelled() => break,
            () = sleep(next_interval) => (),
        }
    }

    for (_, watcher) in watchers.drain() {
        watcher.stop().await;
    }
}

async fn reconcile(
    client: &Client,
    watchers: &mut HashMap<GroupVersionKind, KindWatcher>,
    wanted: discovery::DiscoveryList,
    filter: Option<&str>,
    bus: &EventSender,
) {
    let mut wanted_keys = HashSet::with_capacity(wanted.len());

    for (resource, _capabilities) in wanted {
        let gvk = GroupVersionKind::from(&resource);
        wanted_keys.insert(gvk.clone());

        if watchers.contains_key(&gvk) {
            continue;
        }

        tracing::info!(kind = %gvk, "starting watcher");
        match start_watcher(client.clone(), &resource, filter, bus.clone()).await {
            Ok(watcher) => {
                watchers.insert(gvk, watcher);
            },
            Err(error) => {
                tracing::error!(kind = %gvk, %error, "watcher failed to become ready, skipping");
            },
        }
    }

    let stale: Vec<GroupVersionKind> = watchers.keys().filter(|gvk| !wanted_keys.contains(*gvk)).cloned().collect();
    for gvk in stale {
        tracing::info!(kind = %gvk, "stopping watcher for kind no longer discovered");
        if let Some(watcher) = watchers.remove(&gvk) {
            watcher.stop().await;
        }
    }
}

async fn start_watcher(client: Client, resource: &ApiResource, filter: Option<&str>, bus: EventSender) -> Result<KindWatcher, crate::error::WatcherError> {
    let api = dynamic_api(client, resource);
    let mut config = watcher::Config::default();
    if let Some(selector) = filter {
        config = config.labels(selector);
    }
    KindWatcher::start(resource.kind.clone(), api, resource.clone(), config, bus).await
}
