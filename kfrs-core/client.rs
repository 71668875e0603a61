use kube::api::{Api, DynamicObject};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::discovery::ApiResource;
use kube::{Client, Config};

use crate::error::WatcherError;

/// Builds a client from an explicit kubeconfig path/API server, falling back to the
/// standard discovery chain (`$KUBECONFIG`, `~/.kube/config`, in-cluster service account).
pub async fn build_client(kube_config: Option<&str>, api_server: Option<&str>) -> Result<Client, WatcherError> {
    let mut config = match kube_config {
        Some(path) => {
            let kubeconfig = Kubeconfig::read_from(path)?;
            Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default()).await?
        },
        None => Config::infer().await?,
    };

    if let Some(server) = api_server {
        config.cluster_url = server
            .parse::<http::Uri>()
            .map_err(|error| WatcherError::InvalidApiServer(server.to_owned(), error))?;
    }

    Ok(Client::try_from(config)?)
}

/// Builds an all-namespaces [`DynamicObject`] [`Api`] handle for a discovered resource.
///
/// A cluster-wide mirror has no reason to restrict any namespaced kind to a subset of
/// namespaces, so both scopes resolve to the same unrestricted handle.
pub fn dynamic_api(client: Client, resource: &ApiResource) -> Api<DynamicObject> {
    Api::all_with(client, resource)
}
