use std::collections::HashSet;

use kube::discovery::{ApiCapabilities, ApiResource, verbs};
use kube::{Client, Discovery};

use crate::error::WatcherError;

pub type DiscoveryList = Vec<(ApiResource, ApiCapabilities)>;

/// Runs a full Kubernetes API discovery pass and returns one `(ApiResource, ApiCapabilities)`
/// per kind, taking each API group's recommended (highest-priority) version so the caller
/// never has to deal with the same kind showing up at two versions at once.
pub async fn discover(client: &Client) -> Result<DiscoveryList, WatcherError> {
    let discovery = Discovery::new(client.clone()).run().await?;
    Ok(convert_to_vector(&discovery))
}

#[inline]
fn convert_to_vector(discovery: &Discovery) -> DiscoveryList {
    discovery
        .groups()
        .flat_map(|group| group.recommended_resources())
        .collect()
}

/// Resources this observer can actually watch: the kind supports both `list` and `watch`,
/// and it isn't in `exclude_kind`.
///
/// Mirrors the original implementation's kind exclusion, applied once per discovery pass
/// rather than per object. Label filtering (`--filter`) is a separate concern: it narrows
/// which *objects* of a watched kind come back, so it is applied to the watch itself
/// (`watcher::Config::labels`), not to which kinds get watched.
pub fn watchable(resources: DiscoveryList, exclude_kind: &HashSet<String>) -> DiscoveryList {
    resources
        .into_iter()
        .filter(|(resource, capabilities)| {
            capabilities.supports_operation(verbs::LIST) && capabilities.supports_operation(verbs::WATCH) && !exclude_kind.contains(&resource.kind)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use kube::discovery::Scope;

    use super::*;

    fn resource(kind: &str, group: &str) -> (ApiResource, ApiCapabilities) {
        let resource = ApiResource {
            group: group.to_owned(),
            version: "v1".to_owned(),
            api_version: format!("{group}/v1"),
            kind: kind.to_owned(),
            plural: kind.to_lowercase(),
            namespaced: true,
            verbs: vec![],
            shortnames: vec![],
            subresources: vec![],
        };
        let capabilities = ApiCapabilities {
            scope: Scope::Namespaced,
            subresources: vec![],
            operations: vec![verbs::LIST.to_owned(), verbs::WATCH.to_owned(), verbs::GET.to_owned()],
        };
        (resource, capabilities)
    }

    #[test]
    fn excludes_configured_kinds() {
        let resources = vec![resource("Pod", ""), resource("Secret", "")];
        let excluded = HashSet::from(["Secret".to_owned()]);

        let kept = watchable(resources, &excluded);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0.kind, "Pod");
    }
}
