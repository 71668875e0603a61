use kube::api::DynamicObject;

use crate::error::RecorderError;

/// Strips the fields that churn on every read without reflecting an actual spec change,
/// so that two fetches of an unmodified object canonicalize to byte-identical YAML and the
/// recorder's diff against the on-disk mirror stays quiet.
///
/// Mirrors the original implementation's `status`/`selfLink`/`uid`/`resourceVersion`/
/// `generation` cleanup, plus `managedFields` and `creationTimestamp`, which churn the same
/// way under server-side apply and were left in by oversight upstream.
pub fn canonicalize(mut object: DynamicObject) -> DynamicObject {
    object.data.as_object_mut().map(|map| map.remove("status"));

    object.metadata.self_link = None;
    object.metadata.uid = None;
    object.metadata.resource_version = None;
    object.metadata.generation = None;
    object.metadata.creation_timestamp = None;
    object.metadata.managed_fields = None;

    object
}

/// Renders a canonicalized object as YAML suitable for writing to the mirror directory.
pub fn to_yaml(object: DynamicObject) -> Result<String, RecorderError> {
    let canonical = canonicalize(object);
    Ok(serde_yaml::to_string(&canonical)?)
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
    use kube::api::{DynamicObject, TypeMeta};
    use serde_json::json;

    use super::*;

    fn sample() -> DynamicObject {
        DynamicObject {
            types: Some(TypeMeta {
                api_version: "apps/v1".into(),
                kind: "Deployment".into(),
            }),
            metadata: ObjectMeta {
                name: Some("web".into()),
                namespace: Some("default".into()),
                self_link: Some("/apis/apps/v1/namespaces/default/deployments/web".into()),
                uid: Some("abc-123".into()),
                resource_version: Some("42".into()),
                generation: Some(7),
                creation_timestamp: Some(Time(k8s_openapi::chrono::DateTime::from_timestamp(0, 0).unwrap())),
                ..Default::default()
            },
            data: json!({ "spec": { "replicas": 3 }, "status": { "readyReplicas": 3 } }),
        }
    }

    #[test]
    fn strips_churny_fields() {
        let canonical = canonicalize(sample());

        assert!(canonical.metadata.self_link.is_none());
        assert!(canonical.metadata.uid.is_none());
        assert!(canonical.metadata.resource_version.is_none());
        assert!(canonical.metadata.generation.is_none());
        assert!(canonical.metadata.creation_timestamp.is_none());
        assert!(canonical.data.get("status").is_none());
        assert_eq!(canonical.data["spec"]["replicas"], 3);
    }

    #[test]
    fn same_object_canonicalizes_identically() {
        let first = to_yaml(sample()).unwrap();
        let second = to_yaml(sample()).unwrap();
        assert_eq!(first, second);
    }
}
