use std::fmt;

use kube::api::DynamicObject;
use kube::discovery::ApiResource;

/// Identifies one watched resource type, independent of any particular object.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl From<&ApiResource> for GroupVersionKind {
    fn from(resource: &ApiResource) -> Self {
        Self {
            group: resource.group.clone(),
            version: resource.version.clone(),
            kind: resource.kind.clone(),
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.version, self.kind)
        } else {
            write!(f, "{}/{}/{}", self.group, self.version, self.kind)
        }
    }
}

/// Uniquely identifies one object across the lifetime of the watcher pool, used as the
/// dedup/retry key in the processing queue and as the mirror file identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceKey {
    pub fn from_object(kind: &str, object: &DynamicObject) -> Self {
        Self {
            kind: kind.to_owned(),
            namespace: object.metadata.namespace.clone(),
            name: object.metadata.name.clone().unwrap_or_default(),
        }
    }

    /// File name stem this object mirrors to, e.g. `deployment-default-web`.
    pub fn file_stem(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}-{}-{}", self.kind.to_lowercase(), ns, self.name),
            None => format!("{}-{}", self.kind.to_lowercase(), self.name),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}/{}", self.kind, ns, self.name),
            None => write!(f, "{}/{}", self.kind, self.name),
        }
    }
}

/// What happened to a watched object, as reported by the per-kind watcher.
#[derive(Clone, Debug)]
pub enum Action {
    Upsert(DynamicObject),
    Delete,
}

/// One unit of work flowing from a watcher, through the retry queue, to the recorder.
#[derive(Clone, Debug)]
pub struct Notification {
    pub key: ResourceKey,
    pub action: Action,
}
