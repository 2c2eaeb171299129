//! Object identity helpers.

use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
use std::fmt;

/// Namespace and name of a single cluster object.
///
/// `namespace` is `None` for cluster-scoped objects.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    /// Object namespace, if namespaced
    pub namespace: Option<String>,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Creates a key for a namespaced object.
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    /// Creates a key for a cluster-scoped object.
    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Identity of `obj`, or `None` when it carries no name.
    pub fn from_object(obj: &DynamicObject) -> Option<Self> {
        let name = obj.metadata.name.clone()?;
        Some(Self {
            namespace: obj.metadata.namespace.clone(),
            name,
        })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{}/{}", ns, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Renders a GVK the way it appears in logs, e.g. `apps/v1/Deployment` or `v1/ConfigMap`.
pub fn display_gvk(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        format!("{}/{}", gvk.version, gvk.kind)
    } else {
        format!("{}/{}/{}", gvk.group, gvk.version, gvk.kind)
    }
}

/// Builds the empty patch for one reconcile cycle.
///
/// Only the identity is set: `apiVersion`, `kind`, `metadata.name` and
/// `metadata.namespace`. The body starts as an empty JSON object.
pub fn empty_patch(resource: &ApiResource, key: &ObjectKey) -> DynamicObject {
    let patch = DynamicObject::new(&key.name, resource).data(serde_json::json!({}));
    match &key.namespace {
        Some(ns) => patch.within(ns),
        None => patch,
    }
}
