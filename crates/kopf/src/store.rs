//! Cluster store trait for mocking
//!
//! The reconcile cycle only needs two operations from the cluster: read one
//! object and server-side apply a patch to it. This trait abstracts them so
//! the cycle can be unit tested against [`MockClusterStore`](crate::mock::MockClusterStore);
//! [`KubeStore`](crate::kube_store::KubeStore) implements it against a real API server.

use crate::error::StoreError;
use crate::resource::ObjectKey;
use kube::api::{ApiResource, DynamicObject};

/// Object store addressable by resource type, namespace and name.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ClusterStore: Send + Sync {
    /// Fetches the current state of an object.
    ///
    /// Returns `Ok(None)` when the object does not exist.
    async fn get(&self, resource: &ApiResource, key: &ObjectKey) -> Result<Option<DynamicObject>, StoreError>;

    /// Server-side applies `patch` to the object, forcing ownership of the
    /// fields it sets under `field_manager`.
    ///
    /// Applying the same patch repeatedly converges to the same object.
    async fn apply(
        &self,
        resource: &ApiResource,
        key: &ObjectKey,
        patch: &DynamicObject,
        field_manager: &str,
    ) -> Result<DynamicObject, StoreError>;
}
