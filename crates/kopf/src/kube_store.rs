//! Cluster store backed by the Kubernetes API.

use crate::error::StoreError;
use crate::resource::ObjectKey;
use crate::store::ClusterStore;
use kube::api::{Api, ApiResource, DynamicObject, Patch, PatchParams};
use kube::Client;
use tracing::debug;

/// [`ClusterStore`] talking to an API server through a `kube::Client`.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    /// Creates a store using `client`.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &ApiResource, key: &ObjectKey) -> Api<DynamicObject> {
        match &key.namespace {
            Some(ns) => Api::namespaced_with(self.client.clone(), ns, resource),
            None => Api::all_with(self.client.clone(), resource),
        }
    }
}

#[async_trait::async_trait]
impl ClusterStore for KubeStore {
    async fn get(&self, resource: &ApiResource, key: &ObjectKey) -> Result<Option<DynamicObject>, StoreError> {
        debug!("Fetching {} {}", resource.kind, key);
        // get_opt maps a 404 to Ok(None)
        Ok(self.api(resource, key).get_opt(&key.name).await?)
    }

    async fn apply(
        &self,
        resource: &ApiResource,
        key: &ObjectKey,
        patch: &DynamicObject,
        field_manager: &str,
    ) -> Result<DynamicObject, StoreError> {
        debug!("Applying patch to {} {} as {}", resource.kind, key, field_manager);
        let params = PatchParams::apply(field_manager).force();
        Ok(self
            .api(resource, key)
            .patch(&key.name, &params, &Patch::Apply(patch))
            .await?)
    }
}
