//! Mock cluster store for unit testing
//!
//! Keeps objects in memory and records every call so tests can assert how
//! many fetches and applies a reconcile cycle made, and with which patches.
//! Failures can be injected per operation.
//!
//! Apply is modelled as a merge: labels and annotations are merged key by key,
//! the body is merged recursively with patch values winning. That is enough to
//! show convergence; field ownership bookkeeping is not modelled.

use crate::error::StoreError;
use crate::resource::ObjectKey;
use crate::store::ClusterStore;
use kube::api::{ApiResource, DynamicObject};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

type StoreKey = (String, String, ObjectKey);

/// One recorded apply call.
#[derive(Debug, Clone)]
pub struct AppliedPatch {
    /// Target object
    pub key: ObjectKey,
    /// Patch as sent
    pub patch: DynamicObject,
    /// Field manager used
    pub field_manager: String,
}

/// Mock ClusterStore for testing
#[derive(Clone, Default)]
pub struct MockClusterStore {
    objects: Arc<Mutex<HashMap<StoreKey, DynamicObject>>>,
    applied: Arc<Mutex<Vec<AppliedPatch>>>,
    get_calls: Arc<Mutex<usize>>,
    fail_get: Arc<Mutex<Option<String>>>,
    fail_apply: Arc<Mutex<Option<String>>>,
}

impl std::fmt::Debug for MockClusterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClusterStore").finish_non_exhaustive()
    }
}

fn store_key(resource: &ApiResource, key: &ObjectKey) -> StoreKey {
    (resource.api_version.clone(), resource.kind.clone(), key.clone())
}

impl MockClusterStore {
    /// Create an empty mock store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an object to the mock store (for test setup)
    ///
    /// # Panics
    /// If the object has no name.
    pub fn insert(&self, resource: &ApiResource, obj: DynamicObject) {
        let key = ObjectKey::from_object(&obj).expect("mock objects need a name");
        self.objects.lock().unwrap().insert(store_key(resource, &key), obj);
    }

    /// Remove an object, simulating a deletion racing the reconcile
    pub fn remove(&self, resource: &ApiResource, key: &ObjectKey) {
        self.objects.lock().unwrap().remove(&store_key(resource, key));
    }

    /// Current stored state of an object
    pub fn object(&self, resource: &ApiResource, key: &ObjectKey) -> Option<DynamicObject> {
        self.objects.lock().unwrap().get(&store_key(resource, key)).cloned()
    }

    /// Make every `get` fail with `message`
    pub fn fail_get(&self, message: impl Into<String>) {
        *self.fail_get.lock().unwrap() = Some(message.into());
    }

    /// Make every `apply` fail with `message`
    pub fn fail_apply(&self, message: impl Into<String>) {
        *self.fail_apply.lock().unwrap() = Some(message.into());
    }

    /// Number of `get` calls made so far
    pub fn get_calls(&self) -> usize {
        *self.get_calls.lock().unwrap()
    }

    /// All apply calls made so far, including failed ones
    pub fn applied(&self) -> Vec<AppliedPatch> {
        self.applied.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ClusterStore for MockClusterStore {
    async fn get(&self, resource: &ApiResource, key: &ObjectKey) -> Result<Option<DynamicObject>, StoreError> {
        *self.get_calls.lock().unwrap() += 1;
        if let Some(message) = self.fail_get.lock().unwrap().clone() {
            return Err(StoreError::Unavailable(message));
        }
        Ok(self.object(resource, key))
    }

    async fn apply(
        &self,
        resource: &ApiResource,
        key: &ObjectKey,
        patch: &DynamicObject,
        field_manager: &str,
    ) -> Result<DynamicObject, StoreError> {
        self.applied.lock().unwrap().push(AppliedPatch {
            key: key.clone(),
            patch: patch.clone(),
            field_manager: field_manager.to_string(),
        });
        if let Some(message) = self.fail_apply.lock().unwrap().clone() {
            return Err(StoreError::Unavailable(message));
        }

        let mut objects = self.objects.lock().unwrap();
        let stored = objects
            .entry(store_key(resource, key))
            .or_insert_with(|| crate::resource::empty_patch(resource, key));

        merge_map(&mut stored.metadata.labels, &patch.metadata.labels);
        merge_map(&mut stored.metadata.annotations, &patch.metadata.annotations);
        merge_value(&mut stored.data, &patch.data);

        Ok(stored.clone())
    }
}

fn merge_map(target: &mut Option<BTreeMap<String, String>>, patch: &Option<BTreeMap<String, String>>) {
    if let Some(patch) = patch {
        let target = target.get_or_insert_with(BTreeMap::new);
        for (k, v) in patch {
            target.insert(k.clone(), v.clone());
        }
    }
}

fn merge_value(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (k, v) in patch {
                merge_value(target.entry(k.clone()).or_insert(Value::Null), v);
            }
        }
        (_, Value::Null) => {}
        (target, patch) => *target = patch.clone(),
    }
}
