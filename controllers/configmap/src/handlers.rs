//! ConfigMap handlers.
//!
//! Only `controller-test/hello-world` is touched: creation annotates it with
//! `create=done`, updates label it with `update=done`. Every other ConfigMap
//! is logged and left alone (the patch carries its identity only).

use kopf::{DynamicObject, Logger};
use kube::ResourceExt;

const TARGET_NAMESPACE: &str = "controller-test";
const TARGET_NAME: &str = "hello-world";

fn is_target(obj: &DynamicObject) -> bool {
    obj.name_any() == TARGET_NAME && obj.namespace().as_deref() == Some(TARGET_NAMESPACE)
}

fn identity(obj: &DynamicObject) -> String {
    format!("{}/{}", obj.namespace().unwrap_or_default(), obj.name_any())
}

/// Annotates the target ConfigMap with `create=done`.
pub fn create_handler(res: &DynamicObject, patch: &mut DynamicObject, log: &Logger) -> anyhow::Result<()> {
    log.info(format!("Executed createHandler for: {}", identity(res)));

    if is_target(res) {
        log.info(format!("Setting create annotation on: {}", identity(res)));
        patch
            .annotations_mut()
            .insert("create".to_string(), "done".to_string());
    }

    Ok(())
}

/// Labels the target ConfigMap with `update=done`.
pub fn update_handler(res: &DynamicObject, patch: &mut DynamicObject, log: &Logger) -> anyhow::Result<()> {
    log.info(format!("Executed updateHandler for: {}", identity(res)));

    if is_target(res) {
        log.info(format!("Setting update labels on: {}", identity(res)));
        patch
            .labels_mut()
            .insert("update".to_string(), "done".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopf::{
        ApiResource, GroupVersionKind, MockClusterStore, Notification, ObjectKey, Phase, Reconciler, Registry,
    };
    use std::sync::Arc;

    fn resource() -> ApiResource {
        ApiResource::from_gvk(&GroupVersionKind::gvk("", "v1", "ConfigMap"))
    }

    fn config_map(namespace: &str, name: &str) -> DynamicObject {
        let manifest = format!(
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: {}\n  namespace: {}\ndata:\n  key: value\n",
            name, namespace
        );
        serde_yaml::from_str(&manifest).unwrap()
    }

    fn store_with(objects: &[DynamicObject]) -> Arc<MockClusterStore> {
        let store = Arc::new(MockClusterStore::new());
        for obj in objects {
            store.insert(&resource(), obj.clone());
        }
        store
    }

    /// Runs every registration whose predicate accepts `notification`, the
    /// way each pipeline would.
    async fn dispatch(registry: &Registry, store: &Arc<MockClusterStore>, notification: &Notification) -> usize {
        let key = ObjectKey::from_object(notification.object()).unwrap();
        let mut fired = 0;
        for registration in registry.registrations() {
            if !registration.phase().accepts(notification) {
                continue;
            }
            let store: Arc<MockClusterStore> = Arc::clone(store);
            let reconciler = Reconciler::new(
                resource(),
                registration.phase(),
                registration.handler(),
                store,
                "kopf",
            );
            reconciler.reconcile(&key).await.unwrap();
            fired += 1;
        }
        fired
    }

    #[tokio::test]
    async fn test_create_annotates_hello_world() {
        let obj = config_map("controller-test", "hello-world");
        let store = store_with(&[obj.clone()]);
        let reconciler = Reconciler::new(resource(), Phase::Create, Arc::new(create_handler), store.clone(), "kopf");

        reconciler
            .reconcile(&ObjectKey::namespaced("controller-test", "hello-world"))
            .await
            .unwrap();

        let applied = store.applied();
        assert_eq!(applied.len(), 1);
        assert_eq!(
            serde_json::to_value(&applied[0].patch).unwrap(),
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {
                    "name": "hello-world",
                    "namespace": "controller-test",
                    "annotations": { "create": "done" },
                },
            })
        );
        assert!(applied[0].patch.metadata.labels.is_none());
    }

    #[tokio::test]
    async fn test_create_leaves_other_config_maps_alone() {
        let obj = config_map("controller-test", "other");
        let store = store_with(&[obj]);
        let reconciler = Reconciler::new(resource(), Phase::Create, Arc::new(create_handler), store.clone(), "kopf");

        reconciler
            .reconcile(&ObjectKey::namespaced("controller-test", "other"))
            .await
            .unwrap();

        let applied = store.applied();
        assert_eq!(applied.len(), 1);
        assert_eq!(
            serde_json::to_value(&applied[0].patch).unwrap(),
            serde_json::json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {
                    "name": "other",
                    "namespace": "controller-test",
                },
            })
        );
    }

    #[test]
    fn test_same_name_in_other_namespace_is_ignored() {
        let mut patch = kopf::resource::empty_patch(&resource(), &ObjectKey::namespaced("default", "hello-world"));
        let obj = config_map("default", "hello-world");

        update_handler(&obj, &mut patch, &Logger::new("test")).unwrap();
        create_handler(&obj, &mut patch, &Logger::new("test")).unwrap();

        assert!(patch.metadata.labels.is_none());
        assert!(patch.metadata.annotations.is_none());
    }

    #[tokio::test]
    async fn test_update_labels_hello_world() {
        let obj = config_map("controller-test", "hello-world");
        let store = store_with(&[obj]);
        let reconciler = Reconciler::new(resource(), Phase::Update, Arc::new(update_handler), store.clone(), "kopf");

        reconciler
            .reconcile(&ObjectKey::namespaced("controller-test", "hello-world"))
            .await
            .unwrap();

        let patch = &store.applied()[0].patch;
        assert_eq!(patch.labels().get("update").map(String::as_str), Some("done"));
        assert!(patch.metadata.annotations.is_none());
    }

    #[tokio::test]
    async fn test_create_and_update_pipelines_fire_independently() {
        let obj = config_map("controller-test", "hello-world");
        let store = store_with(&[obj.clone()]);
        let registry = Registry::default()
            .create("", "v1", "ConfigMap", create_handler)
            .update("", "v1", "ConfigMap", update_handler);

        // Create event: only the create handler runs
        let fired = dispatch(&registry, &store, &Notification::Create { object: obj.clone() }).await;
        assert_eq!(fired, 1);
        let applied = store.applied();
        assert_eq!(applied.len(), 1);
        assert!(applied[0].patch.annotations().contains_key("create"));
        assert!(applied[0].patch.metadata.labels.is_none());

        // Update event: only the update handler runs
        let fired = dispatch(
            &registry,
            &store,
            &Notification::Update {
                old: obj.clone(),
                new: obj.clone(),
            },
        )
        .await;
        assert_eq!(fired, 1);
        let applied = store.applied();
        assert_eq!(applied.len(), 2);
        assert!(applied[1].patch.labels().contains_key("update"));
        assert!(applied[1].patch.metadata.annotations.is_none());

        // Final object carries both
        let stored = store
            .object(&resource(), &ObjectKey::namespaced("controller-test", "hello-world"))
            .unwrap();
        assert_eq!(stored.annotations().get("create").map(String::as_str), Some("done"));
        assert_eq!(stored.labels().get("update").map(String::as_str), Some("done"));
    }

    #[tokio::test]
    async fn test_confirmed_delete_fires_no_create_or_update_handler() {
        let obj = config_map("controller-test", "hello-world");
        let store = store_with(&[]);
        let registry = Registry::default()
            .create("", "v1", "ConfigMap", create_handler)
            .update("", "v1", "ConfigMap", update_handler);

        let fired = dispatch(
            &registry,
            &store,
            &Notification::Delete {
                object: obj,
                state_unknown: false,
            },
        )
        .await;

        assert_eq!(fired, 0);
        assert!(store.applied().is_empty());
    }
}
