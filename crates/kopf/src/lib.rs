//! kopf
//!
//! A small registration façade for writing Kubernetes controllers on top of
//! `kube-runtime`. Callers register create, update and delete handlers for a
//! Group/Version/Kind; each registration becomes its own watch-and-reconcile
//! pipeline that fetches the changed object, hands the handler an empty patch
//! and server-side applies whatever the handler wrote into it.
//!
//! # Example
//!
//! ```no_run
//! use kopf::{DynamicObject, Logger};
//! use kube::ResourceExt;
//!
//! fn on_create(obj: &DynamicObject, patch: &mut DynamicObject, log: &Logger) -> anyhow::Result<()> {
//!     log.info(format!("created: {}", obj.name_any()));
//!     patch.annotations_mut().insert("seen".to_string(), "yes".to_string());
//!     Ok(())
//! }
//!
//! # async fn example() {
//! let on = kopf::on().create("", "v1", "ConfigMap", on_create);
//! kopf::execute_or_die(Some(on)).await;
//! # }
//! ```
//!
//! # Modules
//!
//! - `predicate`: per-phase event filters
//! - `tracker`: turns watch events into create/update/delete notifications
//! - `reconciler`: the fetch → handler → apply cycle
//! - `store`: the cluster store seam (`kube_store` for a real cluster, `mock` for tests)
//! - `watcher`: one watch pipeline per registration
//! - `handler`: the fluent registry
//! - `controller`: runtime bootstrap

pub mod backoff;
pub mod config;
pub mod controller;
pub mod error;
pub mod handler;
pub mod kube_store;
pub mod logger;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod predicate;
pub mod reconciler;
pub mod resource;
pub mod store;
pub mod tracker;
mod watcher;

pub use config::Config;
pub use controller::{execute, execute_or_die};
pub use error::{Error, StoreError};
pub use handler::{on, EventHandler, Registration, Registry};
pub use kube::api::{ApiResource, DynamicObject, GroupVersionKind};
pub use kube_store::KubeStore;
pub use logger::Logger;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockClusterStore;
pub use predicate::Phase;
pub use reconciler::Reconciler;
pub use resource::ObjectKey;
pub use store::ClusterStore;
pub use tracker::{Notification, NotificationTracker};
