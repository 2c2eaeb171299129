//! Reconciliation adapter.
//!
//! One [`Reconciler`] exists per registration. Each cycle:
//! 1. Fetches the current object; a missing object ends the cycle successfully
//! 2. Builds an empty patch carrying only the object's identity
//! 3. Runs the handler with the object, the patch and a scoped logger
//! 4. Server-side applies the patch with forced ownership
//!
//! A handler error skips step 4. Errors are returned to the caller (the
//! watch pipeline) which schedules the retry; nothing is retried here.

use crate::error::Error;
use crate::handler::EventHandler;
use crate::logger::Logger;
use crate::predicate::Phase;
use crate::resource::{empty_patch, ObjectKey};
use crate::store::ClusterStore;
use kube::api::ApiResource;
use std::sync::Arc;
use tracing::{debug, info};

/// Runs the reconcile cycle for one registration.
pub struct Reconciler {
    resource: ApiResource,
    phase: Phase,
    handler: Arc<dyn EventHandler>,
    store: Arc<dyn ClusterStore>,
    field_manager: String,
    log: Logger,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("kind", &self.resource.kind)
            .field("phase", &self.phase)
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler bound to one resource type, phase and handler.
    pub fn new(
        resource: ApiResource,
        phase: Phase,
        handler: Arc<dyn EventHandler>,
        store: Arc<dyn ClusterStore>,
        field_manager: impl Into<String>,
    ) -> Self {
        Self {
            resource,
            phase,
            handler,
            store,
            field_manager: field_manager.into(),
            log: Logger::new("handler"),
        }
    }

    /// Replaces the base logger handlers are given child loggers of.
    #[must_use]
    pub fn with_logger(mut self, log: Logger) -> Self {
        self.log = log;
        self
    }

    /// Resource type this reconciler handles.
    pub fn resource(&self) -> &ApiResource {
        &self.resource
    }

    /// Phase this reconciler is bound to.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs one cycle for the object identified by `key`.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<(), Error> {
        debug!("Reconciling {} {} ({})", self.resource.kind, key, self.phase);

        let object = self
            .store
            .get(&self.resource, key)
            .await
            .map_err(|source| Error::Fetch {
                object: key.to_string(),
                source,
            })?;

        // Deleted between the event and the fetch
        let Some(object) = object else {
            debug!("{} {} no longer exists, nothing to do", self.resource.kind, key);
            return Ok(());
        };

        let mut patch = empty_patch(&self.resource, key);
        self.handler
            .handle(&object, &mut patch, &self.log.with_name("handler-execute"))
            .map_err(Error::Handler)?;

        self.store
            .apply(&self.resource, key, &patch, &self.field_manager)
            .await
            .map_err(|source| Error::Apply {
                object: key.to_string(),
                source,
            })?;

        info!("Reconciled {} {} ({})", self.resource.kind, key, self.phase);
        Ok(())
    }
}
