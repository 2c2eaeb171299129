//! Handler registry.
//!
//! [`Registry`] is the caller-facing surface: a consuming builder where each
//! `create`/`update`/`delete` call appends one registration, and with it one
//! watch-and-reconcile pipeline once the registry is executed.
//!
//! ```no_run
//! # use kopf::{DynamicObject, Logger};
//! # fn created(_: &DynamicObject, _: &mut DynamicObject, _: &Logger) -> anyhow::Result<()> { Ok(()) }
//! # fn updated(_: &DynamicObject, _: &mut DynamicObject, _: &Logger) -> anyhow::Result<()> { Ok(()) }
//! let on = kopf::on()
//!     .create("", "v1", "ConfigMap", created)
//!     .update("", "v1", "ConfigMap", updated);
//! assert_eq!(on.registrations().len(), 2);
//! ```

use crate::config::Config;
use crate::error::Error;
use crate::logger::Logger;
use crate::predicate::Phase;
use crate::resource::display_gvk;
use kube::api::{DynamicObject, GroupVersionKind};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// A caller-supplied event handler.
///
/// Receives the current object (read-only), the patch to fill in, and a
/// logger scoped to the invocation. Returning an error aborts the cycle
/// before anything is applied and requeues the object.
///
/// Implemented for every matching closure or function.
pub trait EventHandler: Send + Sync {
    /// Handles one reconcile cycle.
    fn handle(&self, obj: &DynamicObject, patch: &mut DynamicObject, log: &Logger) -> anyhow::Result<()>;
}

impl<F> EventHandler for F
where
    F: Fn(&DynamicObject, &mut DynamicObject, &Logger) -> anyhow::Result<()> + Send + Sync,
{
    fn handle(&self, obj: &DynamicObject, patch: &mut DynamicObject, log: &Logger) -> anyhow::Result<()> {
        self(obj, patch, log)
    }
}

/// One registered handler: which kind, which phase, what to run.
#[derive(Clone)]
pub struct Registration {
    gvk: GroupVersionKind,
    phase: Phase,
    handler: Arc<dyn EventHandler>,
}

impl Registration {
    /// Resource the handler watches.
    pub fn gvk(&self) -> &GroupVersionKind {
        &self.gvk
    }

    /// Phase the handler runs for.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The handler itself.
    pub fn handler(&self) -> Arc<dyn EventHandler> {
        Arc::clone(&self.handler)
    }

    /// Human-readable name, e.g. `v1/ConfigMap:create`.
    pub fn name(&self) -> String {
        format!("{}:{}", display_gvk(&self.gvk), self.phase)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("gvk", &self.gvk)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

/// Fluent handler registry.
///
/// Clones share their registrations, so handlers added through any clone are
/// started by whichever clone is executed.
#[derive(Debug, Clone)]
pub struct Registry {
    config: Config,
    registrations: Arc<Mutex<Vec<Registration>>>,
    log: Logger,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

static DEFAULT_REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Returns a handle to the process default registry.
///
/// The default is created on first use and configured from the environment
/// (see [`Config::from_env`]). [`execute`](crate::execute) runs it when
/// given `None`.
pub fn on() -> Registry {
    DEFAULT_REGISTRY
        .get_or_init(|| Registry::new(Config::from_env()))
        .clone()
}

impl Registry {
    /// Creates an empty registry with an explicit configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            registrations: Arc::new(Mutex::new(Vec::new())),
            log: Logger::new("handler"),
        }
    }

    /// Registers `handler` for creations of `group/version/kind`.
    #[must_use]
    pub fn create(self, group: &str, version: &str, kind: &str, handler: impl EventHandler + 'static) -> Self {
        self.register(Phase::Create, group, version, kind, Arc::new(handler))
    }

    /// Registers `handler` for updates of `group/version/kind`.
    #[must_use]
    pub fn update(self, group: &str, version: &str, kind: &str, handler: impl EventHandler + 'static) -> Self {
        self.register(Phase::Update, group, version, kind, Arc::new(handler))
    }

    /// Registers `handler` for confirmed deletions of `group/version/kind`.
    #[must_use]
    pub fn delete(self, group: &str, version: &str, kind: &str, handler: impl EventHandler + 'static) -> Self {
        self.register(Phase::Delete, group, version, kind, Arc::new(handler))
    }

    fn register(
        self,
        phase: Phase,
        group: &str,
        version: &str,
        kind: &str,
        handler: Arc<dyn EventHandler>,
    ) -> Self {
        let gvk = GroupVersionKind::gvk(group.trim(), version.trim(), kind.trim());
        if let Err(e) = validate(&gvk) {
            self.log.error(e, "could not create controller");
            return self;
        }
        self.log.debug(format!("registered {} handler for {}", phase, display_gvk(&gvk)));
        self.lock().push(Registration { gvk, phase, handler });
        self
    }

    /// Registrations in the order they were made.
    pub fn registrations(&self) -> Vec<Registration> {
        self.lock().clone()
    }

    /// Runtime configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Takes the registrations out, leaving the shared list empty.
    pub(crate) fn into_parts(self) -> (Config, Vec<Registration>, Logger) {
        let registrations = std::mem::take(&mut *self.lock());
        (self.config, registrations, self.log)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Registration>> {
        self.registrations.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn validate(gvk: &GroupVersionKind) -> Result<(), Error> {
    if gvk.version.is_empty() {
        return Err(Error::Registration(format!(
            "missing version for kind {:?}",
            gvk.kind
        )));
    }
    if gvk.kind.is_empty() {
        return Err(Error::Registration(format!(
            "missing kind for {}",
            display_gvk(gvk)
        )));
    }
    if gvk.kind.contains('/') || gvk.group.contains('/') || gvk.version.contains('/') {
        return Err(Error::Registration(format!(
            "invalid resource reference {}",
            display_gvk(gvk)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &DynamicObject, _: &mut DynamicObject, _: &Logger) -> anyhow::Result<()> {
        Ok(())
    }

    #[test]
    fn test_chained_registrations_are_kept_in_order() {
        let registry = Registry::default()
            .create("", "v1", "ConfigMap", noop)
            .update("", "v1", "ConfigMap", noop)
            .delete("apps", "v1", "Deployment", noop);

        let names: Vec<String> = registry.registrations().iter().map(Registration::name).collect();
        assert_eq!(
            names,
            vec!["v1/ConfigMap:create", "v1/ConfigMap:update", "apps/v1/Deployment:delete"]
        );
    }

    #[test]
    fn test_invalid_registration_does_not_break_chain() {
        let registry = Registry::default()
            .create("", "", "ConfigMap", noop)
            .create("", "v1", "", noop)
            .create("apps/v1", "v1", "Deployment", noop)
            .update("", "v1", "ConfigMap", noop);

        assert_eq!(registry.registrations().len(), 1);
        assert_eq!(registry.registrations()[0].phase(), Phase::Update);
    }

    #[test]
    fn test_duplicate_registrations_are_not_coalesced() {
        let registry = Registry::default()
            .create("", "v1", "ConfigMap", noop)
            .create("", "v1", "ConfigMap", noop);

        assert_eq!(registry.registrations().len(), 2);
    }

    #[test]
    fn test_closure_handlers_are_accepted() {
        let registry = Registry::default().create(
            "",
            "v1",
            "Secret",
            |_: &DynamicObject, patch: &mut DynamicObject, _: &Logger| -> anyhow::Result<()> {
                patch.metadata.labels = None;
                Ok(())
            },
        );

        let registrations = registry.registrations();
        let registration = &registrations[0];
        assert_eq!(registration.gvk().kind, "Secret");
        assert_eq!(registration.gvk().group, "");
    }

    #[test]
    fn test_registry_uses_given_config() {
        let registry = Registry::new(Config::default().with_namespace("controller-test"));
        assert_eq!(registry.config().namespace.as_deref(), Some("controller-test"));
        assert!(registry.registrations().is_empty());
    }

    #[test]
    fn test_default_registry_collects_registrations_across_calls() {
        let _ = on().create("", "v1", "ConfigMap", noop);
        let _ = on().update("", "v1", "ConfigMap", noop);

        let names: Vec<String> = on().registrations().iter().map(Registration::name).collect();
        assert_eq!(names, vec!["v1/ConfigMap:create", "v1/ConfigMap:update"]);

        let (_, registrations, _) = on().into_parts();
        assert_eq!(registrations.len(), 2);
        assert!(on().registrations().is_empty());
    }

    #[test]
    fn test_explicit_registries_are_independent() {
        let first = Registry::default().create("", "v1", "ConfigMap", noop);
        let second = Registry::default();

        assert_eq!(first.registrations().len(), 1);
        assert!(second.registrations().is_empty());
    }
}
