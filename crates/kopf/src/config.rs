//! Runtime configuration.
//!
//! Loaded from environment variables. Cluster connection settings are not
//! part of this: they come from the ambient kubeconfig or in-cluster service
//! account when the client is created.

use std::time::Duration;
use tracing::warn;

/// Default server-side apply field manager.
pub const DEFAULT_FIELD_MANAGER: &str = "kopf";

/// Runtime configuration shared by all pipelines of a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Namespace to restrict namespaced watches to; `None` watches all namespaces
    pub namespace: Option<String>,
    /// Field manager used for server-side apply
    pub field_manager: String,
    /// Concurrent reconcile cycles per pipeline; 0 means unbounded
    pub concurrency: u16,
    /// First requeue delay after a failed cycle
    pub retry_min: Duration,
    /// Upper bound for requeue delays
    pub retry_max: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: None,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            concurrency: 1,
            retry_min: Duration::from_secs(1),
            retry_max: Duration::from_secs(300),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `WATCH_NAMESPACE` | all namespaces |
    /// | `KOPF_FIELD_MANAGER` | `kopf` |
    /// | `KOPF_CONCURRENCY` | `1` |
    /// | `KOPF_RETRY_MIN_SECONDS` | `1` |
    /// | `KOPF_RETRY_MAX_SECONDS` | `300` |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`.
    ///
    /// Empty or unparsable values fall back to the default with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty());

        let field_manager = match lookup("KOPF_FIELD_MANAGER") {
            Some(fm) if !fm.trim().is_empty() => fm.trim().to_string(),
            Some(_) => {
                warn!("KOPF_FIELD_MANAGER is empty, using {}", defaults.field_manager);
                defaults.field_manager
            }
            None => defaults.field_manager,
        };

        let concurrency = parse_or(&lookup, "KOPF_CONCURRENCY", defaults.concurrency);
        let retry_min = Duration::from_secs(parse_or(
            &lookup,
            "KOPF_RETRY_MIN_SECONDS",
            defaults.retry_min.as_secs(),
        ));
        let retry_max = Duration::from_secs(parse_or(
            &lookup,
            "KOPF_RETRY_MAX_SECONDS",
            defaults.retry_max.as_secs(),
        ));

        Self {
            namespace,
            field_manager,
            concurrency,
            retry_min,
            retry_max,
        }
    }

    /// Restricts namespaced watches to `namespace`.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Sets the server-side apply field manager.
    #[must_use]
    pub fn with_field_manager(mut self, field_manager: impl Into<String>) -> Self {
        self.field_manager = field_manager.into();
        self
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: std::str::FromStr + std::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                warn!("Invalid value {:?} for {}, using {}", raw, key, default);
                default
            }
        },
    }
}
