//! Error types for kopf.
//!
//! Per-cycle errors (`Fetch`, `Handler`, `Apply`) are returned to the engine,
//! which requeues the object. `Registration` only ever disables a single
//! pipeline. `Startup` and `Signal` are fatal to the process.

use thiserror::Error;

/// Errors surfaced by the cluster store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Store could not serve the request (used by non-API stores)
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Errors that can occur while registering or running handlers.
#[derive(Debug, Error)]
pub enum Error {
    /// Fetching the current object failed for a reason other than not-found
    #[error("Failed to fetch {object}: {source}")]
    Fetch {
        /// Object identity
        object: String,
        /// Underlying store error
        source: StoreError,
    },

    /// The registered handler returned an error
    #[error("Handler failed: {0:#}")]
    Handler(anyhow::Error),

    /// Applying the patch failed
    #[error("Failed to apply patch to {object}: {source}")]
    Apply {
        /// Object identity
        object: String,
        /// Underlying store error
        source: StoreError,
    },

    /// A watch could not be established for a registration
    #[error("Registration failed: {0}")]
    Registration(String),

    /// The cluster client could not be created or reached
    #[error("Manager could not start: {0}")]
    Startup(#[source] kube::Error),

    /// Termination signal handlers could not be installed
    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] std::io::Error),
}
