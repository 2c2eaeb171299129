//! ConfigMap Controller
//!
//! Minimal kopf consumer: registers a create and an update handler for core
//! `v1/ConfigMap` and runs them until terminated.
//!
//! Configuration is read from the environment (`WATCH_NAMESPACE`,
//! `KOPF_FIELD_MANAGER`, `KOPF_CONCURRENCY`, `KOPF_RETRY_MIN_SECONDS`,
//! `KOPF_RETRY_MAX_SECONDS`); log levels from `RUST_LOG`.

mod handlers;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Fails only when a provider is already installed; the client uses that one
    if let Err(existing) = rustls::crypto::ring::default_provider().install_default() {
        warn!("Crypto provider already installed, not replacing it: {:?}", existing);
    }

    info!("Starting ConfigMap Controller");

    let on = kopf::on()
        .create("", "v1", "ConfigMap", handlers::create_handler)
        .update("", "v1", "ConfigMap", handlers::update_handler);

    let config = on.config();
    info!("Configuration:");
    info!("  Namespace: {}", config.namespace.as_deref().unwrap_or("all namespaces"));
    info!("  Field manager: {}", config.field_manager);
    info!("  Concurrency: {}", config.concurrency);

    kopf::execute_or_die(Some(on)).await;
}
