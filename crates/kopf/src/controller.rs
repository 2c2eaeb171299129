//! Runtime bootstrap.
//!
//! Connects to the cluster, starts one pipeline per registration and blocks
//! until the process is asked to terminate.

use crate::error::Error;
use crate::handler::{on, Registry};
use crate::kube_store::KubeStore;
use crate::store::ClusterStore;
use crate::watcher::run_pipeline;
use kube::Client;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Runs all pipelines of `registry` (or of the process default, [`on()`],
/// when `None`) until a termination signal arrives.
///
/// Fails only when the manager cannot start: no cluster client, API server
/// unreachable, or signal handlers unavailable. A registration whose kind
/// cannot be resolved is logged and skipped.
pub async fn execute(registry: Option<Registry>) -> Result<(), Error> {
    let registry = registry.unwrap_or_else(on);
    let (config, registrations, log) = registry.into_parts();

    info!("Initializing manager");

    let client = Client::try_default().await.map_err(Error::Startup)?;
    let version = client.apiserver_version().await.map_err(Error::Startup)?;
    info!("Connected to Kubernetes API server {}", version.git_version);

    let mut shutdown = Box::pin(shutdown_signal()?);

    if registrations.is_empty() {
        warn!("No handlers registered, nothing will be reconciled");
    }

    let store: Arc<dyn ClusterStore> = Arc::new(KubeStore::new(client.clone()));
    let mut pipelines = JoinSet::new();
    for registration in registrations {
        let name = registration.name();
        let client = client.clone();
        let store = Arc::clone(&store);
        let config = config.clone();
        let log = log.clone();
        pipelines.spawn(async move {
            let result = run_pipeline(client, store, registration, config, log).await;
            (name, result)
        });
    }

    info!("Manager running");

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    pipelines.shutdown().await;
                    return Err(e);
                }
                info!("Termination signal received, stopping");
                break;
            }
            Some(joined) = pipelines.join_next() => match joined {
                Ok((name, Ok(()))) => warn!("Pipeline {} stopped", name),
                Ok((name, Err(e))) => error!("could not create controller {}: {}", name, e),
                Err(e) => error!("Pipeline task failed: {}", e),
            },
        }
    }

    pipelines.shutdown().await;
    Ok(())
}

/// Runs [`execute`] and exits the process with status 1 if the manager
/// cannot start.
pub async fn execute_or_die(registry: Option<Registry>) {
    if let Err(e) = execute(registry).await {
        error!("could not start manager: {}", e);
        std::process::exit(1);
    }
}

/// Resolves on SIGINT, or SIGTERM on unix.
fn shutdown_signal() -> Result<impl Future<Output = Result<(), Error>>, Error> {
    #[cfg(unix)]
    let terminate = {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        async move {
            sigterm.recv().await;
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    Ok(first_signal(tokio::signal::ctrl_c(), terminate))
}

/// Waits for whichever signal arrives first. A failure to listen for SIGINT
/// is an error rather than a shutdown request.
async fn first_signal(
    interrupt: impl Future<Output = std::io::Result<()>>,
    terminate: impl Future<Output = ()>,
) -> Result<(), Error> {
    tokio::select! {
        res = interrupt => res.map_err(Error::Signal),
        () = terminate => Ok(()),
    }
}
