//! Watch pipelines.
//!
//! Every registration gets its own pipeline: a `kube_runtime` watcher for the
//! registered kind, classified into notifications, filtered by the
//! registration's phase and fed into `kube_runtime::controller::applier`,
//! which schedules the reconcile cycles (deduplication, one cycle per object
//! at a time, bounded concurrency, requeue).

use crate::backoff::FibonacciBackoff;
use crate::config::Config;
use crate::error::Error;
use crate::handler::Registration;
use crate::logger::Logger;
use crate::reconciler::Reconciler;
use crate::resource::{display_gvk, ObjectKey};
use crate::store::ClusterStore;
use crate::tracker::{Notification, NotificationTracker};
use futures::{Stream, StreamExt, TryStreamExt};
use kube::api::{Api, DynamicObject};
use kube::discovery::{self, Scope};
use kube::Client;
use kube_runtime::controller::{applier, Action, Config as ControllerConfig, Error as ControllerError};
use kube_runtime::reflector::{self, store::Writer, ObjectRef};
use kube_runtime::{watcher, WatchStreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn, Instrument};

type ReconcileFuture = Pin<Box<dyn Future<Output = Result<Action, Error>> + Send>>;

/// Shared state of one running pipeline, handed to the engine as context.
pub(crate) struct Pipeline {
    name: String,
    reconciler: Reconciler,
    retry_min: Duration,
    retry_max: Duration,
    backoff: Mutex<HashMap<ObjectKey, FibonacciBackoff>>,
}

impl Pipeline {
    pub(crate) fn new(name: String, reconciler: Reconciler, config: &Config) -> Self {
        Self {
            name,
            reconciler,
            retry_min: config.retry_min,
            retry_max: config.retry_max,
            backoff: Mutex::new(HashMap::new()),
        }
    }

    /// Runs one cycle for `obj` and clears its backoff on success.
    pub(crate) async fn reconcile(&self, obj: &DynamicObject) -> Result<Action, Error> {
        let Some(key) = ObjectKey::from_object(obj) else {
            return Ok(Action::await_change());
        };

        let span = info_span!(
            "reconcile",
            kind = %self.reconciler.resource().kind,
            phase = %self.reconciler.phase(),
            object = %key,
        );
        self.reconciler.reconcile(&key).instrument(span).await?;

        self.backoff
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key);
        Ok(Action::await_change())
    }

    /// Error policy: log and requeue after the object's next backoff delay.
    pub(crate) fn error_policy(&self, obj: &DynamicObject, err: &Error) -> Action {
        let Some(key) = ObjectKey::from_object(obj) else {
            return Action::await_change();
        };

        let delay = self
            .backoff
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.clone())
            .or_insert_with(|| FibonacciBackoff::new(self.retry_min, self.retry_max))
            .next_backoff();

        error!(
            "Reconciliation failed for {} {}: {} (retrying in {:?})",
            self.name, key, err, delay
        );
        Action::requeue(delay)
    }

    /// Drops the backoff state of an object that no longer exists.
    pub(crate) fn forget(&self, key: &ObjectKey) {
        self.backoff
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
    }

    #[cfg(test)]
    fn backoff_len(&self) -> usize {
        self.backoff.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Resolves, watches and reconciles one registration until the watch ends.
///
/// Returns `Error::Registration` when the kind cannot be resolved; the caller
/// logs it and keeps the other pipelines running.
pub(crate) async fn run_pipeline(
    client: Client,
    store: Arc<dyn ClusterStore>,
    registration: Registration,
    config: Config,
    log: Logger,
) -> Result<(), Error> {
    let name = registration.name();
    let gvk = registration.gvk().clone();

    let (resource, capabilities) = discovery::pinned_kind(&client, &gvk)
        .await
        .map_err(|e| Error::Registration(format!("could not resolve {}: {}", display_gvk(&gvk), e)))?;

    let api: Api<DynamicObject> = match (&config.namespace, &capabilities.scope) {
        (Some(ns), Scope::Namespaced) => Api::namespaced_with(client, ns, &resource),
        _ => Api::all_with(client, &resource),
    };

    info!(
        "Starting {} watcher ({})",
        name,
        config.namespace.as_deref().unwrap_or("all namespaces")
    );

    let reconciler = Reconciler::new(
        resource.clone(),
        registration.phase(),
        registration.handler(),
        store,
        config.field_manager.clone(),
    )
    .with_logger(log.with_name(&name));
    let context = Arc::new(Pipeline::new(name.clone(), reconciler, &config));

    let writer = Writer::new(resource);
    let events = watcher(api, watcher::Config::default()).default_backoff();

    schedule(writer, events, Arc::clone(&context), config.concurrency)
        .for_each(|res| {
            let name = name.clone();
            let context = Arc::clone(&context);
            async move {
                match res {
                    Ok((obj, _)) => debug!("{} reconciled {}", name, obj.name),
                    // Object left the cache before its cycle ran: a deletion race
                    Err(ControllerError::ObjectNotFound(obj)) => {
                        debug!("{} skipped {}, no longer cached", name, obj.name);
                        context.forget(&ObjectKey {
                            namespace: obj.namespace,
                            name: obj.name,
                        });
                    }
                    Err(ControllerError::ReconcilerFailed(_, _)) => {}
                    Err(e) => warn!("{} controller error: {}", name, e),
                }
            }
        })
        .await;

    warn!("{} watcher stream ended", name);
    Ok(())
}

/// Feeds raw watch events through the cache, the tracker and the phase
/// predicate into the engine, yielding one result per reconcile cycle.
///
/// Objects reported deleted lose their backoff state.
pub(crate) fn schedule<S>(
    writer: Writer<DynamicObject>,
    events: S,
    context: Arc<Pipeline>,
    concurrency: u16,
) -> impl Stream<Item = Result<(ObjectRef<DynamicObject>, Action), ControllerError<Error, watcher::Error>>>
where
    S: Stream<Item = Result<watcher::Event<DynamicObject>, watcher::Error>>,
{
    let cache = writer.as_reader();
    let phase = context.reconciler.phase();
    let dyntype = context.reconciler.resource().clone();
    let tracked = Arc::clone(&context);
    let mut tracker = NotificationTracker::new();

    let queue = reflector::reflector(writer, events)
        .map_ok(move |event| {
            let mut requests: Vec<Result<ObjectRef<DynamicObject>, watcher::Error>> = Vec::new();
            for notification in tracker.observe(event) {
                if let Notification::Delete { object, .. } = &notification {
                    if let Some(key) = ObjectKey::from_object(object) {
                        tracked.forget(&key);
                    }
                }
                if phase.accepts(&notification) {
                    requests.push(Ok(ObjectRef::from_obj_with(notification.object(), dyntype.clone())));
                }
            }
            futures::stream::iter(requests)
        })
        .try_flatten();

    applier(
        |obj: Arc<DynamicObject>, ctx: Arc<Pipeline>| -> ReconcileFuture {
            Box::pin(async move { ctx.reconcile(&obj).await })
        },
        |obj: Arc<DynamicObject>, err: &Error, ctx: Arc<Pipeline>| ctx.error_policy(&obj, err),
        context,
        cache,
        Box::pin(queue),
        ControllerConfig::default().concurrency(concurrency),
    )
}
