//! # Subscription Poller
//!
//! Owns the mutable subscription set and the single background worker that
//! turns it into batched fetch & lock calls. Each cycle snapshots the set,
//! issues one batched request, fans the returned work items out to their
//! handlers with per-item failure isolation, and signals the backoff
//! strategy. Start and stop are serialized; stop blocks until the worker has
//! fully exited, so no handler started by this poller outlives it.
//!
//! Failure policy: everything that happens inside the loop is recovered and
//! logged. A failing fetch degrades the cycle to an empty result, a failing
//! payload mapping skips one work item, a failing or panicking handler never
//! affects its siblings, and a panicking backoff strategy never alters the
//! running state.

use super::builder::TopicSubscriptionBuilder;
use super::TopicSubscription;
use crate::backoff::{BackoffStrategy, ExponentialBackoff};
use crate::config::ClientConfig;
use crate::engine::{EngineClient, FetchAndLockRequest, LockedTask, TopicRequest};
use crate::error::{ClientError, Result};
use crate::task::{ExternalTask, TaskService};
use crate::variables::{DefaultVariableMapper, VariableMapper};
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

/// Polls a remote engine for work items on the subscribed topics and
/// dispatches them to handlers.
///
/// Clones share one underlying poller. Dropping the last clone while the
/// worker is running lets the worker wind down on its own after the current
/// cycle; call [`stop`](SubscriptionPoller::stop) to wait for that
/// deterministically.
#[derive(Clone)]
pub struct SubscriptionPoller {
    core: Arc<PollerCore>,
}

/// Shared state between the poller handle, its subscriptions and the worker.
pub(crate) struct PollerCore {
    config: ClientConfig,
    engine: Arc<dyn EngineClient>,
    mapper: Arc<dyn VariableMapper>,
    backoff: Option<Arc<dyn BackoffStrategy>>,
    /// Insertion-ordered; cycles clone it under the read lock so writers are
    /// only ever blocked for the duration of a clone.
    subscriptions: RwLock<Vec<Arc<TopicSubscription>>>,
    running: AtomicBool,
    shutdown: watch::Sender<bool>,
    /// Serializes start/stop; holds the worker handle between them.
    lifecycle: Mutex<Option<JoinHandle<()>>>,
}

impl SubscriptionPoller {
    /// Create a poller with the default payload mapper and exponential
    /// backoff. Fails on an invalid configuration.
    pub fn new(engine: Arc<dyn EngineClient>, config: ClientConfig) -> Result<Self> {
        Self::with_collaborators(
            engine,
            config,
            Arc::new(DefaultVariableMapper),
            Some(Arc::new(ExponentialBackoff::default())),
        )
    }

    /// Create a poller with explicit collaborators. Passing `None` for the
    /// backoff strategy disables idle backoff entirely: the loop re-polls
    /// immediately after an empty cycle.
    pub fn with_collaborators(
        engine: Arc<dyn EngineClient>,
        config: ClientConfig,
        mapper: Arc<dyn VariableMapper>,
        backoff: Option<Arc<dyn BackoffStrategy>>,
    ) -> Result<Self> {
        config.validate()?;
        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            core: Arc::new(PollerCore {
                config,
                engine,
                mapper,
                backoff,
                subscriptions: RwLock::new(Vec::new()),
                running: AtomicBool::new(false),
                shutdown,
                lifecycle: Mutex::new(None),
            }),
        })
    }

    /// Begin building a subscription for `topic_name`. Nothing is registered
    /// until [`open`](TopicSubscriptionBuilder::open) succeeds.
    pub fn subscription(&self, topic_name: impl Into<String>) -> TopicSubscriptionBuilder {
        TopicSubscriptionBuilder::new(Arc::clone(&self.core), topic_name.into())
    }

    /// Register an already-built subscription.
    ///
    /// Fails with a duplicate-topic error if the topic is already subscribed;
    /// the set is unchanged in that case. Safe to call whether or not the
    /// poller is running; inclusion starts with the next poll cycle.
    pub fn subscribe(&self, subscription: Arc<TopicSubscription>) -> Result<()> {
        PollerCore::register(&self.core, subscription)
    }

    /// Remove a subscription by identity. A no-op for subscriptions that are
    /// not (or no longer) registered. Safe to call from inside a handler.
    pub fn unsubscribe(&self, subscription: &TopicSubscription) {
        self.core.unsubscribe(subscription);
    }

    /// Start the background worker. A no-op if the poller is already
    /// running.
    #[instrument(skip(self), fields(worker_id = %self.core.config.worker_id))]
    pub async fn start(&self) {
        let mut worker = self.core.lifecycle.lock().await;
        if self.core.running.load(Ordering::Acquire) {
            debug!("poller already running");
            return;
        }

        // Fresh signal epoch for this run; receivers created below treat the
        // current value as already seen.
        let _ = self.core.shutdown.send(false);
        self.core.running.store(true, Ordering::Release);

        let shutdown = self.core.shutdown.subscribe();
        let core = Arc::downgrade(&self.core);
        *worker = Some(tokio::spawn(run_loop(core, shutdown)));
        info!("poller started");
    }

    /// Stop the background worker and wait for it to exit.
    ///
    /// A no-op if the poller is not running. Does not abort an in-flight
    /// fetch or handler; the current cycle completes before the worker exits.
    /// After this returns no handler invocation triggered by this poller is
    /// still executing or will start. Must not be called from inside a
    /// handler, since the worker cannot wait for itself.
    #[instrument(skip(self), fields(worker_id = %self.core.config.worker_id))]
    pub async fn stop(&self) {
        let mut worker = self.core.lifecycle.lock().await;
        if !self.core.running.swap(false, Ordering::AcqRel) {
            debug!("poller not running");
            return;
        }

        if let Some(backoff) = &self.core.backoff {
            guard_backoff_call("stop_waiting", || backoff.stop_waiting());
        }
        let _ = self.core.shutdown.send(true);

        if let Some(handle) = worker.take() {
            if let Err(join_error) = handle.await {
                // Worker exit could not be positively confirmed.
                error!(error = %join_error, "poll worker terminated abnormally");
            }
        }
        info!("poller stopped");
    }

    pub fn is_running(&self) -> bool {
        self.core.running.load(Ordering::Acquire)
    }

    /// Number of currently registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.core.subscriptions.read().len()
    }

    /// Topic names of the currently registered subscriptions, in
    /// registration order.
    pub fn topic_names(&self) -> Vec<String> {
        self.core
            .subscriptions
            .read()
            .iter()
            .map(|subscription| subscription.topic_name().to_string())
            .collect()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.core.config
    }

    /// The task service this poller hands to its handlers. Exposed so
    /// callers can drive engine operations outside a handler context.
    pub fn task_service(&self) -> TaskService {
        self.core.task_service()
    }
}

impl PollerCore {
    /// Register a subscription under the set's write lock: duplicate check,
    /// owner binding and insertion are one atomic step.
    pub(crate) fn register(core: &Arc<Self>, subscription: Arc<TopicSubscription>) -> Result<()> {
        let mut subscriptions = core.subscriptions.write();
        if subscriptions
            .iter()
            .any(|existing| existing.topic_name() == subscription.topic_name())
        {
            return Err(ClientError::DuplicateTopic {
                topic_name: subscription.topic_name().to_string(),
            });
        }
        subscription.bind_owner(core)?;
        debug!(topic = subscription.topic_name(), "subscription registered");
        subscriptions.push(subscription);
        Ok(())
    }

    pub(crate) fn unsubscribe(&self, subscription: &TopicSubscription) {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|existing| {
            !std::ptr::eq(
                Arc::as_ptr(existing),
                subscription as *const TopicSubscription,
            )
        });
        if subscriptions.len() < before {
            debug!(topic = subscription.topic_name(), "subscription removed");
        }
    }

    fn task_service(&self) -> TaskService {
        TaskService::new(
            Arc::clone(&self.engine),
            Arc::clone(&self.mapper),
            self.config.worker_id.clone(),
        )
    }

    /// One poll cycle: snapshot, fetch, dispatch, backoff signal.
    async fn poll_cycle(&self, shutdown: &mut watch::Receiver<bool>) {
        let snapshot: Vec<Arc<TopicSubscription>> = self.subscriptions.read().clone();

        if snapshot.is_empty() {
            // Nothing to ask for. This is not the "no matching work" case,
            // so the backoff strategy is not consulted; a short idle delay
            // keeps the loop from spinning against an empty set.
            tokio::select! {
                _ = tokio::time::sleep(self.config.empty_subscriptions_idle) => {}
                _ = shutdown.changed() => {}
            }
            return;
        }

        let by_topic: HashMap<&str, &Arc<TopicSubscription>> = snapshot
            .iter()
            .map(|subscription| (subscription.topic_name(), subscription))
            .collect();
        let request = self.build_request(&snapshot);

        let items = match self.engine.fetch_and_lock(request).await {
            Ok(items) => items,
            Err(fetch_error) => {
                warn!(error = %fetch_error, "fetch and lock failed, treating cycle as empty");
                Vec::new()
            }
        };

        let fetched = items.len();
        trace!(fetched, topics = snapshot.len(), "poll cycle fetched");

        for item in items {
            match by_topic.get(item.topic_name.as_str()) {
                Some(subscription) => self.dispatch(subscription, item).await,
                // The request only named subscribed topics, so this is an
                // engine-side contract violation.
                None => warn!(
                    topic = %item.topic_name,
                    task_id = %item.id,
                    "dropping work item for topic this cycle never requested"
                ),
            }
        }

        if let Some(backoff) = &self.backoff {
            if fetched == 0 {
                self.guarded_backoff_wait(backoff, shutdown).await;
            } else {
                guard_backoff_call("reset", || backoff.reset());
            }
        }
    }

    fn build_request(&self, snapshot: &[Arc<TopicSubscription>]) -> FetchAndLockRequest {
        let default_lock_ms = self.config.default_lock_duration.as_millis() as u64;
        FetchAndLockRequest {
            worker_id: self.config.worker_id.clone(),
            max_tasks: self.config.max_tasks_per_poll,
            async_response_timeout: self
                .config
                .async_response_timeout
                .map(|timeout| timeout.as_millis() as u64),
            use_priority: self.config.use_priority,
            topics: snapshot
                .iter()
                .map(|subscription| TopicRequest {
                    topic_name: subscription.topic_name().to_string(),
                    lock_duration: subscription
                        .lock_duration()
                        .map(|duration| duration.as_millis() as u64)
                        .unwrap_or(default_lock_ms),
                    variables: subscription.variable_names().map(<[String]>::to_vec),
                    business_key: subscription.business_key().map(str::to_string),
                    process_definition_id_in: subscription
                        .process_definition_ids()
                        .map(<[String]>::to_vec),
                })
                .collect(),
        }
    }

    /// Deserialize one work item and run its handler. Failures are logged
    /// and contained; siblings in the same cycle are unaffected.
    async fn dispatch(&self, subscription: &Arc<TopicSubscription>, item: LockedTask) {
        let topic = item.topic_name.clone();
        let task_id = item.id.clone();

        let variables = match self.mapper.deserialize(&item.variables) {
            Ok(variables) => variables,
            Err(mapping_error) => {
                error!(
                    topic = %topic,
                    task_id = %task_id,
                    error = %mapping_error,
                    "variable deserialization failed, skipping work item"
                );
                return;
            }
        };

        let task = ExternalTask::new(item, variables);
        let service = self.task_service();
        let outcome = AssertUnwindSafe(subscription.handler().execute(task, service))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => trace!(topic = %topic, task_id = %task_id, "work item handled"),
            Ok(Err(handler_error)) => error!(
                topic = %topic,
                task_id = %task_id,
                error = %handler_error,
                "handler failed"
            ),
            Err(_) => error!(topic = %topic, task_id = %task_id, "handler panicked"),
        }
    }

    /// Let the backoff strategy idle the worker, but stay interruptible by
    /// shutdown even if the strategy ignores `stop_waiting`, and contain a
    /// panicking strategy.
    async fn guarded_backoff_wait(
        &self,
        backoff: &Arc<dyn BackoffStrategy>,
        shutdown: &mut watch::Receiver<bool>,
    ) {
        let wait = AssertUnwindSafe(backoff.start_waiting()).catch_unwind();
        tokio::select! {
            outcome = wait => {
                if outcome.is_err() {
                    error!(operation = "start_waiting", "backoff strategy panicked");
                }
            }
            _ = shutdown.changed() => {}
        }
    }
}

fn guard_backoff_call(operation: &str, call: impl FnOnce()) {
    if std::panic::catch_unwind(AssertUnwindSafe(call)).is_err() {
        error!(operation, "backoff strategy panicked");
    }
}

/// Worker body: one cycle per iteration while the poller is running. Holds
/// the core only weakly so an abandoned poller winds down instead of leaking
/// a hot loop.
async fn run_loop(core: Weak<PollerCore>, mut shutdown: watch::Receiver<bool>) {
    debug!("poll loop entered");
    loop {
        let Some(core) = core.upgrade() else {
            warn!("poller dropped, poll loop exiting");
            break;
        };
        if !core.running.load(Ordering::Acquire) {
            break;
        }
        core.poll_cycle(&mut shutdown).await;
    }
    debug!("poll loop exited");
}
