//! Shared test doubles: a scripted engine client, a recording handler and a
//! recording backoff strategy, plus small wait helpers for driving the
//! poller's background worker deterministically.

#![allow(dead_code)]

use async_trait::async_trait;
use external_task_client::engine::{
    BusinessErrorRequest, CompleteRequest, EngineClient, FailureRequest, FetchAndLockRequest,
    LockedTask,
};
use external_task_client::error::EngineError;
use external_task_client::task::{ExternalTask, TaskService};
use external_task_client::variables::VariableValue;
use external_task_client::ExternalTaskHandler;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub fn init() {
    external_task_client::logging::init_logging();
}

/// Engine client that replays a scripted sequence of fetch results and
/// records every call made against it. Once the script is exhausted every
/// further fetch returns no work.
#[derive(Default)]
pub struct MockEngineClient {
    script: Mutex<VecDeque<Result<Vec<LockedTask>, EngineError>>>,
    fetch_requests: Mutex<Vec<FetchAndLockRequest>>,
    completions: Mutex<Vec<(String, CompleteRequest)>>,
    failures: Mutex<Vec<(String, FailureRequest)>>,
    business_errors: Mutex<Vec<(String, BusinessErrorRequest)>>,
    lock_extensions: Mutex<Vec<(String, u64)>>,
    unlocked: Mutex<Vec<String>>,
    variable_updates: Mutex<Vec<(String, HashMap<String, VariableValue>)>>,
}

impl MockEngineClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, response: Result<Vec<LockedTask>, EngineError>) {
        self.script.lock().push_back(response);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_requests.lock().len()
    }

    pub fn fetch_requests(&self) -> Vec<FetchAndLockRequest> {
        self.fetch_requests.lock().clone()
    }

    pub fn last_fetch_request(&self) -> Option<FetchAndLockRequest> {
        self.fetch_requests.lock().last().cloned()
    }

    pub fn completions(&self) -> Vec<(String, CompleteRequest)> {
        self.completions.lock().clone()
    }

    pub fn failures(&self) -> Vec<(String, FailureRequest)> {
        self.failures.lock().clone()
    }

    pub fn business_errors(&self) -> Vec<(String, BusinessErrorRequest)> {
        self.business_errors.lock().clone()
    }

    pub fn lock_extensions(&self) -> Vec<(String, u64)> {
        self.lock_extensions.lock().clone()
    }

    pub fn unlocked(&self) -> Vec<String> {
        self.unlocked.lock().clone()
    }

    pub fn variable_updates(&self) -> Vec<(String, HashMap<String, VariableValue>)> {
        self.variable_updates.lock().clone()
    }
}

#[async_trait]
impl EngineClient for MockEngineClient {
    async fn fetch_and_lock(
        &self,
        request: FetchAndLockRequest,
    ) -> Result<Vec<LockedTask>, EngineError> {
        self.fetch_requests.lock().push(request);
        self.script.lock().pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn complete(&self, task_id: &str, request: CompleteRequest) -> Result<(), EngineError> {
        self.completions.lock().push((task_id.to_string(), request));
        Ok(())
    }

    async fn report_failure(
        &self,
        task_id: &str,
        request: FailureRequest,
    ) -> Result<(), EngineError> {
        self.failures.lock().push((task_id.to_string(), request));
        Ok(())
    }

    async fn report_business_error(
        &self,
        task_id: &str,
        request: BusinessErrorRequest,
    ) -> Result<(), EngineError> {
        self.business_errors
            .lock()
            .push((task_id.to_string(), request));
        Ok(())
    }

    async fn extend_lock(&self, task_id: &str, new_duration: u64) -> Result<(), EngineError> {
        self.lock_extensions
            .lock()
            .push((task_id.to_string(), new_duration));
        Ok(())
    }

    async fn unlock(&self, task_id: &str) -> Result<(), EngineError> {
        self.unlocked.lock().push(task_id.to_string());
        Ok(())
    }

    async fn set_variables(
        &self,
        process_instance_id: &str,
        variables: HashMap<String, VariableValue>,
    ) -> Result<(), EngineError> {
        self.variable_updates
            .lock()
            .push((process_instance_id.to_string(), variables));
        Ok(())
    }
}

/// What a [`RecordingHandler`] does with each work item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HandlerBehavior {
    Succeed,
    Fail,
    /// Panic for work items whose business key is `"boom"`, succeed
    /// otherwise.
    PanicOnBoom,
    /// Complete the work item through the task service.
    Complete,
}

/// Handler that records every invocation.
pub struct RecordingHandler {
    behavior: HandlerBehavior,
    delay: Option<Duration>,
    handled: Mutex<Vec<ExternalTask>>,
    started: AtomicUsize,
    finished: AtomicUsize,
}

impl RecordingHandler {
    pub fn new(behavior: HandlerBehavior) -> Self {
        Self {
            behavior,
            delay: None,
            handled: Mutex::new(Vec::new()),
            started: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(behavior: HandlerBehavior, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(behavior)
        }
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::Acquire)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::Acquire)
    }

    pub fn handled_tasks(&self) -> Vec<ExternalTask> {
        self.handled.lock().clone()
    }
}

#[async_trait]
impl ExternalTaskHandler for RecordingHandler {
    async fn execute(&self, task: ExternalTask, service: TaskService) -> anyhow::Result<()> {
        self.started.fetch_add(1, Ordering::AcqRel);
        self.handled.lock().push(task.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let outcome = match self.behavior {
            HandlerBehavior::Succeed => Ok(()),
            HandlerBehavior::Fail => Err(anyhow::anyhow!("handler rejected {}", task.id())),
            HandlerBehavior::PanicOnBoom => {
                if task.business_key() == Some("boom") {
                    panic!("boom");
                }
                Ok(())
            }
            HandlerBehavior::Complete => service.complete(&task).await.map_err(Into::into),
        };

        self.finished.fetch_add(1, Ordering::AcqRel);
        outcome
    }
}

/// Backoff strategy that counts signals and idles only briefly, keeping
/// tests fast while still exercising the wait path.
#[derive(Default)]
pub struct RecordingBackoff {
    start_waiting_count: AtomicUsize,
    reset_count: AtomicUsize,
    stop_waiting_count: AtomicUsize,
}

impl RecordingBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_waiting_count(&self) -> usize {
        self.start_waiting_count.load(Ordering::Acquire)
    }

    pub fn reset_count(&self) -> usize {
        self.reset_count.load(Ordering::Acquire)
    }

    pub fn stop_waiting_count(&self) -> usize {
        self.stop_waiting_count.load(Ordering::Acquire)
    }
}

#[async_trait]
impl external_task_client::BackoffStrategy for RecordingBackoff {
    async fn start_waiting(&self) {
        self.start_waiting_count.fetch_add(1, Ordering::AcqRel);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    fn stop_waiting(&self) {
        self.stop_waiting_count.fetch_add(1, Ordering::AcqRel);
    }

    fn reset(&self) {
        self.reset_count.fetch_add(1, Ordering::AcqRel);
    }
}

/// Build a locked task with wire variables.
pub fn locked_task(
    id: &str,
    topic: &str,
    variables: &[(&str, &str, serde_json::Value)],
) -> LockedTask {
    LockedTask {
        id: id.to_string(),
        topic_name: topic.to_string(),
        variables: variables
            .iter()
            .map(|(name, type_name, value)| {
                (
                    name.to_string(),
                    VariableValue::new(*type_name, value.clone()),
                )
            })
            .collect(),
        ..LockedTask::default()
    }
}

pub fn locked_task_with_business_key(id: &str, topic: &str, business_key: &str) -> LockedTask {
    LockedTask {
        business_key: Some(business_key.to_string()),
        ..locked_task(id, topic, &[])
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !condition() {
        assert!(
            Instant::now() < deadline,
            "condition not met within {timeout:?}"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
