//! # Work Items and the Task Service
//!
//! [`ExternalTask`] is the unit handed to handlers: the locked work item plus
//! its deserialized variables. [`TaskService`] is the handle a handler uses
//! to report the outcome back to the engine; every call is a thin forward to
//! the [`EngineClient`](crate::engine::EngineClient) and returns the engine's
//! error unchanged.

use crate::engine::{
    BusinessErrorRequest, CompleteRequest, EngineClient, FailureRequest, LockedTask,
};
use crate::error::EngineError;
use crate::variables::{TypedValue, TypedVariables, VariableMapper, VariableValue};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A fetched and locked work item with its payload deserialized.
#[derive(Debug, Clone)]
pub struct ExternalTask {
    locked: LockedTask,
    variables: TypedVariables,
}

impl ExternalTask {
    pub(crate) fn new(locked: LockedTask, variables: TypedVariables) -> Self {
        Self { locked, variables }
    }

    pub fn id(&self) -> &str {
        &self.locked.id
    }

    pub fn topic_name(&self) -> &str {
        &self.locked.topic_name
    }

    pub fn business_key(&self) -> Option<&str> {
        self.locked.business_key.as_deref()
    }

    pub fn process_instance_id(&self) -> Option<&str> {
        self.locked.process_instance_id.as_deref()
    }

    pub fn process_definition_id(&self) -> Option<&str> {
        self.locked.process_definition_id.as_deref()
    }

    pub fn process_definition_key(&self) -> Option<&str> {
        self.locked.process_definition_key.as_deref()
    }

    pub fn retries(&self) -> Option<i32> {
        self.locked.retries
    }

    pub fn priority(&self) -> i64 {
        self.locked.priority
    }

    pub fn lock_expiration_time(&self) -> Option<DateTime<Utc>> {
        self.locked.lock_expiration_time
    }

    /// All deserialized variables of this work item.
    pub fn variables(&self) -> &TypedVariables {
        &self.variables
    }

    /// One deserialized variable by name.
    pub fn variable(&self, name: &str) -> Option<&TypedValue> {
        self.variables.get(name)
    }
}

/// Handle through which handlers interact with the engine for one poller.
///
/// Cheap to clone; all clones share the engine client and worker identity.
#[derive(Clone)]
pub struct TaskService {
    engine: Arc<dyn EngineClient>,
    mapper: Arc<dyn VariableMapper>,
    worker_id: String,
}

impl TaskService {
    pub(crate) fn new(
        engine: Arc<dyn EngineClient>,
        mapper: Arc<dyn VariableMapper>,
        worker_id: String,
    ) -> Self {
        Self {
            engine,
            mapper,
            worker_id,
        }
    }

    /// Complete a work item without returning variables.
    pub async fn complete(&self, task: &ExternalTask) -> Result<(), EngineError> {
        self.complete_with_variables(task, TypedVariables::new(), TypedVariables::new())
            .await
    }

    /// Complete a work item, setting `variables` in the process scope and
    /// `local_variables` on the work item's execution.
    pub async fn complete_with_variables(
        &self,
        task: &ExternalTask,
        variables: TypedVariables,
        local_variables: TypedVariables,
    ) -> Result<(), EngineError> {
        debug!(task_id = task.id(), topic = task.topic_name(), "completing work item");
        self.engine
            .complete(
                task.id(),
                CompleteRequest {
                    worker_id: self.worker_id.clone(),
                    variables: self.mapper.serialize(&variables),
                    local_variables: self.mapper.serialize(&local_variables),
                },
            )
            .await
    }

    /// Report a failure. `retries` is the count remaining after this attempt;
    /// zero parks the work item until retries are raised externally.
    pub async fn report_failure(
        &self,
        task: &ExternalTask,
        error_message: &str,
        error_details: Option<&str>,
        retries: i32,
        retry_timeout: Duration,
    ) -> Result<(), EngineError> {
        debug!(
            task_id = task.id(),
            topic = task.topic_name(),
            retries,
            "reporting work item failure"
        );
        self.engine
            .report_failure(
                task.id(),
                FailureRequest {
                    worker_id: self.worker_id.clone(),
                    error_message: error_message.to_string(),
                    error_details: error_details.map(str::to_string),
                    retries,
                    retry_timeout: retry_timeout.as_millis() as u64,
                },
            )
            .await
    }

    /// Report a business error identified by `error_code`, routed to the
    /// process's own error handling.
    pub async fn report_business_error(
        &self,
        task: &ExternalTask,
        error_code: &str,
        error_message: Option<&str>,
        variables: TypedVariables,
    ) -> Result<(), EngineError> {
        debug!(
            task_id = task.id(),
            topic = task.topic_name(),
            error_code,
            "reporting business error"
        );
        self.engine
            .report_business_error(
                task.id(),
                BusinessErrorRequest {
                    worker_id: self.worker_id.clone(),
                    error_code: error_code.to_string(),
                    error_message: error_message.map(str::to_string),
                    variables: self.mapper.serialize(&variables),
                },
            )
            .await
    }

    /// Extend this worker's lock on the work item.
    pub async fn extend_lock(
        &self,
        task: &ExternalTask,
        new_duration: Duration,
    ) -> Result<(), EngineError> {
        self.engine
            .extend_lock(task.id(), new_duration.as_millis() as u64)
            .await
    }

    /// Give the work item back without completing it.
    pub async fn unlock(&self, task: &ExternalTask) -> Result<(), EngineError> {
        self.engine.unlock(task.id()).await
    }

    /// Set variables in the scope of a process instance.
    pub async fn set_variables(
        &self,
        process_instance_id: &str,
        variables: TypedVariables,
    ) -> Result<(), EngineError> {
        let wire: HashMap<String, VariableValue> = self.mapper.serialize(&variables);
        self.engine.set_variables(process_instance_id, wire).await
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::LockedTask;
    use crate::variables::TypedValue;

    #[test]
    fn task_exposes_locked_metadata() {
        let locked = LockedTask {
            id: "task-1".to_string(),
            topic_name: "invoice".to_string(),
            business_key: Some("order-9".to_string()),
            priority: 10,
            retries: Some(2),
            ..LockedTask::default()
        };
        let mut variables = TypedVariables::new();
        variables.insert("amount", TypedValue::Double(12.5));

        let task = ExternalTask::new(locked, variables);
        assert_eq!(task.id(), "task-1");
        assert_eq!(task.topic_name(), "invoice");
        assert_eq!(task.business_key(), Some("order-9"));
        assert_eq!(task.retries(), Some(2));
        assert_eq!(task.priority(), 10);
        assert_eq!(task.variable("amount"), Some(&TypedValue::Double(12.5)));
        assert!(task.variable("missing").is_none());
    }
}
