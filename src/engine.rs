//! # Engine Boundary
//!
//! The remote process engine is an external collaborator reached through the
//! [`EngineClient`] trait. The poller only issues `fetch_and_lock`; every
//! other operation is invoked by handlers through
//! [`TaskService`](crate::task::TaskService). Transport, authentication and
//! retries live behind implementations of this trait.
//!
//! All DTOs serialize with the engine's camelCase wire names; optional fields
//! are omitted when absent.

use crate::error::EngineError;
use crate::variables::VariableValue;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One topic entry inside a batched fetch & lock request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicRequest {
    pub topic_name: String,
    /// Effective lock duration in milliseconds (subscription override or the
    /// poller default).
    pub lock_duration: u64,
    /// Variable names to fetch with each work item. Absent means the engine
    /// returns no payload variables for this topic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub business_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub process_definition_id_in: Option<Vec<String>>,
}

/// The batched fetch & lock envelope, one per poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchAndLockRequest {
    pub worker_id: String,
    pub max_tasks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_response_timeout: Option<u64>,
    pub use_priority: bool,
    pub topics: Vec<TopicRequest>,
}

/// A work item as returned by fetch & lock: exclusively locked for this
/// worker, variables still in wire form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LockedTask {
    pub id: String,
    pub topic_name: String,
    pub worker_id: Option<String>,
    pub business_key: Option<String>,
    pub process_instance_id: Option<String>,
    pub process_definition_id: Option<String>,
    pub process_definition_key: Option<String>,
    pub retries: Option<i32>,
    pub priority: i64,
    pub lock_expiration_time: Option<DateTime<Utc>>,
    pub variables: HashMap<String, VariableValue>,
}

/// Completion payload: variables set in the surrounding process scope plus
/// variables local to the work item's execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub worker_id: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    #[serde(default)]
    pub variables: HashMap<String, VariableValue>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    #[serde(default)]
    pub local_variables: HashMap<String, VariableValue>,
}

/// Failure report: keeps or exhausts retries, optionally delaying the next
/// delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRequest {
    pub worker_id: String,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_details: Option<String>,
    /// Retries remaining after this failure. Zero makes the work item
    /// unfetchable until retries are raised externally.
    pub retries: i32,
    /// Delay in milliseconds before the work item may be fetched again.
    pub retry_timeout: u64,
}

/// Business-error report routed to the process's error handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessErrorRequest {
    pub worker_id: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    #[serde(default)]
    pub variables: HashMap<String, VariableValue>,
}

/// Client interface to the remote engine.
///
/// Implementations own transport concerns entirely; every method maps to one
/// remote call and surfaces failures as [`EngineError`].
#[async_trait]
pub trait EngineClient: Send + Sync {
    /// Atomically claim and lock up to `max_tasks` work items across the
    /// requested topics.
    async fn fetch_and_lock(
        &self,
        request: FetchAndLockRequest,
    ) -> Result<Vec<LockedTask>, EngineError>;

    /// Complete a locked work item.
    async fn complete(
        &self,
        task_id: &str,
        request: CompleteRequest,
    ) -> Result<(), EngineError>;

    /// Report a processing failure for a locked work item.
    async fn report_failure(
        &self,
        task_id: &str,
        request: FailureRequest,
    ) -> Result<(), EngineError>;

    /// Report a business error for a locked work item.
    async fn report_business_error(
        &self,
        task_id: &str,
        request: BusinessErrorRequest,
    ) -> Result<(), EngineError>;

    /// Extend the lock on a work item by a new duration in milliseconds.
    async fn extend_lock(&self, task_id: &str, new_duration: u64) -> Result<(), EngineError>;

    /// Clear the lock so the work item becomes fetchable by any worker.
    async fn unlock(&self, task_id: &str) -> Result<(), EngineError>;

    /// Set variables in the scope of a process instance.
    async fn set_variables(
        &self,
        process_instance_id: &str,
        variables: HashMap<String, VariableValue>,
    ) -> Result<(), EngineError>;
}
