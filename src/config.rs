//! # Client Configuration
//!
//! Process-wide settings for a poller instance. Defaults are usable out of
//! the box; `from_env` applies environment overrides for deployments that
//! configure workers per host.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a [`SubscriptionPoller`](crate::SubscriptionPoller).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Identifier under which work items are locked on the engine.
    pub worker_id: String,
    /// Lock duration applied to topics without an explicit override.
    pub default_lock_duration: Duration,
    /// Upper bound of work items requested per fetch cycle.
    pub max_tasks_per_poll: usize,
    /// Long-poll hint sent with each fetch; `None` requests an immediate
    /// response.
    pub async_response_timeout: Option<Duration>,
    /// Ask the engine to return higher-priority work items first.
    pub use_priority: bool,
    /// Idle delay applied when a cycle finds zero subscriptions. Distinct
    /// from backoff, which only reacts to "no matching work".
    pub empty_subscriptions_idle: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            worker_id: generated_worker_id(),
            default_lock_duration: Duration::from_secs(20),
            max_tasks_per_poll: 10,
            async_response_timeout: None,
            use_priority: true,
            empty_subscriptions_idle: Duration::from_millis(50),
        }
    }
}

impl ClientConfig {
    /// Build a configuration from defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(worker_id) = std::env::var("EXTERNAL_TASK_WORKER_ID") {
            config.worker_id = worker_id;
        }

        if let Ok(lock_ms) = std::env::var("EXTERNAL_TASK_LOCK_DURATION_MS") {
            let millis: u64 = lock_ms.parse().map_err(|e| ClientError::Configuration {
                reason: format!("invalid EXTERNAL_TASK_LOCK_DURATION_MS: {e}"),
            })?;
            config.default_lock_duration = Duration::from_millis(millis);
        }

        if let Ok(max_tasks) = std::env::var("EXTERNAL_TASK_MAX_TASKS") {
            config.max_tasks_per_poll =
                max_tasks.parse().map_err(|e| ClientError::Configuration {
                    reason: format!("invalid EXTERNAL_TASK_MAX_TASKS: {e}"),
                })?;
        }

        if let Ok(timeout_ms) = std::env::var("EXTERNAL_TASK_ASYNC_RESPONSE_TIMEOUT_MS") {
            let millis: u64 = timeout_ms.parse().map_err(|e| ClientError::Configuration {
                reason: format!("invalid EXTERNAL_TASK_ASYNC_RESPONSE_TIMEOUT_MS: {e}"),
            })?;
            config.async_response_timeout = Some(Duration::from_millis(millis));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the poller cannot operate with.
    pub fn validate(&self) -> Result<()> {
        if self.worker_id.trim().is_empty() {
            return Err(ClientError::Configuration {
                reason: "worker_id must not be empty".to_string(),
            });
        }
        if self.default_lock_duration.is_zero() {
            return Err(ClientError::Configuration {
                reason: "default_lock_duration must be positive".to_string(),
            });
        }
        if self.max_tasks_per_poll == 0 {
            return Err(ClientError::Configuration {
                reason: "max_tasks_per_poll must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

fn generated_worker_id() -> String {
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "worker".to_string());
    format!("{host}-{}", uuid::Uuid::new_v4())
}
