#![allow(clippy::doc_markdown)] // Allow technical terms in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # External Task Client
//!
//! Polling client for external work items on a remote process engine. A
//! [`SubscriptionPoller`] holds a mutable set of topic subscriptions, runs a
//! single background worker that fetches and locks work items in one batched
//! request per cycle, and dispatches each item to its topic's handler with
//! per-item failure isolation. Subscriptions can be added and removed at any
//! time, independent of whether the poller is running.
//!
//! ## Architecture
//!
//! - [`subscription`] - subscriptions, the fluent builder and the poller
//! - [`engine`] - the engine boundary: `EngineClient` trait and wire DTOs
//! - [`task`] - dispatched work items and the handler-facing task service
//! - [`handler`] - the work-item handler trait
//! - [`variables`] - wire/typed variable values and the payload mapper
//! - [`backoff`] - idle policy after empty cycles
//! - [`config`] - poller configuration
//! - [`error`] - the error taxonomy
//!
//! One failing work item (unmappable payload, failing handler) never affects
//! its siblings or the loop; transport errors degrade a cycle to an empty
//! result; the only errors a caller sees directly are configuration errors
//! raised when opening a subscription or constructing a poller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use external_task_client::{ClientConfig, SubscriptionPoller};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example(engine: Arc<dyn external_task_client::EngineClient>) -> anyhow::Result<()> {
//! let poller = SubscriptionPoller::new(engine, ClientConfig::default())?;
//!
//! poller
//!     .subscription("invoice")
//!     .lock_duration(Duration::from_secs(5))
//!     .variables(["amount"])
//!     .handler_fn(|task, service| async move {
//!         // process the work item, then report the outcome
//!         service.complete(&task).await?;
//!         Ok(())
//!     })
//!     .open()?;
//!
//! poller.start().await;
//! // ... later
//! poller.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod engine;
pub mod error;
pub mod handler;
pub mod logging;
pub mod subscription;
pub mod task;
pub mod variables;

pub use backoff::{BackoffStrategy, ExponentialBackoff};
pub use config::ClientConfig;
pub use engine::{
    BusinessErrorRequest, CompleteRequest, EngineClient, FailureRequest, FetchAndLockRequest,
    LockedTask, TopicRequest,
};
pub use error::{ClientError, EngineError, VariableError};
pub use handler::{handler_fn, ExternalTaskHandler, FnHandler};
pub use subscription::{SubscriptionPoller, TopicSubscription, TopicSubscriptionBuilder};
pub use task::{ExternalTask, TaskService};
pub use variables::{
    DefaultVariableMapper, TypedValue, TypedVariables, VariableMapper, VariableValue,
};
