//! # Work-Item Handlers
//!
//! A handler processes one work item at a time on the poller's worker. Any
//! error it returns is logged with the owning topic and never escapes the
//! poll loop; reporting an outcome to the engine is the handler's own call
//! through the [`TaskService`].

use crate::task::{ExternalTask, TaskService};
use async_trait::async_trait;
use std::future::Future;

/// Invoked once per fetched work item of the subscribed topic.
///
/// Handlers run sequentially on the poller's worker; a handler that wants
/// parallelism must dispatch internally. A handler that never returns blocks
/// its poller indefinitely.
#[async_trait]
pub trait ExternalTaskHandler: Send + Sync {
    async fn execute(&self, task: ExternalTask, service: TaskService) -> anyhow::Result<()>;
}

/// Adapter that lets an async closure act as a handler; see [`handler_fn`].
pub struct FnHandler<F>(F);

/// Wrap an async closure as an [`ExternalTaskHandler`].
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(ExternalTask, TaskService) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> ExternalTaskHandler for FnHandler<F>
where
    F: Fn(ExternalTask, TaskService) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn execute(&self, task: ExternalTask, service: TaskService) -> anyhow::Result<()> {
        (self.0)(task, service).await
    }
}
