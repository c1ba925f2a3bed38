//! # Subscription Builder
//!
//! Fluent, write-once configuration for a [`TopicSubscription`]. Every
//! setter may be called repeatedly before [`open`](TopicSubscriptionBuilder::open);
//! the last value wins. `open` validates, constructs the subscription and
//! registers it with the poller in one step; on success the subscription is
//! already active and will be included from the next poll cycle on.

use super::poller::PollerCore;
use super::TopicSubscription;
use crate::error::{ClientError, Result};
use crate::handler::ExternalTaskHandler;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Builder returned by [`SubscriptionPoller::subscription`](super::SubscriptionPoller::subscription).
pub struct TopicSubscriptionBuilder {
    core: Arc<PollerCore>,
    topic_name: String,
    lock_duration: Option<Duration>,
    variable_names: Option<Vec<String>>,
    business_key: Option<String>,
    process_definition_ids: Option<Vec<String>>,
    handler: Option<Arc<dyn ExternalTaskHandler>>,
}

impl TopicSubscriptionBuilder {
    pub(crate) fn new(core: Arc<PollerCore>, topic_name: String) -> Self {
        Self {
            core,
            topic_name,
            lock_duration: None,
            variable_names: None,
            business_key: None,
            process_definition_ids: None,
            handler: None,
        }
    }

    /// Override the poller's default lock duration for this topic.
    pub fn lock_duration(mut self, duration: Duration) -> Self {
        self.lock_duration = Some(duration);
        self
    }

    /// Set the handler invoked for each fetched work item.
    pub fn handler(mut self, handler: impl ExternalTaskHandler + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Set the handler from an async closure.
    pub fn handler_fn<F, Fut>(self, f: F) -> Self
    where
        F: Fn(crate::task::ExternalTask, crate::task::TaskService) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.handler(crate::handler::handler_fn(f))
    }

    /// Set the handler from an already-shared instance.
    pub fn shared_handler(mut self, handler: Arc<dyn ExternalTaskHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Request exactly these variable names with each work item. Passing an
    /// empty collection explicitly requests none; not calling this at all
    /// leaves payload variables unfetched.
    pub fn variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variable_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict matching work items to one business key.
    pub fn business_key(mut self, business_key: impl Into<String>) -> Self {
        self.business_key = Some(business_key.into());
        self
    }

    /// Restrict matching work items to the given process definitions.
    pub fn process_definition_id_in<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.process_definition_ids = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Validate, construct the subscription and register it with the poller.
    ///
    /// Fails with a configuration error for an empty topic name, a missing
    /// handler or a zero lock duration; fails with a duplicate-topic error if
    /// the poller already holds a subscription for this topic. On failure
    /// nothing is registered.
    pub fn open(self) -> Result<Arc<TopicSubscription>> {
        if self.topic_name.trim().is_empty() {
            return Err(ClientError::InvalidSubscription {
                reason: "topic name must not be empty".to_string(),
            });
        }

        let handler = self.handler.ok_or_else(|| ClientError::InvalidSubscription {
            reason: format!("topic '{}' has no handler", self.topic_name),
        })?;

        if let Some(duration) = self.lock_duration {
            if duration.is_zero() {
                return Err(ClientError::InvalidSubscription {
                    reason: format!("topic '{}' has a zero lock duration", self.topic_name),
                });
            }
        }

        let subscription = Arc::new(TopicSubscription::new(
            self.topic_name,
            self.lock_duration,
            self.variable_names,
            self.business_key,
            self.process_definition_ids,
            handler,
        ));

        PollerCore::register(&self.core, Arc::clone(&subscription))?;
        debug!(topic = subscription.topic_name(), "subscription opened");
        Ok(subscription)
    }
}
