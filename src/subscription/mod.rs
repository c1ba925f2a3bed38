//! # Topic Subscriptions
//!
//! A [`TopicSubscription`] declares interest in one topic: which work items
//! to fetch, how long to lock them, and which handler processes them. It is
//! immutable once built; the only lifecycle operation is [`close`], which
//! removes it from its owning poller. Activity is entirely a property of the
//! poller; a subscription has no running state of its own.
//!
//! [`close`]: TopicSubscription::close

mod builder;
mod poller;

pub use builder::TopicSubscriptionBuilder;
pub use poller::SubscriptionPoller;

use crate::error::ClientError;
use crate::handler::ExternalTaskHandler;
use poller::PollerCore;
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;
use tracing::debug;

/// An active interest in one topic, held by at most one poller.
pub struct TopicSubscription {
    topic_name: String,
    lock_duration: Option<Duration>,
    variable_names: Option<Vec<String>>,
    business_key: Option<String>,
    process_definition_ids: Option<Vec<String>>,
    handler: Arc<dyn ExternalTaskHandler>,
    /// Bound once, at registration time.
    owner: OnceLock<Weak<PollerCore>>,
}

impl TopicSubscription {
    pub(crate) fn new(
        topic_name: String,
        lock_duration: Option<Duration>,
        variable_names: Option<Vec<String>>,
        business_key: Option<String>,
        process_definition_ids: Option<Vec<String>>,
        handler: Arc<dyn ExternalTaskHandler>,
    ) -> Self {
        Self {
            topic_name,
            lock_duration,
            variable_names,
            business_key,
            process_definition_ids,
            handler,
            owner: OnceLock::new(),
        }
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    /// Lock duration override; the poller default applies when absent.
    pub fn lock_duration(&self) -> Option<Duration> {
        self.lock_duration
    }

    /// Variable names fetched with each work item. Absent means no payload
    /// variables are requested; an empty list requests none explicitly.
    pub fn variable_names(&self) -> Option<&[String]> {
        self.variable_names.as_deref()
    }

    pub fn business_key(&self) -> Option<&str> {
        self.business_key.as_deref()
    }

    pub fn process_definition_ids(&self) -> Option<&[String]> {
        self.process_definition_ids.as_deref()
    }

    pub(crate) fn handler(&self) -> &Arc<dyn ExternalTaskHandler> {
        &self.handler
    }

    /// Remove this subscription from its owning poller.
    ///
    /// Idempotent: closing an already-closed subscription is a no-op. Work
    /// items fetched under this topic before the removal was observed still
    /// run their handler to completion.
    pub fn close(&self) {
        if let Some(core) = self.owner.get().and_then(Weak::upgrade) {
            core.unsubscribe(self);
        } else {
            debug!(topic = %self.topic_name, "close on unbound subscription ignored");
        }
    }

    /// Bind this subscription to its poller. Rebinding to the same poller is
    /// allowed (re-subscribe after close); any other poller is rejected.
    pub(crate) fn bind_owner(&self, core: &Arc<PollerCore>) -> Result<(), ClientError> {
        let weak = Arc::downgrade(core);
        if let Err(rejected) = self.owner.set(weak) {
            match self.owner.get() {
                Some(bound) if bound.ptr_eq(&rejected) => {}
                _ => {
                    return Err(ClientError::AlreadyRegistered {
                        topic_name: self.topic_name.clone(),
                    })
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for TopicSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicSubscription")
            .field("topic_name", &self.topic_name)
            .field("lock_duration", &self.lock_duration)
            .field("variable_names", &self.variable_names)
            .field("business_key", &self.business_key)
            .field("process_definition_ids", &self.process_definition_ids)
            .finish_non_exhaustive()
    }
}
