//! Contracts for the services this crate consumes but does not own: the
//! event-type and subscription directories, and cursor token generation.

use std::collections::BTreeSet;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::ResolutionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventType {
    pub name: String,
    /// The log topic currently backing this event type.
    pub topic: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: String,
    pub event_types: BTreeSet<String>,
}

impl Subscription {
    pub fn includes(&self, event_type: &str) -> bool {
        self.event_types.contains(event_type)
    }
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait EventTypeDirectory: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<EventType, ResolutionError>;
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait SubscriptionDirectory: Send + Sync {
    async fn get_subscription(&self, id: &str) -> Result<Subscription, ResolutionError>;
}

/// Mints the opaque token handed out with every cursor read.
#[cfg_attr(test, automock)]
pub trait TokenService: Send + Sync {
    fn generate_token(&self) -> String;
}
