use std::sync::Arc;

use coordination_store::{CoordinationStore, Guard};

use crate::error::Result;
use crate::keys::StoreKey;
use crate::types::{SessionAssignment, TopicPartition};

/// A session assignment as read from the store, with the revision it was read
/// at so that later writes can be made conditional on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedAssignment {
    /// `None` when the record is missing or unreadable.
    pub assignment: Option<SessionAssignment>,
    /// Store revision of the record; 0 when missing.
    pub mod_revision: i64,
}

impl ObservedAssignment {
    pub fn is_owned_by(&self, stream_id: &str) -> bool {
        self.assignment
            .as_ref()
            .is_some_and(|a| a.is_owned_by(stream_id))
    }
}

/// Reads partition leases written by the rebalancer and decides whether a
/// streaming session currently owns a partition.
#[derive(Clone)]
pub struct OwnershipRegistry {
    store: Arc<dyn CoordinationStore>,
}

impl OwnershipRegistry {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    pub(crate) fn assignment_key(&self, subscription: &str, tp: &TopicPartition) -> String {
        StoreKey::PartitionAssignment {
            subscription,
            topic: &tp.topic,
            partition: &tp.partition,
        }
        .resolve(self.store.prefix())
    }

    pub async fn lookup(&self, subscription: &str, tp: &TopicPartition) -> Result<ObservedAssignment> {
        let key = self.assignment_key(subscription, tp);
        let Some(record) = self.store.get(&key).await? else {
            return Ok(ObservedAssignment {
                assignment: None,
                mod_revision: 0,
            });
        };

        let assignment = match record.value_str().map(SessionAssignment::parse) {
            Ok(Ok(assignment)) => Some(assignment),
            Ok(Err(reason)) => {
                tracing::warn!(%key, %reason, "malformed session assignment, treating as unowned");
                None
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "unreadable session assignment, treating as unowned");
                None
            }
        };

        Ok(ObservedAssignment {
            assignment,
            mod_revision: record.mod_revision,
        })
    }

    /// True iff the partition's record names `stream_id` with status ASSIGNED.
    /// A missing record means not owned.
    pub async fn owns_partition(
        &self,
        stream_id: &str,
        subscription: &str,
        topic: &str,
        partition: &str,
    ) -> Result<bool> {
        let tp = TopicPartition {
            topic: topic.to_string(),
            partition: partition.to_string(),
        };
        Ok(self.lookup(subscription, &tp).await?.is_owned_by(stream_id))
    }

    pub async fn session_exists(&self, subscription: &str, stream_id: &str) -> Result<bool> {
        let key = StoreKey::Session {
            subscription,
            stream_id,
        }
        .resolve(self.store.prefix());
        Ok(self.store.get(&key).await?.is_some())
    }

    /// Write condition that fails if the assignment changed since `observed`.
    pub fn guard(
        &self,
        subscription: &str,
        tp: &TopicPartition,
        observed: &ObservedAssignment,
    ) -> Guard {
        Guard {
            key: self.assignment_key(subscription, tp),
            mod_revision: observed.mod_revision,
        }
    }
}
