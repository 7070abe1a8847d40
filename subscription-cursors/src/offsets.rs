use std::sync::Arc;

use coordination_store::{CoordinationStore, Guard};

use crate::error::Result;
use crate::keys::{partition_from_offset_key, StoreKey};
use crate::types::TopicPartition;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedOffset {
    pub offset: String,
    /// Token for [`PartitionOffsetStore::compare_and_set`].
    pub version: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    Applied,
    /// The offset or one of the guards changed since it was read.
    Conflict,
}

/// Read and compare-and-set access to committed offsets, keyed by
/// (subscription, topic, partition).
#[derive(Clone)]
pub struct PartitionOffsetStore {
    store: Arc<dyn CoordinationStore>,
}

impl PartitionOffsetStore {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    fn offset_key(&self, subscription: &str, tp: &TopicPartition) -> String {
        StoreKey::PartitionOffset {
            subscription,
            topic: &tp.topic,
            partition: &tp.partition,
        }
        .resolve(self.store.prefix())
    }

    pub async fn read(
        &self,
        subscription: &str,
        tp: &TopicPartition,
    ) -> Result<Option<VersionedOffset>> {
        let key = self.offset_key(subscription, tp);
        match self.store.get(&key).await? {
            Some(record) => Ok(Some(VersionedOffset {
                offset: record.value_str()?.to_string(),
                version: record.version,
            })),
            None => Ok(None),
        }
    }

    pub async fn compare_and_set(
        &self,
        subscription: &str,
        tp: &TopicPartition,
        version: i64,
        offset: &str,
        guards: &[Guard],
    ) -> Result<CasOutcome> {
        let key = self.offset_key(subscription, tp);
        let applied = self
            .store
            .compare_and_set(&key, version, offset.as_bytes(), guards)
            .await?;
        Ok(if applied {
            CasOutcome::Applied
        } else {
            CasOutcome::Conflict
        })
    }

    /// Every committed offset for one topic of a subscription, as
    /// `(partition, offset)` ordered by partition key.
    pub async fn list_for_topic(
        &self,
        subscription: &str,
        topic: &str,
    ) -> Result<Vec<(String, String)>> {
        let prefix = StoreKey::TopicPrefix {
            subscription,
            topic,
        }
        .resolve(self.store.prefix());

        let mut offsets = Vec::new();
        for (key, record) in self.store.list(&prefix).await? {
            let Some(partition) = key
                .strip_prefix(&prefix)
                .and_then(partition_from_offset_key)
            else {
                continue;
            };
            offsets.push((partition.to_string(), record.value_str()?.to_string()));
        }
        Ok(offsets)
    }
}
