/// Coordination-store key patterns for subscription cursors.
///
/// Full key scheme:
/// ```text
/// {prefix}subscriptions/{subscription}/topics/{topic}/{partition}/offset
/// {prefix}subscriptions/{subscription}/topics/{topic}/{partition}
/// {prefix}subscriptions/{subscription}/sessions/{stream_id}
/// ```
///
/// The partition key holds the session assignment, the `offset` child holds
/// the committed offset. Sessions are ephemeral markers owned by the streaming
/// layer.
#[derive(Debug, Clone, Copy)]
pub enum StoreKey<'a> {
    PartitionOffset {
        subscription: &'a str,
        topic: &'a str,
        partition: &'a str,
    },
    PartitionAssignment {
        subscription: &'a str,
        topic: &'a str,
        partition: &'a str,
    },
    /// Everything stored for one topic of a subscription.
    TopicPrefix {
        subscription: &'a str,
        topic: &'a str,
    },
    Session {
        subscription: &'a str,
        stream_id: &'a str,
    },
}

const OFFSET_SUFFIX: &str = "/offset";

impl StoreKey<'_> {
    pub fn resolve(&self, prefix: &str) -> String {
        match self {
            StoreKey::PartitionOffset {
                subscription,
                topic,
                partition,
            } => {
                format!("{prefix}subscriptions/{subscription}/topics/{topic}/{partition}{OFFSET_SUFFIX}")
            }
            StoreKey::PartitionAssignment {
                subscription,
                topic,
                partition,
            } => format!("{prefix}subscriptions/{subscription}/topics/{topic}/{partition}"),
            StoreKey::TopicPrefix {
                subscription,
                topic,
            } => format!("{prefix}subscriptions/{subscription}/topics/{topic}/"),
            StoreKey::Session {
                subscription,
                stream_id,
            } => format!("{prefix}subscriptions/{subscription}/sessions/{stream_id}"),
        }
    }
}

/// Extract the partition from an offset key relative to its topic prefix,
/// i.e. `{partition}/offset`. Returns `None` for any other key under the topic.
pub fn partition_from_offset_key(relative: &str) -> Option<&str> {
    let partition = relative.strip_suffix(OFFSET_SUFFIX)?;
    (!partition.is_empty() && !partition.contains('/')).then_some(partition)
}
