use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A cursor as clients see it: a position in one partition of an event type,
/// plus the opaque token handed out with it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalCursor {
    pub partition: String,
    pub offset: String,
    pub event_type: String,
    pub cursor_token: String,
}

impl ExternalCursor {
    pub fn new(
        partition: impl Into<String>,
        offset: impl Into<String>,
        event_type: impl Into<String>,
        cursor_token: impl Into<String>,
    ) -> Self {
        Self {
            partition: partition.into(),
            offset: offset.into(),
            event_type: event_type.into(),
            cursor_token: cursor_token.into(),
        }
    }
}

/// A cursor addressed by topic instead of event type. Only lives for the
/// duration of one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalCursor {
    pub topic: String,
    pub partition: String,
    pub offset: String,
}

impl InternalCursor {
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition {
            topic: self.topic.clone(),
            partition: self.partition.clone(),
        }
    }
}

/// The unit of ownership and of offset storage.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: String,
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.partition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitOutcome {
    /// The offset strictly advanced the partition's stored position.
    Committed,
    /// Stale, duplicate or regressive report; nothing was advanced.
    Outdated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResult {
    pub cursor: ExternalCursor,
    pub outcome: CommitOutcome,
}

impl CommitResult {
    pub fn is_committed(&self) -> bool {
        self.outcome == CommitOutcome::Committed
    }
}

/// Status half of a session assignment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    Assigned,
    Reassigning,
    Unassigned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Assigned => "ASSIGNED",
            SessionStatus::Reassigning => "REASSIGNING",
            SessionStatus::Unassigned => "UNASSIGNED",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ASSIGNED" => Ok(SessionStatus::Assigned),
            "REASSIGNING" => Ok(SessionStatus::Reassigning),
            "UNASSIGNED" => Ok(SessionStatus::Unassigned),
            other => Err(format!("unknown session status {other:?}")),
        }
    }
}

const ASSIGNMENT_SEPARATOR: &str = ": :";

/// Who streams a partition, stored at
/// `{prefix}subscriptions/{sid}/topics/{topic}/{partition}` as
/// `"{stream_id}: :{status}"`.
///
/// The record is written by the rebalancer; this crate only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAssignment {
    pub stream_id: String,
    pub status: SessionStatus,
}

impl SessionAssignment {
    pub fn assigned(stream_id: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            status: SessionStatus::Assigned,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{ASSIGNMENT_SEPARATOR}{}",
            self.stream_id,
            self.status.as_str()
        )
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let (stream_id, status) = raw
            .split_once(ASSIGNMENT_SEPARATOR)
            .ok_or_else(|| format!("assignment record {raw:?} has no separator"))?;
        Ok(Self {
            stream_id: stream_id.to_string(),
            status: status.parse()?,
        })
    }

    pub fn is_owned_by(&self, stream_id: &str) -> bool {
        self.stream_id == stream_id && self.status == SessionStatus::Assigned
    }
}
