use thiserror::Error;

use crate::types::TopicPartition;

/// Failure to resolve a name through one of the directories.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("subscription {0} not found")]
    SubscriptionNotFound(String),

    #[error("event type {0} not found")]
    EventTypeNotFound(String),

    #[error("event type {event_type} is not part of subscription {subscription}")]
    NotInSubscription {
        subscription: String,
        event_type: String,
    },

    #[error("directory lookup failed: {0}")]
    Directory(String),
}

#[derive(Error, Debug)]
pub enum Error {
    /// The stream does not own every partition it tried to commit. When raised
    /// during validation `committed` is always empty.
    #[error("stream {stream_id} does not own partitions {partitions:?}")]
    Ownership {
        stream_id: String,
        partitions: Vec<TopicPartition>,
        committed: Vec<TopicPartition>,
    },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Lost the compare-and-set race more times than the retry budget allows.
    #[error("offset writes kept conflicting for {conflicted:?}")]
    Conflict {
        conflicted: Vec<TopicPartition>,
        committed: Vec<TopicPartition>,
    },

    #[error("coordination store unavailable: {source}")]
    StoreUnavailable {
        #[source]
        source: coordination_store::Error,
        committed: Vec<TopicPartition>,
    },

    /// Any other failure while writing offsets, after some partitions may
    /// already have been written.
    #[error("offset write failed: {source}")]
    WriteFailed {
        #[source]
        source: Box<Error>,
        committed: Vec<TopicPartition>,
    },

    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl From<coordination_store::Error> for Error {
    fn from(e: coordination_store::Error) -> Self {
        match e {
            coordination_store::Error::InvalidState(msg) => Self::InvalidState(msg),
            source => Self::StoreUnavailable {
                source,
                committed: Vec::new(),
            },
        }
    }
}

impl Error {
    /// Partitions whose offsets were durably written before the request failed.
    /// Retrying the whole batch is safe: those cursors come back `Outdated`.
    pub fn committed_partitions(&self) -> &[TopicPartition] {
        match self {
            Error::Ownership { committed, .. }
            | Error::Conflict { committed, .. }
            | Error::StoreUnavailable { committed, .. }
            | Error::WriteFailed { committed, .. } => committed,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
