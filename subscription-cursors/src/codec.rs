use std::collections::HashMap;
use std::sync::Arc;

use coordination_store::util::validate_key_segment;

use crate::directory::{EventType, EventTypeDirectory, Subscription};
use crate::error::{Error, ResolutionError, Result};
use crate::types::{ExternalCursor, InternalCursor};

/// Width that offsets are left-zero-padded to when handed out to clients.
pub const DEFAULT_OFFSET_WIDTH: usize = 18;

/// Converts between client cursors (event type addressed) and internal
/// cursors (topic addressed).
#[derive(Clone)]
pub struct CursorCodec {
    event_types: Arc<dyn EventTypeDirectory>,
    offset_width: usize,
}

impl CursorCodec {
    pub fn new(event_types: Arc<dyn EventTypeDirectory>, offset_width: usize) -> Self {
        Self {
            event_types,
            offset_width,
        }
    }

    pub async fn resolve(&self, event_type: &str) -> Result<EventType> {
        let resolved = self.event_types.find_by_name(event_type).await?;
        validate_key_segment(&resolved.topic).map_err(|e| {
            Error::InvalidState(format!("event type {event_type} maps to bad topic: {e}"))
        })?;
        Ok(resolved)
    }

    pub async fn to_internal(&self, cursor: &ExternalCursor) -> Result<InternalCursor> {
        let event_type = self.resolve(&cursor.event_type).await?;
        internal_cursor(&event_type.topic, cursor)
    }

    /// Convert a whole batch, checking every event type belongs to the
    /// subscription. Each event type is looked up once.
    pub async fn to_internal_batch(
        &self,
        subscription: &Subscription,
        cursors: &[ExternalCursor],
    ) -> Result<Vec<InternalCursor>> {
        let mut topics: HashMap<&str, String> = HashMap::new();
        let mut internal = Vec::with_capacity(cursors.len());

        for cursor in cursors {
            let name = cursor.event_type.as_str();
            if !subscription.includes(name) {
                return Err(ResolutionError::NotInSubscription {
                    subscription: subscription.id.clone(),
                    event_type: name.to_string(),
                }
                .into());
            }
            let topic = match topics.get(name) {
                Some(topic) => topic.clone(),
                None => {
                    let topic = self.resolve(name).await?.topic;
                    topics.insert(name, topic.clone());
                    topic
                }
            };
            internal.push(internal_cursor(&topic, cursor)?);
        }

        Ok(internal)
    }

    pub fn to_external(
        &self,
        event_type: &EventType,
        cursor: InternalCursor,
        cursor_token: String,
    ) -> ExternalCursor {
        ExternalCursor {
            partition: cursor.partition,
            offset: self.format_offset(&cursor.offset),
            event_type: event_type.name.clone(),
            cursor_token,
        }
    }

    /// Canonical textual form: left-padded with `0` to the configured width.
    /// Longer offsets are returned untouched.
    pub fn format_offset(&self, offset: &str) -> String {
        format!("{offset:0>width$}", width = self.offset_width)
    }
}

fn internal_cursor(topic: &str, cursor: &ExternalCursor) -> Result<InternalCursor> {
    validate_key_segment(&cursor.partition)
        .map_err(|e| Error::InvalidCursor(format!("partition {:?}: {e}", cursor.partition)))?;
    if cursor.offset.is_empty() {
        return Err(Error::InvalidCursor(format!(
            "empty offset for partition {}",
            cursor.partition
        )));
    }
    Ok(InternalCursor {
        topic: topic.to_string(),
        partition: cursor.partition.clone(),
        offset: cursor.offset.clone(),
    })
}
