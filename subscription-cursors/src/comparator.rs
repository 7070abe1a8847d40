use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Ordering over two offsets of the same topic.
///
/// Storage engines encode offsets differently, so the comparison is chosen per
/// topic (see [`OffsetOrdering`]).
pub trait OffsetComparator: Send + Sync {
    fn compare(&self, a: &str, b: &str) -> Result<Ordering>;

    /// Check that `offset` is in this comparator's encoding.
    fn validate(&self, offset: &str) -> Result<()> {
        self.compare(offset, offset).map(|_| ())
    }
}

/// Plain string comparison. Correct for fixed-width, left-zero-padded decimal
/// offsets, where it agrees with numeric order.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalComparator;

impl OffsetComparator for LexicalComparator {
    fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        Ok(a.cmp(b))
    }
}

/// Unsigned integer comparison for offsets that are not padded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumericComparator;

fn parse_u64(raw: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| Error::InvalidCursor(format!("offset {raw:?} is not an unsigned integer")))
}

impl OffsetComparator for NumericComparator {
    fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        Ok(parse_u64(a)?.cmp(&parse_u64(b)?))
    }
}

/// Multi-field positions such as `0001-0007-000000000000000123`, compared
/// field by field as integers. Both offsets must have the same number of
/// fields.
#[derive(Debug, Clone, Copy)]
pub struct SegmentedComparator {
    separator: char,
}

impl SegmentedComparator {
    pub fn new(separator: char) -> Self {
        Self { separator }
    }

    fn fields(&self, raw: &str) -> Result<Vec<u64>> {
        raw.split(self.separator).map(parse_u64).collect()
    }
}

impl Default for SegmentedComparator {
    fn default() -> Self {
        Self::new('-')
    }
}

impl OffsetComparator for SegmentedComparator {
    fn compare(&self, a: &str, b: &str) -> Result<Ordering> {
        let left = self.fields(a)?;
        let right = self.fields(b)?;
        if left.len() != right.len() {
            return Err(Error::InvalidCursor(format!(
                "offsets {a:?} and {b:?} have a different number of fields"
            )));
        }
        Ok(left.cmp(&right))
    }
}

/// Per-topic selection of an [`OffsetComparator`].
pub trait OffsetOrdering: Send + Sync {
    fn comparator(&self, topic: &str) -> Arc<dyn OffsetComparator>;

    fn compare(&self, topic: &str, a: &str, b: &str) -> Result<Ordering> {
        self.comparator(topic).compare(a, b)
    }
}

/// Topic-to-comparator map with a fallback for unregistered topics.
#[derive(Clone)]
pub struct ComparatorRegistry {
    default: Arc<dyn OffsetComparator>,
    topics: HashMap<String, Arc<dyn OffsetComparator>>,
}

impl ComparatorRegistry {
    pub fn new(default: Arc<dyn OffsetComparator>) -> Self {
        Self {
            default,
            topics: HashMap::new(),
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>, cmp: Arc<dyn OffsetComparator>) -> Self {
        self.topics.insert(topic.into(), cmp);
        self
    }
}

impl Default for ComparatorRegistry {
    fn default() -> Self {
        Self::new(Arc::new(LexicalComparator))
    }
}

impl OffsetOrdering for ComparatorRegistry {
    fn comparator(&self, topic: &str) -> Arc<dyn OffsetComparator> {
        self.topics
            .get(topic)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.default))
    }
}
