use std::cmp::Ordering;

use crate::comparator::OffsetComparator;
use crate::error::Result;
use crate::types::CommitOutcome;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldOutcome {
    /// The running high-water offset after the last cursor.
    pub high_water: String,
    /// One outcome per folded offset, in input order.
    pub outcomes: Vec<CommitOutcome>,
}

impl FoldOutcome {
    /// True when at least one offset moved the high-water mark.
    pub fn advanced(&self) -> bool {
        self.outcomes.contains(&CommitOutcome::Committed)
    }
}

/// Fold one partition's reported offsets, in request order, against a running
/// high-water offset starting at `initial`.
///
/// An offset strictly greater than the running value is `Committed` and
/// becomes the new running value; anything else is `Outdated`. Later offsets
/// are compared against the value as advanced by earlier ones, so a batch can
/// commit an increasing run and reject stragglers interleaved with it.
pub fn fold_offsets<'a, I>(
    initial: &str,
    offsets: I,
    comparator: &dyn OffsetComparator,
) -> Result<FoldOutcome>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut high_water = initial.to_string();
    let mut outcomes = Vec::new();

    for offset in offsets {
        if comparator.compare(offset, &high_water)? == Ordering::Greater {
            high_water = offset.to_string();
            outcomes.push(CommitOutcome::Committed);
        } else {
            outcomes.push(CommitOutcome::Outdated);
        }
    }

    Ok(FoldOutcome {
        high_water,
        outcomes,
    })
}
