use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use coordination_store::util::validate_identifier;
use coordination_store::{CoordinationStore, EtcdStore};
use futures::future::{join_all, try_join_all};

use crate::codec::{CursorCodec, DEFAULT_OFFSET_WIDTH};
use crate::comparator::{OffsetComparator, OffsetOrdering};
use crate::config::Config;
use crate::directory::{EventTypeDirectory, SubscriptionDirectory, TokenService};
use crate::error::{Error, Result};
use crate::fold::{fold_offsets, FoldOutcome};
use crate::metric_consts::{
    CURSOR_COMMITS, CURSOR_COMMIT_CAS_CONFLICTS, CURSOR_COMMIT_DURATION, CURSOR_COMMIT_REQUESTS,
    CURSOR_READS,
};
use crate::offsets::{CasOutcome, PartitionOffsetStore, VersionedOffset};
use crate::ownership::{ObservedAssignment, OwnershipRegistry};
use crate::types::{CommitOutcome, CommitResult, ExternalCursor, InternalCursor, TopicPartition};

#[derive(Debug, Clone)]
pub struct CommitConfig {
    /// Compare-and-set attempts per partition before giving up with
    /// [`Error::Conflict`]. Each retry re-reads immediately, without backoff.
    pub max_cas_attempts: u32,
    /// Width offsets are zero-padded to when read back.
    pub offset_width: usize,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            max_cas_attempts: 3,
            offset_width: DEFAULT_OFFSET_WIDTH,
        }
    }
}

/// The external services the coordinator depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub event_types: Arc<dyn EventTypeDirectory>,
    pub subscriptions: Arc<dyn SubscriptionDirectory>,
    pub tokens: Arc<dyn TokenService>,
    pub ordering: Arc<dyn OffsetOrdering>,
}

/// Positions (into the request batch) of the cursors for one partition, in
/// request order.
struct PartitionBatch {
    tp: TopicPartition,
    indexes: Vec<usize>,
}

impl PartitionBatch {
    fn offsets<'c>(&'c self, cursors: &'c [InternalCursor]) -> impl Iterator<Item = &'c str> + 'c {
        self.indexes.iter().map(move |&i| cursors[i].offset.as_str())
    }
}

fn group_by_partition(cursors: &[InternalCursor]) -> Vec<PartitionBatch> {
    let mut positions: HashMap<TopicPartition, usize> = HashMap::new();
    let mut batches: Vec<PartitionBatch> = Vec::new();

    for (i, cursor) in cursors.iter().enumerate() {
        let tp = cursor.topic_partition();
        match positions.get(&tp) {
            Some(&pos) => batches[pos].indexes.push(i),
            None => {
                positions.insert(tp.clone(), batches.len());
                batches.push(PartitionBatch {
                    tp,
                    indexes: vec![i],
                });
            }
        }
    }

    batches
}

/// A partition after the read-and-fold phase, ready to be written.
struct PartitionPlan<'a> {
    batch: &'a PartitionBatch,
    comparator: Arc<dyn OffsetComparator>,
    current: VersionedOffset,
    fold: FoldOutcome,
    observed: ObservedAssignment,
}

enum PartitionFailure {
    /// Retry budget exhausted.
    Conflict,
    Failed(Error),
}

/// Commits and reads subscription cursors.
///
/// A commit goes through three phases:
/// 1. validation: resolve every event type, then check the stream owns every
///    referenced partition. Any failure aborts before anything is written.
/// 2. read and fold: per partition, fold the reported offsets against the
///    stored offset.
/// 3. write: compare-and-set each advanced partition, concurrently, guarded by
///    both the offset version and the assignment revision seen in phase 1.
pub struct CommitCoordinator {
    codec: CursorCodec,
    subscriptions: Arc<dyn SubscriptionDirectory>,
    tokens: Arc<dyn TokenService>,
    ordering: Arc<dyn OffsetOrdering>,
    ownership: OwnershipRegistry,
    offsets: PartitionOffsetStore,
    config: CommitConfig,
}

impl CommitCoordinator {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        collaborators: Collaborators,
        config: CommitConfig,
    ) -> Self {
        Self {
            codec: CursorCodec::new(collaborators.event_types, config.offset_width),
            subscriptions: collaborators.subscriptions,
            tokens: collaborators.tokens,
            ordering: collaborators.ordering,
            ownership: OwnershipRegistry::new(Arc::clone(&store)),
            offsets: PartitionOffsetStore::new(store),
            config,
        }
    }

    /// Build a coordinator backed by the etcd cluster named in `config`.
    pub async fn connect(config: &Config, collaborators: Collaborators) -> Result<Self> {
        let store = EtcdStore::connect(config.store_config()).await?;
        Ok(Self::new(
            Arc::new(store),
            collaborators,
            config.commit_config(),
        ))
    }

    /// Commit a batch of cursors reported by `stream_id`.
    ///
    /// Returns one result per input cursor, in input order. Fails without
    /// writing anything if an event type cannot be resolved or the stream
    /// does not own every referenced partition.
    pub async fn commit_cursors(
        &self,
        stream_id: &str,
        subscription_id: &str,
        cursors: &[ExternalCursor],
    ) -> Result<Vec<CommitResult>> {
        let start = Instant::now();
        let result = self.commit(stream_id, subscription_id, cursors).await;

        let status = match &result {
            Ok(_) => "ok",
            Err(Error::Ownership { .. }) => "ownership",
            Err(Error::Resolution(_)) => "resolution",
            Err(Error::Conflict { .. }) => "conflict",
            Err(Error::StoreUnavailable { .. }) => "store_unavailable",
            Err(Error::WriteFailed { .. }) => "write_failed",
            Err(_) => "invalid",
        };
        metrics::counter!(CURSOR_COMMIT_REQUESTS, "status" => status).increment(1);
        metrics::histogram!(CURSOR_COMMIT_DURATION).record(start.elapsed().as_secs_f64());

        if let Ok(results) = &result {
            for r in results {
                let outcome = match r.outcome {
                    CommitOutcome::Committed => "committed",
                    CommitOutcome::Outdated => "outdated",
                };
                metrics::counter!(CURSOR_COMMITS, "outcome" => outcome).increment(1);
            }
        }

        result
    }

    async fn commit(
        &self,
        stream_id: &str,
        subscription_id: &str,
        cursors: &[ExternalCursor],
    ) -> Result<Vec<CommitResult>> {
        validate_identifier(subscription_id)
            .map_err(|e| Error::InvalidRequest(format!("subscription id: {e}")))?;
        validate_identifier(stream_id)
            .map_err(|e| Error::InvalidRequest(format!("stream id: {e}")))?;

        let subscription = self.subscriptions.get_subscription(subscription_id).await?;
        if cursors.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            subscription = %subscription_id,
            stream_id = %stream_id,
            cursors = cursors.len(),
            "committing cursors"
        );

        let internal = self.codec.to_internal_batch(&subscription, cursors).await?;
        let batches = group_by_partition(&internal);

        // ── Validation: nothing below this block runs unless the stream owns
        // every partition in the batch.
        if !self
            .ownership
            .session_exists(subscription_id, stream_id)
            .await?
        {
            tracing::info!(
                subscription = %subscription_id,
                stream_id = %stream_id,
                "commit from a stream without a live session"
            );
            return Err(Error::Ownership {
                stream_id: stream_id.to_string(),
                partitions: batches.iter().map(|b| b.tp.clone()).collect(),
                committed: Vec::new(),
            });
        }

        let observed = try_join_all(
            batches
                .iter()
                .map(|b| self.ownership.lookup(subscription_id, &b.tp)),
        )
        .await?;

        let unowned: Vec<TopicPartition> = batches
            .iter()
            .zip(&observed)
            .filter(|(_, o)| !o.is_owned_by(stream_id))
            .map(|(b, _)| b.tp.clone())
            .collect();
        if !unowned.is_empty() {
            tracing::warn!(
                subscription = %subscription_id,
                stream_id = %stream_id,
                partitions = ?unowned,
                "commit rejected, stream does not own partitions"
            );
            return Err(Error::Ownership {
                stream_id: stream_id.to_string(),
                partitions: unowned,
                committed: Vec::new(),
            });
        }

        // ── Read and fold.
        let plans = try_join_all(
            batches
                .iter()
                .zip(observed)
                .map(|(batch, observed)| self.plan(subscription_id, &internal, batch, observed)),
        )
        .await?;

        let mut outcomes = vec![CommitOutcome::Outdated; cursors.len()];
        let mut writes = Vec::new();
        for plan in plans {
            if plan.fold.advanced() {
                writes.push(plan);
            } else {
                record(&mut outcomes, plan.batch, &plan.fold.outcomes);
            }
        }

        // ── Write.
        let internal = internal.as_slice();
        let written = join_all(writes.into_iter().map(|plan| async move {
            let batch = plan.batch;
            let result = self
                .write_with_retry(stream_id, subscription_id, internal, plan)
                .await;
            (batch, result)
        }))
        .await;

        let mut committed = Vec::new();
        let mut failures = Vec::new();
        for (batch, result) in written {
            match result {
                Ok(partition_outcomes) => {
                    if partition_outcomes.contains(&CommitOutcome::Committed) {
                        committed.push(batch.tp.clone());
                    }
                    record(&mut outcomes, batch, &partition_outcomes);
                }
                Err(failure) => failures.push((batch.tp.clone(), failure)),
            }
        }

        if !failures.is_empty() {
            return Err(write_failure(subscription_id, stream_id, committed, failures));
        }

        Ok(cursors
            .iter()
            .zip(outcomes)
            .map(|(cursor, outcome)| CommitResult {
                cursor: cursor.clone(),
                outcome,
            })
            .collect())
    }

    async fn read_offset(&self, subscription_id: &str, tp: &TopicPartition) -> Result<VersionedOffset> {
        self.offsets
            .read(subscription_id, tp)
            .await?
            .ok_or_else(|| {
                Error::InvalidState(format!(
                    "no committed offset for {tp} in subscription {subscription_id}"
                ))
            })
    }

    async fn plan<'a>(
        &self,
        subscription_id: &str,
        cursors: &[InternalCursor],
        batch: &'a PartitionBatch,
        observed: ObservedAssignment,
    ) -> Result<PartitionPlan<'a>> {
        let comparator = self.ordering.comparator(&batch.tp.topic);
        let current = self.read_offset(subscription_id, &batch.tp).await?;
        let fold = fold_partition(&batch.tp, &current, batch.offsets(cursors), comparator.as_ref())?;
        Ok(PartitionPlan {
            batch,
            comparator,
            current,
            fold,
            observed,
        })
    }

    /// Compare-and-set one partition's folded offset. On conflict, re-read the
    /// offset and assignment and re-fold only this partition's cursors.
    async fn write_with_retry(
        &self,
        stream_id: &str,
        subscription_id: &str,
        cursors: &[InternalCursor],
        plan: PartitionPlan<'_>,
    ) -> std::result::Result<Vec<CommitOutcome>, PartitionFailure> {
        let PartitionPlan {
            batch,
            comparator,
            mut current,
            mut fold,
            mut observed,
        } = plan;
        let tp = &batch.tp;

        for attempt in 1..=self.config.max_cas_attempts {
            let guard = self.ownership.guard(subscription_id, tp, &observed);
            let outcome = self
                .offsets
                .compare_and_set(
                    subscription_id,
                    tp,
                    current.version,
                    &fold.high_water,
                    &[guard],
                )
                .await
                .map_err(PartitionFailure::Failed)?;

            if outcome == CasOutcome::Applied {
                tracing::debug!(
                    subscription = %subscription_id,
                    partition = %tp,
                    offset = %fold.high_water,
                    attempt,
                    "committed offset"
                );
                return Ok(fold.outcomes);
            }

            metrics::counter!(CURSOR_COMMIT_CAS_CONFLICTS).increment(1);
            tracing::debug!(
                subscription = %subscription_id,
                partition = %tp,
                attempt,
                "offset write conflicted, re-reading"
            );

            observed = self
                .ownership
                .lookup(subscription_id, tp)
                .await
                .map_err(PartitionFailure::Failed)?;
            if !observed.is_owned_by(stream_id) {
                return Err(PartitionFailure::Failed(Error::Ownership {
                    stream_id: stream_id.to_string(),
                    partitions: vec![tp.clone()],
                    committed: Vec::new(),
                }));
            }

            current = self
                .read_offset(subscription_id, tp)
                .await
                .map_err(PartitionFailure::Failed)?;
            fold = fold_partition(tp, &current, batch.offsets(cursors), comparator.as_ref())
                .map_err(PartitionFailure::Failed)?;
            if !fold.advanced() {
                // A concurrent writer got at least as far as this batch.
                return Ok(fold.outcomes);
            }
        }

        Err(PartitionFailure::Conflict)
    }

    /// Every committed cursor of the subscription, with a fresh token each.
    ///
    /// Ordered by event type, then partition key, so repeated reads with no
    /// commit in between return the same cursors apart from tokens.
    pub async fn get_subscription_cursors(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<ExternalCursor>> {
        validate_identifier(subscription_id)
            .map_err(|e| Error::InvalidRequest(format!("subscription id: {e}")))?;

        let subscription = self.subscriptions.get_subscription(subscription_id).await?;

        let mut cursors = Vec::new();
        for name in &subscription.event_types {
            let event_type = self.codec.resolve(name).await?;
            let offsets = self
                .offsets
                .list_for_topic(subscription_id, &event_type.topic)
                .await?;
            for (partition, offset) in offsets {
                let internal = InternalCursor {
                    topic: event_type.topic.clone(),
                    partition,
                    offset,
                };
                cursors.push(self.codec.to_external(
                    &event_type,
                    internal,
                    self.tokens.generate_token(),
                ));
            }
        }

        metrics::counter!(CURSOR_READS).increment(1);
        tracing::debug!(
            subscription = %subscription_id,
            cursors = cursors.len(),
            "read subscription cursors"
        );
        Ok(cursors)
    }
}

/// Fold a partition's offsets against its stored offset. A stored offset the
/// topic's comparator cannot read is a store problem, not a bad cursor.
fn fold_partition<'a>(
    tp: &TopicPartition,
    current: &VersionedOffset,
    offsets: impl IntoIterator<Item = &'a str>,
    comparator: &dyn OffsetComparator,
) -> Result<FoldOutcome> {
    comparator.validate(&current.offset).map_err(|e| {
        Error::InvalidState(format!(
            "stored offset {:?} for {tp} is unreadable: {e}",
            current.offset
        ))
    })?;
    fold_offsets(&current.offset, offsets, comparator)
}

fn record(outcomes: &mut [CommitOutcome], batch: &PartitionBatch, partition: &[CommitOutcome]) {
    for (&i, &outcome) in batch.indexes.iter().zip(partition) {
        outcomes[i] = outcome;
    }
}

/// Turn per-partition write failures into one error that still tells the
/// caller which partitions were durably committed.
fn write_failure(
    subscription_id: &str,
    stream_id: &str,
    committed: Vec<TopicPartition>,
    failures: Vec<(TopicPartition, PartitionFailure)>,
) -> Error {
    let mut conflicted = Vec::new();
    let mut lost = Vec::new();
    let mut first_error = None;

    for (tp, failure) in failures {
        match failure {
            PartitionFailure::Conflict => conflicted.push(tp),
            PartitionFailure::Failed(Error::Ownership { .. }) => lost.push(tp),
            PartitionFailure::Failed(e) => {
                tracing::error!(partition = %tp, error = %e, "offset write failed");
                first_error.get_or_insert(e);
            }
        }
    }

    tracing::warn!(
        subscription = %subscription_id,
        stream_id = %stream_id,
        committed = ?committed,
        conflicted = ?conflicted,
        ownership_lost = ?lost,
        "commit only partially applied"
    );

    match first_error {
        Some(Error::StoreUnavailable { source, .. }) => Error::StoreUnavailable { source, committed },
        Some(e) => Error::WriteFailed {
            source: Box::new(e),
            committed,
        },
        None if !lost.is_empty() => Error::Ownership {
            stream_id: stream_id.to_string(),
            partitions: lost,
            committed,
        },
        None => Error::Conflict {
            conflicted,
            committed,
        },
    }
}
