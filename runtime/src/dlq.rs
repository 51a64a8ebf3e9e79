//! Dead letter queue manager: manual and bulk reprocessing.
//!
//! The administrative surface over the dead letter store. Operators inspect
//! entries, fix the underlying cause (a down notification provider, a bad
//! projection row), then trigger [`DlqManager::reprocess_entry`] for one entry
//! or [`DlqManager::reprocess_all`] for the whole queue.
//!
//! Reprocessing goes back through the idempotency ledger, so a pair that was
//! resolved elsewhere (a replay, a concurrent reprocess) is not re-applied; the
//! entry is simply cleaned up.

use crate::bus::EventBus;
use pledgeflow_core::dead_letter::DeadLetterError;
use pledgeflow_core::event_log::EventLogError;
use pledgeflow_core::ledger::{Admission, LedgerError};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors from reprocessing operations.
///
/// These cover the administrative call itself failing; a processor failing
/// during a retry is not an error here, it is an `Ok(false)` outcome.
#[derive(Error, Debug)]
pub enum ReprocessError {
    /// No dead letter entry exists with the given id.
    #[error("Dead letter entry not found: {0}")]
    EntryNotFound(Uuid),

    /// The entry references an event the log does not hold.
    #[error("Event referenced by dead letter entry is missing from the log: {0}")]
    EventMissing(Uuid),

    /// The entry references a processor no longer subscribed on the bus.
    #[error("Processor referenced by dead letter entry is not registered: {0}")]
    ProcessorMissing(String),

    /// The dead letter store failed.
    #[error("Dead letter store error: {0}")]
    Store(#[from] DeadLetterError),

    /// The ledger failed.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The event log failed.
    #[error("Event log error: {0}")]
    Log(#[from] EventLogError),
}

/// Aggregate outcome of a bulk reprocess, for the operational UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReprocessReport {
    /// Entries that were resolved.
    pub succeeded: usize,
    /// Entries that failed again and remain queued.
    pub failed: usize,
}

/// Manages recovery of dead-lettered (event, processor) pairs.
pub struct DlqManager {
    bus: Arc<EventBus>,
}

impl DlqManager {
    /// Create a manager over the given bus.
    #[must_use]
    pub const fn new(bus: Arc<EventBus>) -> Self {
        Self { bus }
    }

    /// Re-run the original processor for one dead-lettered event.
    ///
    /// On success the ledger pair is marked completed and the entry is removed;
    /// on failure the entry's `failure_count` and `last_failed_at` are bumped
    /// and it stays queued. Returns whether the retry succeeded.
    ///
    /// Two concurrent calls for the same entry resolve it at most once: the
    /// ledger's admission arbitrates, and the loser observes the pair in flight
    /// and returns `false` without touching any state.
    ///
    /// # Errors
    ///
    /// Returns [`ReprocessError`] if the entry, its event, or its processor
    /// cannot be found, or if a store fails.
    pub async fn reprocess_entry(&self, entry_id: Uuid) -> Result<bool, ReprocessError> {
        let entry = self
            .bus
            .dead_letters()
            .get(entry_id)
            .await?
            .ok_or(ReprocessError::EntryNotFound(entry_id))?;

        let envelope = self
            .bus
            .event_log()
            .get(entry.event_id)
            .await?
            .ok_or(ReprocessError::EventMissing(entry.event_id))?;

        let processor = self
            .bus
            .processor_by_name(&entry.processor_name)
            .await
            .ok_or_else(|| ReprocessError::ProcessorMissing(entry.processor_name.clone()))?;

        match self
            .bus
            .ledger()
            .begin_attempt(entry.event_id, &entry.processor_name)
            .await?
        {
            Admission::AlreadyCompleted => {
                // Resolved elsewhere; just clean the queue up.
                self.bus.dead_letters().resolve(entry_id).await?;
                Ok(true)
            }
            Admission::InFlight => Ok(false),
            Admission::Fresh { attempt } => {
                tracing::info!(
                    dlq_id = %entry_id,
                    event_id = %entry.event_id,
                    processor = %entry.processor_name,
                    attempt,
                    "Reprocessing dead-lettered event"
                );

                match processor.handle(&envelope).await {
                    Ok(()) => {
                        self.bus
                            .ledger()
                            .mark_completed(entry.event_id, &entry.processor_name)
                            .await?;
                        self.bus.dead_letters().resolve(entry_id).await?;
                        metrics::counter!("event_bus.dlq.resolved").increment(1);
                        tracing::info!(
                            dlq_id = %entry_id,
                            event_id = %entry.event_id,
                            processor = %entry.processor_name,
                            "Dead letter entry resolved"
                        );
                        Ok(true)
                    }
                    Err(err) => {
                        self.bus
                            .ledger()
                            .mark_failed(entry.event_id, &entry.processor_name, err.message())
                            .await?;
                        self.bus
                            .dead_letters()
                            .record_failure(
                                entry.event_id,
                                &entry.processor_name,
                                err.message(),
                                1,
                            )
                            .await?;
                        tracing::warn!(
                            dlq_id = %entry_id,
                            event_id = %entry.event_id,
                            processor = %entry.processor_name,
                            error = %err,
                            "Reprocessing failed, entry stays queued"
                        );
                        Ok(false)
                    }
                }
            }
        }
    }

    /// Attempt to reprocess every current entry, independently.
    ///
    /// One entry failing (or erroring) does not block the rest. Entries
    /// resolved concurrently while the sweep runs are not counted.
    ///
    /// # Errors
    ///
    /// Returns [`ReprocessError::Store`] only if the initial listing fails.
    pub async fn reprocess_all(&self) -> Result<ReprocessReport, ReprocessError> {
        let entries = self.bus.dead_letters().list().await?;
        tracing::info!(count = entries.len(), "Bulk reprocessing dead letter queue");

        let mut report = ReprocessReport::default();
        for entry in entries {
            match self.reprocess_entry(entry.id).await {
                Ok(true) => report.succeeded += 1,
                Ok(false) => report.failed += 1,
                Err(ReprocessError::EntryNotFound(_)) => {
                    // Raced with a concurrent resolution; nothing to count.
                }
                Err(e) => {
                    tracing::error!(
                        dlq_id = %entry.id,
                        error = %e,
                        "Reprocessing errored, entry stays queued"
                    );
                    report.failed += 1;
                }
            }
        }

        tracing::info!(
            succeeded = report.succeeded,
            failed = report.failed,
            "Bulk reprocessing finished"
        );
        Ok(report)
    }
}
