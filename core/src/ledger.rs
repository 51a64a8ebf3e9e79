//! Idempotency ledger: per (event, processor) processing status.
//!
//! The ledger guarantees a processor applies a given event's side effect at most
//! once. Every handler invocation goes through [`ProcessingLedger::begin_attempt`]
//! first; the check-and-reserve it performs must be a single atomic operation so
//! two concurrent attempts for the same (event, processor) pair can never both be
//! admitted.
//!
//! Processors are idempotent-by-ledger-check, never idempotent-by-construction.
//! Replay relies on this: rebuilding projections from the event log skips every
//! pair the ledger already shows as completed, so non-naturally-idempotent
//! effects (sending a notification, say) are not duplicated.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Errors from ledger backends.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The backing store failed.
    #[error("Ledger backend error: {0}")]
    Backend(String),
}

/// Processing status of one (event, processor) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStatus {
    /// An attempt holds the reservation and has not finished.
    Pending,
    /// The side effect was applied; the pair will never be admitted again.
    Completed,
    /// The last attempt failed; the pair may be re-admitted.
    Failed,
}

impl ProcessingStatus {
    /// Stable string form, matching what a durable backend would store.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One ledger record, keyed by (`event_id`, `processor_name`).
///
/// Created `Pending` on first admission, transitions to `Completed` or `Failed`;
/// a `Failed` record re-enters `Pending` when a retry or reprocess is admitted.
/// Records are never deleted except by administrative purge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    /// The event this record tracks.
    pub event_id: Uuid,
    /// The processor this record tracks.
    pub processor_name: String,
    /// Current status.
    pub status: ProcessingStatus,
    /// Total attempts admitted for this pair, across publishes and reprocesses.
    pub attempt_count: u32,
    /// Last failure message, present only after a failed attempt.
    pub error_message: Option<String>,
    /// Set once, on successful completion.
    pub completed_at: Option<DateTime<Utc>>,
}

/// Outcome of the atomic check-and-reserve step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The caller holds the reservation and must run the side effect, then call
    /// `mark_completed` or `mark_failed`.
    Fresh {
        /// Cumulative attempt number for this pair (1 for the first ever attempt).
        attempt: u32,
    },
    /// A completed record exists; the side effect must not run again.
    AlreadyCompleted,
    /// Another attempt currently holds the reservation.
    InFlight,
}

/// The idempotency ledger trait.
///
/// # Concurrency Contract
///
/// `begin_attempt` is check-and-reserve in one conditional write: for a given
/// (event, processor) pair, at most one concurrent caller observes
/// [`Admission::Fresh`]. Separate read-then-write steps are not an acceptable
/// implementation.
///
/// # Dyn Compatibility
///
/// Methods return explicit `Pin<Box<dyn Future>>` instead of `async fn` so the
/// ledger can be held as `Arc<dyn ProcessingLedger>` by the bus and the DLQ
/// manager.
pub trait ProcessingLedger: Send + Sync {
    /// Atomically check whether the pair should be processed and, if so, reserve it.
    ///
    /// - No record: creates one in `Pending` and returns `Fresh { attempt: 1 }`.
    /// - `Failed` record: re-enters `Pending`, increments the attempt count, and
    ///   returns `Fresh` with the new count.
    /// - `Completed` record: returns `AlreadyCompleted`.
    /// - `Pending` record: returns `InFlight`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Backend`] if the store fails.
    fn begin_attempt(
        &self,
        event_id: Uuid,
        processor_name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Admission, LedgerError>> + Send + '_>>;

    /// Transition the pair to `Completed`, stamping `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Backend`] if the store fails.
    fn mark_completed(
        &self,
        event_id: Uuid,
        processor_name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + '_>>;

    /// Transition the pair to `Failed`, recording the error message.
    ///
    /// The attempt count is not touched here; it was taken at admission.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Backend`] if the store fails.
    fn mark_failed(
        &self,
        event_id: Uuid,
        processor_name: &str,
        error_message: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + '_>>;

    /// Fetch the record for a pair, if any.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Backend`] if the store fails.
    fn get(
        &self,
        event_id: Uuid,
        processor_name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StatusRecord>, LedgerError>> + Send + '_>>;

    /// Administrative purge of a record. Normal operation never deletes.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Backend`] if the store fails.
    fn purge(
        &self,
        event_id: Uuid,
        processor_name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_string_forms() {
        assert_eq!(ProcessingStatus::Pending.as_str(), "pending");
        assert_eq!(ProcessingStatus::Completed.as_str(), "completed");
        assert_eq!(ProcessingStatus::Failed.as_str(), "failed");
    }
}
