//! Dead letter storage for events that exhausted their retry budget.
//!
//! When a processor keeps failing for an event past the retry budget, the bus
//! stops retrying in the hot path and records the pair here instead. This bounds
//! the latency impact of a struggling processor while keeping the failure
//! recoverable: operators inspect entries and trigger reprocessing through the
//! DLQ manager.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Errors from dead letter store backends.
#[derive(Error, Debug)]
pub enum DeadLetterError {
    /// The backing store failed.
    #[error("Dead letter backend error: {0}")]
    Backend(String),

    /// No entry exists with the given id.
    #[error("Dead letter entry not found: {0}")]
    EntryNotFound(Uuid),
}

/// One dead-lettered (event, processor) pair.
///
/// At most one entry exists per pair; repeated failures update the existing
/// entry rather than creating new ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterEntry {
    /// Unique id of this entry, the key the administrative surface uses.
    pub id: Uuid,
    /// The event that failed.
    pub event_id: Uuid,
    /// The processor that failed it.
    pub processor_name: String,
    /// Human-readable last error.
    pub failure_reason: String,
    /// Cumulative failure count across publishes and reprocess attempts.
    pub failure_count: u32,
    /// When this pair first failed into the queue.
    pub first_failed_at: DateTime<Utc>,
    /// When this pair most recently failed.
    pub last_failed_at: DateTime<Utc>,
}

/// Storage for dead-lettered pairs.
///
/// # Dyn Compatibility
///
/// Methods return explicit `Pin<Box<dyn Future>>` so the store can be held as
/// `Arc<dyn DeadLetterStore>` by the bus and the DLQ manager.
pub trait DeadLetterStore: Send + Sync {
    /// Record `failures` additional failures for a pair, creating the entry if
    /// this is the first time the pair is dead-lettered.
    ///
    /// Updates `failure_reason` and `last_failed_at`; `first_failed_at` is set
    /// once. Returns the entry id.
    ///
    /// # Errors
    ///
    /// Returns [`DeadLetterError::Backend`] if the store fails.
    fn record_failure(
        &self,
        event_id: Uuid,
        processor_name: &str,
        failure_reason: &str,
        failures: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Uuid, DeadLetterError>> + Send + '_>>;

    /// Fetch an entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`DeadLetterError::Backend`] if the store fails.
    fn get(
        &self,
        entry_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<Option<DeadLetterEntry>, DeadLetterError>> + Send + '_>>;

    /// List all entries, oldest first failure first.
    ///
    /// # Errors
    ///
    /// Returns [`DeadLetterError::Backend`] if the store fails.
    fn list(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeadLetterEntry>, DeadLetterError>> + Send + '_>>;

    /// Remove an entry after successful reprocessing.
    ///
    /// Resolving an entry that is already gone is a no-op, so concurrent
    /// reprocess attempts can both call this safely.
    ///
    /// # Errors
    ///
    /// Returns [`DeadLetterError::Backend`] if the store fails.
    fn resolve(
        &self,
        entry_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeadLetterError>> + Send + '_>>;

    /// Number of entries currently in the queue. Useful for health checks.
    ///
    /// # Errors
    ///
    /// Returns [`DeadLetterError::Backend`] if the store fails.
    fn count(&self) -> Pin<Box<dyn Future<Output = Result<usize, DeadLetterError>> + Send + '_>>;
}
