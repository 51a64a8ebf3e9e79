//! Append-only event log.
//!
//! The log is the durable record of every published event, in append order. It
//! exists for two consumers: replay (rebuild or repair projections by
//! re-dispatching history) and dead-letter reprocessing (re-read the original
//! immutable envelope by id).
//!
//! The log is deliberately minimal: append, fetch by id, and an ordered read
//! from a timestamp. Projection state and subscription routing are not its job.

use crate::event::Envelope;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;
use uuid::Uuid;

/// Errors from event log backends.
#[derive(Error, Debug)]
pub enum EventLogError {
    /// The backing store failed.
    #[error("Event log backend error: {0}")]
    Backend(String),
}

/// Append-only storage for event envelopes.
///
/// # Dyn Compatibility
///
/// Methods return explicit `Pin<Box<dyn Future>>` so the log can be held as
/// `Arc<dyn EventLog>` by the bus and the DLQ manager.
pub trait EventLog: Send + Sync {
    /// Append an envelope to the log.
    ///
    /// Appending is idempotent on the event id: re-publishing an envelope the
    /// log already holds is a no-op, since the record is immutable.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Backend`] if the store fails.
    fn append(
        &self,
        envelope: Envelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventLogError>> + Send + '_>>;

    /// Fetch an envelope by id.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Backend`] if the store fails.
    fn get(
        &self,
        event_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Envelope>, EventLogError>> + Send + '_>>;

    /// Read envelopes occurring at or after `from`, in original append order.
    ///
    /// `None` reads the whole log.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Backend`] if the store fails.
    fn read_from(
        &self,
        from: Option<DateTime<Utc>>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Envelope>, EventLogError>> + Send + '_>>;
}
