//! The `Processor` trait: turn an event into a side effect.
//!
//! A processor implements "given an event of type T, perform side effect S".
//! Processors never assume exactly-once delivery: the bus guards every
//! invocation with the idempotency ledger, and a processor may still be handed
//! the same envelope more than once across retries and replays. Whatever I/O a
//! processor performs (projection write, notification send, audit insert) is
//! opaque to the pipeline.
//!
//! The bus does not time processors out. A processor is responsible for
//! bounding its own external calls; an unbounded hang stalls only that
//! (event, processor) pair.

use crate::event::{Envelope, EventError};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A failure inside a processor.
///
/// Caught by the bus, recorded in the ledger, and never re-thrown to the
/// publisher. The message is what operators see in the dead letter queue, so
/// it should say what failed, not just that something did.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ProcessorError {
    message: String,
}

impl ProcessorError {
    /// Create a processor error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<EventError> for ProcessorError {
    fn from(err: EventError) -> Self {
        Self::new(err.to_string())
    }
}

/// A consumer of events.
///
/// # Naming
///
/// `name()` is the processor's identity in the ledger and the dead letter
/// queue. It must be stable across restarts and unique within the bus;
/// renaming a processor orphans its ledger records and re-applies every
/// historical event on the next replay.
///
/// # Dyn Compatibility
///
/// `handle` returns an explicit `Pin<Box<dyn Future>>` so processors can be
/// held as `Arc<dyn Processor>` in the subscription table.
pub trait Processor: Send + Sync {
    /// Stable, unique processor name.
    fn name(&self) -> &str;

    /// Apply this processor's side effect for the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError`] on failure; the bus records it and retries
    /// or dead-letters per its policy.
    fn handle<'a>(
        &'a self,
        envelope: &'a Envelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProcessorError>> + Send + 'a>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_is_preserved() {
        let err = ProcessorError::new("projection write refused");
        assert_eq!(err.message(), "projection write refused");
        assert_eq!(format!("{err}"), "projection write refused");
    }

    #[test]
    fn event_error_converts() {
        let err: ProcessorError = EventError::DecodeError("bad shape".to_string()).into();
        assert!(err.message().contains("bad shape"));
    }
}
