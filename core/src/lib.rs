//! # Pledgeflow Core
//!
//! Core traits and types for the Pledgeflow event pipeline: the event-driven
//! write path of a fundraising platform.
//!
//! The pipeline decouples command operations (create a campaign, follow a user,
//! record a donation) from their downstream side effects (projection updates,
//! notifications, audit logging). This crate holds the shared vocabulary:
//!
//! - [`event::Envelope`] and the [`event::DomainEvent`] trait — immutable event
//!   records with a routing type tag
//! - [`registry::EventRegistry`] — type tag to payload shape mapping, the schema
//!   authority for publishing
//! - [`ledger::ProcessingLedger`] — per (event, processor) idempotency records
//!   with an atomic check-and-reserve
//! - [`event_log::EventLog`] — the append-only durable log, read by replay and
//!   dead-letter reprocessing
//! - [`dead_letter::DeadLetterStore`] — failed pairs past the retry budget
//! - [`processor::Processor`] — the consumer seam: event in, side effect out
//! - [`retry::RetryPolicy`] — the bus's backoff and budget configuration
//!
//! The bus and DLQ manager that drive these live in `pledgeflow-runtime`;
//! in-memory store implementations live in `pledgeflow-memory`; the fundraising
//! event types, factories, and reference processors live in `pledgeflow-domain`.
//!
//! # Delivery Doctrine
//!
//! - Events are appended to the log before any handler runs.
//! - Delivery is at-least-once; processors are made effectively at-most-once by
//!   the ledger's admission check, never by their own construction.
//! - A handler failure never propagates to the publisher; each (event,
//!   processor) outcome is recorded independently.

pub mod clock;
pub mod dead_letter;
pub mod event;
pub mod event_log;
pub mod ledger;
pub mod processor;
pub mod registry;
pub mod retry;

pub use clock::{Clock, FixedClock, SystemClock};
pub use dead_letter::{DeadLetterEntry, DeadLetterError, DeadLetterStore};
pub use event::{DomainEvent, Envelope, EventError};
pub use event_log::{EventLog, EventLogError};
pub use ledger::{Admission, LedgerError, ProcessingLedger, ProcessingStatus, StatusRecord};
pub use processor::{Processor, ProcessorError};
pub use registry::{EventRegistry, SchemaValidationError};
pub use retry::RetryPolicy;
