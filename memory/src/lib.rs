//! # Pledgeflow Memory
//!
//! In-memory implementations of the Pledgeflow store traits: the event log, the
//! idempotency ledger, and the dead letter store.
//!
//! These are the stores for the single-process deployment and for tests. Each
//! store takes one lock per operation, so the ledger's check-and-reserve is a
//! single critical section — the atomicity the concurrency contract requires.
//! Durable backends (the hosted platform's tables) plug in behind the same
//! traits from `pledgeflow-core`.

pub mod dead_letter;
pub mod event_log;
pub mod ledger;

pub use dead_letter::InMemoryDeadLetterStore;
pub use event_log::InMemoryEventLog;
pub use ledger::InMemoryLedger;
