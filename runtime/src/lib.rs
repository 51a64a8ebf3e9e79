//! # Pledgeflow Runtime
//!
//! Execution machinery for the Pledgeflow event pipeline: the in-process
//! [`bus::EventBus`] and the [`dlq::DlqManager`].
//!
//! The bus owns the publish path — schema validation, event log append,
//! pattern-matched dispatch, ledger-guarded handler invocation, retry with
//! exponential backoff, dead-lettering — plus replay from the durable log. The
//! DLQ manager is the administrative recovery surface over the dead letter
//! store.
//!
//! Stores and processors are injected through the trait seams in
//! `pledgeflow-core`; `pledgeflow-memory` provides the in-process store
//! implementations.

pub mod bus;
pub mod dlq;

pub use bus::{BusConfig, DispatchMode, EventBus, PublishError, SubscriptionId};
pub use dlq::{DlqManager, ReprocessError, ReprocessReport};
