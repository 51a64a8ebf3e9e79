//! # Pledgeflow Domain
//!
//! The fundraising platform's event catalog and its consumers:
//!
//! - [`events`] — payload structs and type tags for campaign, donation, and
//!   social events, plus [`events::register_events`] to load the bus registry
//! - [`factories`] — pure, fail-fast envelope constructors; the only way
//!   call sites should build events
//! - [`processors`] — the projection updater, audit logger, and notification
//!   dispatcher that react to published events

pub mod events;
pub mod factories;
pub mod processors;

pub use factories::ValidationError;
pub use processors::{
    AuditLogProcessor, AuditRecord, InMemorySender, Notification, NotificationProcessor,
    NotificationSender, ProjectionProcessor, ProjectionState,
};
