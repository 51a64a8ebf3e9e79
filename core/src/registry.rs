//! Event registry: type tag to payload shape mapping.
//!
//! The registry is the schema authority for the pipeline. Every publishable event
//! type is registered once at startup with the Rust type that defines its payload
//! shape; [`EventRegistry::validate`] then rejects envelopes whose type tag is
//! unknown or whose payload does not deserialize into the registered type.
//!
//! This replaces runtime `switch (event.type)` shape checks with a typed mapping:
//! the payload schema for a tag *is* a Rust struct, and validation is "does the
//! payload deserialize into it".
//!
//! # Example
//!
//! ```
//! use pledgeflow_core::registry::EventRegistry;
//! use pledgeflow_core::event::{DomainEvent, Envelope};
//! # use serde::{Serialize, Deserialize};
//! # #[derive(Clone, Debug, Serialize, Deserialize)]
//! # struct UserFollowed { follower_id: String, followed_user_id: String }
//! # impl DomainEvent for UserFollowed {
//! #     fn event_type(&self) -> &'static str { "user.followed_user" }
//! # }
//!
//! let mut registry = EventRegistry::new();
//! registry.register::<UserFollowed>("user.followed_user");
//!
//! let event = UserFollowed {
//!     follower_id: "u1".to_string(),
//!     followed_user_id: "u2".to_string(),
//! };
//! let envelope = Envelope::from_event(&event, None).unwrap();
//!
//! assert!(registry.validate(&envelope).is_ok());
//! ```

use crate::event::Envelope;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised when an envelope fails schema validation.
///
/// Surfaced synchronously to the publisher; a failing envelope is never appended
/// to the event log and no handler runs for it.
#[derive(Error, Debug)]
pub enum SchemaValidationError {
    /// The envelope's type tag has no registered payload shape.
    #[error("No payload shape registered for event type '{0}'")]
    UnregisteredEventType(String),

    /// The payload does not match the registered shape for the type tag.
    #[error("Payload for event type '{event_type}' does not match registered shape: {reason}")]
    PayloadMismatch {
        /// The type tag that was being validated.
        event_type: String,
        /// Why deserialization into the registered type failed.
        reason: String,
    },
}

type ShapeCheck = Box<dyn Fn(&serde_json::Value) -> Result<(), String> + Send + Sync>;

/// Maps event type tags to payload shapes.
///
/// Built once at startup and handed to the bus. Registration is not expected
/// after the bus starts publishing, so the registry exposes no interior
/// mutability.
#[derive(Default)]
pub struct EventRegistry {
    shapes: HashMap<String, ShapeCheck>,
}

impl EventRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a payload shape for an event type tag.
    ///
    /// A payload is considered valid for `event_type` when it deserializes into
    /// `P`. Registering the same tag twice replaces the previous shape.
    pub fn register<P: DeserializeOwned + 'static>(&mut self, event_type: impl Into<String>) {
        self.shapes.insert(
            event_type.into(),
            Box::new(|payload| {
                serde_json::from_value::<P>(payload.clone())
                    .map(|_| ())
                    .map_err(|e| e.to_string())
            }),
        );
    }

    /// Validate an envelope against the registered shape for its type tag.
    ///
    /// # Errors
    ///
    /// - [`SchemaValidationError::UnregisteredEventType`] if the tag is unknown.
    /// - [`SchemaValidationError::PayloadMismatch`] if the payload does not
    ///   deserialize into the registered type.
    pub fn validate(&self, envelope: &Envelope) -> Result<(), SchemaValidationError> {
        let check = self.shapes.get(&envelope.event_type).ok_or_else(|| {
            SchemaValidationError::UnregisteredEventType(envelope.event_type.clone())
        })?;

        check(&envelope.payload).map_err(|reason| SchemaValidationError::PayloadMismatch {
            event_type: envelope.event_type.clone(),
            reason,
        })
    }

    /// Whether a type tag has a registered shape.
    #[must_use]
    pub fn contains(&self, event_type: &str) -> bool {
        self.shapes.contains_key(event_type)
    }

    /// Number of registered event types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

impl std::fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("registered_types", &self.shapes.len())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::event::DomainEvent;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Clone, Debug, Serialize, Deserialize)]
    struct DonationReceived {
        donation_id: String,
        amount_cents: i64,
    }

    impl DomainEvent for DonationReceived {
        fn event_type(&self) -> &'static str {
            "donation.received"
        }
    }

    fn envelope(event_type: &str, payload: serde_json::Value) -> Envelope {
        Envelope::new(Uuid::new_v4(), event_type.to_string(), payload, None, Utc::now())
    }

    #[test]
    fn validates_registered_shape() {
        let mut registry = EventRegistry::new();
        registry.register::<DonationReceived>("donation.received");

        let event = DonationReceived {
            donation_id: "d-1".to_string(),
            amount_cents: 2500,
        };
        let envelope = Envelope::from_event(&event, None).unwrap();

        assert!(registry.validate(&envelope).is_ok());
    }

    #[test]
    fn rejects_unregistered_type() {
        let registry = EventRegistry::new();
        let env = envelope("donation.received", serde_json::json!({}));

        let err = registry.validate(&env).unwrap_err();
        assert!(matches!(err, SchemaValidationError::UnregisteredEventType(_)));
    }

    #[test]
    fn rejects_mismatched_payload() {
        let mut registry = EventRegistry::new();
        registry.register::<DonationReceived>("donation.received");

        let env = envelope(
            "donation.received",
            serde_json::json!({ "donation_id": "d-1", "amount_cents": "not a number" }),
        );

        let err = registry.validate(&env).unwrap_err();
        assert!(matches!(err, SchemaValidationError::PayloadMismatch { .. }));
    }

    #[test]
    fn register_replaces_previous_shape() {
        #[derive(Deserialize)]
        struct Loose {}

        let mut registry = EventRegistry::new();
        registry.register::<DonationReceived>("donation.received");
        registry.register::<Loose>("donation.received");

        assert_eq!(registry.len(), 1);
        let env = envelope("donation.received", serde_json::json!({}));
        assert!(registry.validate(&env).is_ok());
    }
}
