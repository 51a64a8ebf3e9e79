//! Event envelope and the `DomainEvent` trait.
//!
//! This module defines the core abstraction for events in the pipeline.
//! Events represent facts about things that have happened in the past and are immutable.
//!
//! # Design
//!
//! Payloads are carried as [`serde_json::Value`] rather than an opaque byte blob.
//! The event registry must be able to shape-check a payload against the schema
//! registered for its type tag, which requires a self-describing format. JSON also
//! matches what the hosted backend persists, so the envelope round-trips losslessly
//! through the event log.
//!
//! # Example
//!
//! ```
//! use pledgeflow_core::event::{DomainEvent, Envelope};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Clone, Debug, Serialize, Deserialize)]
//! struct CampaignCreated {
//!     campaign_id: String,
//!     title: String,
//! }
//!
//! impl DomainEvent for CampaignCreated {
//!     fn event_type(&self) -> &'static str {
//!         "campaign.created"
//!     }
//! }
//!
//! let event = CampaignCreated {
//!     campaign_id: "c-1".to_string(),
//!     title: "Clean water".to_string(),
//! };
//! let envelope = Envelope::from_event(&event, None).unwrap();
//! assert_eq!(envelope.event_type, "campaign.created");
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Error types for event encoding and decoding.
#[derive(Error, Debug)]
pub enum EventError {
    /// Failed to encode an event into a JSON payload.
    #[error("Failed to encode event: {0}")]
    EncodeError(String),

    /// Failed to decode a payload back into an event.
    #[error("Failed to decode event: {0}")]
    DecodeError(String),

    /// Unknown event type encountered during routing or decoding.
    #[error("Unknown event type: {0}")]
    UnknownEventType(String),
}

/// A domain event: an immutable fact about something that happened.
///
/// # Type Tag Convention
///
/// The `event_type()` method returns a stable dotted identifier used for routing
/// and registry lookup:
///
/// - `"campaign.created"`
/// - `"donation.received"`
/// - `"user.followed_user"`
///
/// The segment before the dot groups related events and is what wildcard
/// subscription patterns (`"user.*"`) match against.
///
/// # Thread Safety
///
/// Events must be `Send + Sync + 'static` so they can cross task boundaries in
/// the async runtime.
pub trait DomainEvent: Send + Sync + 'static {
    /// Returns the stable type tag for this event.
    fn event_type(&self) -> &'static str;

    /// Encode this event into a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::EncodeError`] if the event cannot be represented as
    /// JSON (e.g. a map with non-string keys).
    fn to_payload(&self) -> Result<serde_json::Value, EventError>
    where
        Self: Serialize,
    {
        serde_json::to_value(self).map_err(|e| EventError::EncodeError(e.to_string()))
    }

    /// Decode an event from a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DecodeError`] if the payload does not match this
    /// event's shape.
    fn from_payload(payload: &serde_json::Value) -> Result<Self, EventError>
    where
        Self: DeserializeOwned + Sized,
    {
        serde_json::from_value(payload.clone()).map_err(|e| EventError::DecodeError(e.to_string()))
    }
}

/// The persisted form of a domain event.
///
/// An envelope wraps a typed event with the infrastructure metadata the pipeline
/// needs: identity, routing tag, correlation, and creation time. It is the unit
/// that flows through the event log, the bus, and the ledger.
///
/// Once appended to the event log an envelope is never mutated; replay and
/// dead-letter reprocessing re-read the same immutable record by id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Globally unique event id, generated at creation.
    pub id: Uuid,

    /// The type tag used for routing and registry lookup.
    pub event_type: String,

    /// The JSON payload, schema-validated against the registered shape.
    pub payload: serde_json::Value,

    /// Optional identifier linking related events from one logical operation.
    pub correlation_id: Option<String>,

    /// When the event was created.
    pub occurred_at: DateTime<Utc>,
}

impl Envelope {
    /// Create an envelope from raw parts.
    ///
    /// Prefer [`Envelope::from_event`] at call sites; this constructor exists for
    /// stores and tests that rehydrate envelopes from persisted data.
    #[must_use]
    pub const fn new(
        id: Uuid,
        event_type: String,
        payload: serde_json::Value,
        correlation_id: Option<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            event_type,
            payload,
            correlation_id,
            occurred_at,
        }
    }

    /// Create an envelope from a typed event, assigning a fresh id and timestamp.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::EncodeError`] if the event cannot be encoded.
    ///
    /// # Examples
    ///
    /// ```
    /// use pledgeflow_core::event::{DomainEvent, Envelope};
    /// # use serde::{Serialize, Deserialize};
    /// # #[derive(Clone, Debug, Serialize, Deserialize)]
    /// # struct UserFollowed { follower_id: String, followed_user_id: String }
    /// # impl DomainEvent for UserFollowed {
    /// #     fn event_type(&self) -> &'static str { "user.followed_user" }
    /// # }
    ///
    /// let event = UserFollowed {
    ///     follower_id: "u1".to_string(),
    ///     followed_user_id: "u2".to_string(),
    /// };
    ///
    /// let envelope = Envelope::from_event(&event, Some("op-42".to_string())).unwrap();
    /// assert_eq!(envelope.event_type, "user.followed_user");
    /// assert_eq!(envelope.correlation_id.as_deref(), Some("op-42"));
    /// ```
    pub fn from_event<E: DomainEvent + Serialize>(
        event: &E,
        correlation_id: Option<String>,
    ) -> Result<Self, EventError> {
        Ok(Self {
            id: Uuid::new_v4(),
            event_type: event.event_type().to_string(),
            payload: event.to_payload()?,
            correlation_id,
            occurred_at: Utc::now(),
        })
    }

    /// Decode the payload back into a typed event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::DecodeError`] if the payload does not match `E`.
    pub fn decode<E: DomainEvent + DeserializeOwned>(&self) -> Result<E, EventError> {
        E::from_payload(&self.payload)
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Envelope {{ id: {}, type: {} }}", self.id, self.event_type)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
    struct TestEvent {
        id: String,
        value: i64,
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str {
            "test.created"
        }
    }

    #[test]
    fn from_event_stamps_type_and_payload() {
        let event = TestEvent {
            id: "t-1".to_string(),
            value: 42,
        };

        let envelope = Envelope::from_event(&event, None).expect("encoding should succeed");

        assert_eq!(envelope.event_type, "test.created");
        assert_eq!(envelope.payload["id"], "t-1");
        assert_eq!(envelope.payload["value"], 42);
        assert!(envelope.correlation_id.is_none());
    }

    #[test]
    fn decode_roundtrip() {
        let event = TestEvent {
            id: "t-2".to_string(),
            value: -7,
        };

        let envelope = Envelope::from_event(&event, Some("corr-1".to_string()))
            .expect("encoding should succeed");
        let decoded: TestEvent = envelope.decode().expect("decoding should succeed");

        assert_eq!(event, decoded);
    }

    #[test]
    fn decode_rejects_mismatched_payload() {
        let envelope = Envelope::new(
            Uuid::new_v4(),
            "test.created".to_string(),
            serde_json::json!({ "wrong": true }),
            None,
            Utc::now(),
        );

        assert!(envelope.decode::<TestEvent>().is_err());
    }

    #[test]
    fn display_includes_type() {
        let envelope = Envelope::new(
            Uuid::new_v4(),
            "test.created".to_string(),
            serde_json::json!({}),
            None,
            Utc::now(),
        );

        let display = format!("{envelope}");
        assert!(display.contains("test.created"));
    }

    proptest! {
        #[test]
        fn serde_roundtrip_preserves_type_and_payload(id in "[a-z0-9-]{1,12}", value in any::<i64>()) {
            let event = TestEvent { id, value };
            let envelope = Envelope::from_event(&event, None).unwrap();

            let json = serde_json::to_string(&envelope).unwrap();
            let restored: Envelope = serde_json::from_str(&json).unwrap();

            prop_assert_eq!(&restored.event_type, &envelope.event_type);
            prop_assert_eq!(&restored.payload, &envelope.payload);
            prop_assert_eq!(restored.id, envelope.id);
        }
    }
}
