//! Domain event factories.
//!
//! Pure constructors from raw call-site data to schema-valid envelopes. The
//! payload shape per event type is centralized here, so publishers cannot hand
//! the bus a malformed event: required fields are checked before an envelope
//! exists, and the correct type tag, a fresh id, and a creation timestamp are
//! stamped on.
//!
//! # Example
//!
//! ```
//! use pledgeflow_domain::factories;
//!
//! let envelope = factories::user_followed("u1", "u2", Some("op-7".to_string())).unwrap();
//! assert_eq!(envelope.event_type, "user.followed_user");
//!
//! assert!(factories::user_followed("u1", "", None).is_err());
//! ```

use crate::events::{
    CampaignCreated, CampaignGoalReached, CampaignPublished, DonationReceived, UserFollowed,
    UserUnfollowed,
};
use pledgeflow_core::event::{DomainEvent, Envelope};
use serde::Serialize;
use thiserror::Error;

/// Rejection of raw factory input, before any envelope exists.
///
/// Recovered at the call site: the UI action fails visibly, nothing was
/// published.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// A required field was empty or missing.
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// A field was present but invalid.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },

    /// The validated event failed to encode. Should not happen for these
    /// shapes; surfaced rather than swallowed.
    #[error("Failed to encode event: {0}")]
    Encode(String),
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn positive(field: &'static str, value: i64) -> Result<(), ValidationError> {
    if value <= 0 {
        return Err(ValidationError::InvalidValue {
            field,
            reason: format!("must be positive, got {value}"),
        });
    }
    Ok(())
}

fn seal<E: DomainEvent + Serialize>(
    event: &E,
    correlation_id: Option<String>,
) -> Result<Envelope, ValidationError> {
    Envelope::from_event(event, correlation_id).map_err(|e| ValidationError::Encode(e.to_string()))
}

/// Build a `campaign.created` envelope.
///
/// # Errors
///
/// Rejects empty ids or title, a non-positive goal, and a currency code that
/// is not three letters.
pub fn campaign_created(
    campaign_id: &str,
    owner_id: &str,
    title: &str,
    goal_cents: i64,
    currency: &str,
    correlation_id: Option<String>,
) -> Result<Envelope, ValidationError> {
    require("campaign_id", campaign_id)?;
    require("owner_id", owner_id)?;
    require("title", title)?;
    positive("goal_cents", goal_cents)?;
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ValidationError::InvalidValue {
            field: "currency",
            reason: format!("expected a three-letter ISO code, got '{currency}'"),
        });
    }

    seal(
        &CampaignCreated {
            campaign_id: campaign_id.to_string(),
            owner_id: owner_id.to_string(),
            title: title.to_string(),
            goal_cents,
            currency: currency.to_string(),
        },
        correlation_id,
    )
}

/// Build a `campaign.published` envelope.
///
/// # Errors
///
/// Rejects an empty campaign id.
pub fn campaign_published(
    campaign_id: &str,
    correlation_id: Option<String>,
) -> Result<Envelope, ValidationError> {
    require("campaign_id", campaign_id)?;
    seal(
        &CampaignPublished {
            campaign_id: campaign_id.to_string(),
        },
        correlation_id,
    )
}

/// Build a `campaign.goal_reached` envelope.
///
/// # Errors
///
/// Rejects empty ids and a non-positive total.
pub fn campaign_goal_reached(
    campaign_id: &str,
    owner_id: &str,
    total_cents: i64,
    correlation_id: Option<String>,
) -> Result<Envelope, ValidationError> {
    require("campaign_id", campaign_id)?;
    require("owner_id", owner_id)?;
    positive("total_cents", total_cents)?;
    seal(
        &CampaignGoalReached {
            campaign_id: campaign_id.to_string(),
            owner_id: owner_id.to_string(),
            total_cents,
        },
        correlation_id,
    )
}

/// Build a `donation.received` envelope.
///
/// # Errors
///
/// Rejects empty ids and a non-positive amount.
pub fn donation_received(
    donation_id: &str,
    campaign_id: &str,
    donor_id: &str,
    amount_cents: i64,
    correlation_id: Option<String>,
) -> Result<Envelope, ValidationError> {
    require("donation_id", donation_id)?;
    require("campaign_id", campaign_id)?;
    require("donor_id", donor_id)?;
    positive("amount_cents", amount_cents)?;
    seal(
        &DonationReceived {
            donation_id: donation_id.to_string(),
            campaign_id: campaign_id.to_string(),
            donor_id: donor_id.to_string(),
            amount_cents,
        },
        correlation_id,
    )
}

/// Build a `user.followed_user` envelope.
///
/// # Errors
///
/// Rejects empty ids and a user following themselves.
pub fn user_followed(
    follower_id: &str,
    followed_user_id: &str,
    correlation_id: Option<String>,
) -> Result<Envelope, ValidationError> {
    require("follower_id", follower_id)?;
    require("followed_user_id", followed_user_id)?;
    if follower_id == followed_user_id {
        return Err(ValidationError::InvalidValue {
            field: "followed_user_id",
            reason: "a user cannot follow themselves".to_string(),
        });
    }
    seal(
        &UserFollowed {
            follower_id: follower_id.to_string(),
            followed_user_id: followed_user_id.to_string(),
        },
        correlation_id,
    )
}

/// Build a `user.unfollowed_user` envelope.
///
/// # Errors
///
/// Rejects empty ids.
pub fn user_unfollowed(
    follower_id: &str,
    followed_user_id: &str,
    correlation_id: Option<String>,
) -> Result<Envelope, ValidationError> {
    require("follower_id", follower_id)?;
    require("followed_user_id", followed_user_id)?;
    seal(
        &UserUnfollowed {
            follower_id: follower_id.to_string(),
            followed_user_id: followed_user_id.to_string(),
        },
        correlation_id,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::events;

    #[test]
    fn campaign_created_stamps_tag_and_payload() {
        let envelope =
            campaign_created("c-1", "u-1", "Clean water", 500_000, "USD", None).unwrap();

        assert_eq!(envelope.event_type, events::CAMPAIGN_CREATED);
        let decoded: CampaignCreated = envelope.decode().unwrap();
        assert_eq!(decoded.campaign_id, "c-1");
        assert_eq!(decoded.goal_cents, 500_000);
    }

    #[test]
    fn fresh_ids_per_invocation() {
        let a = user_followed("u1", "u2", None).unwrap();
        let b = user_followed("u1", "u2", None).unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn empty_fields_are_rejected() {
        assert!(matches!(
            campaign_created("", "u-1", "t", 100, "USD", None),
            Err(ValidationError::MissingField("campaign_id"))
        ));
        assert!(matches!(
            donation_received("d-1", "c-1", "  ", 100, None),
            Err(ValidationError::MissingField("donor_id"))
        ));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(matches!(
            donation_received("d-1", "c-1", "u-1", 0, None),
            Err(ValidationError::InvalidValue { field: "amount_cents", .. })
        ));
        assert!(matches!(
            campaign_created("c-1", "u-1", "t", -5, "USD", None),
            Err(ValidationError::InvalidValue { field: "goal_cents", .. })
        ));
    }

    #[test]
    fn bad_currency_is_rejected() {
        assert!(campaign_created("c-1", "u-1", "t", 100, "usd", None).is_err());
        assert!(campaign_created("c-1", "u-1", "t", 100, "DOLLARS", None).is_err());
    }

    #[test]
    fn self_follow_is_rejected() {
        assert!(matches!(
            user_followed("u1", "u1", None),
            Err(ValidationError::InvalidValue { field: "followed_user_id", .. })
        ));
    }

    #[test]
    fn correlation_id_is_carried() {
        let envelope = campaign_published("c-1", Some("op-9".to_string())).unwrap();
        assert_eq!(envelope.correlation_id.as_deref(), Some("op-9"));
    }
}
