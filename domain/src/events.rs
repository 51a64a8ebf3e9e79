//! Fundraising domain events.
//!
//! One payload struct per event type, each carrying exactly the fields the
//! platform's projections and processors need. The tag constants are the single
//! source of the dotted type strings; factories, the registry, and processor
//! match arms all reference them, so a tag cannot drift between the three.

use pledgeflow_core::event::DomainEvent;
use pledgeflow_core::registry::EventRegistry;
use serde::{Deserialize, Serialize};

/// Tag for [`CampaignCreated`].
pub const CAMPAIGN_CREATED: &str = "campaign.created";
/// Tag for [`CampaignPublished`].
pub const CAMPAIGN_PUBLISHED: &str = "campaign.published";
/// Tag for [`CampaignGoalReached`].
pub const CAMPAIGN_GOAL_REACHED: &str = "campaign.goal_reached";
/// Tag for [`DonationReceived`].
pub const DONATION_RECEIVED: &str = "donation.received";
/// Tag for [`UserFollowed`].
pub const USER_FOLLOWED: &str = "user.followed_user";
/// Tag for [`UserUnfollowed`].
pub const USER_UNFOLLOWED: &str = "user.unfollowed_user";

/// A fundraiser was created (still a draft).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CampaignCreated {
    /// The new campaign's id.
    pub campaign_id: String,
    /// The creating user's id.
    pub owner_id: String,
    /// Display title.
    pub title: String,
    /// Fundraising goal in minor currency units.
    pub goal_cents: i64,
    /// ISO 4217 currency code.
    pub currency: String,
}

impl DomainEvent for CampaignCreated {
    fn event_type(&self) -> &'static str {
        CAMPAIGN_CREATED
    }
}

/// A draft campaign went live.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CampaignPublished {
    /// The campaign that went live.
    pub campaign_id: String,
}

impl DomainEvent for CampaignPublished {
    fn event_type(&self) -> &'static str {
        CAMPAIGN_PUBLISHED
    }
}

/// A campaign's donation total crossed its goal.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CampaignGoalReached {
    /// The campaign that hit its goal.
    pub campaign_id: String,
    /// The campaign owner, notified of the milestone.
    pub owner_id: String,
    /// Total raised at the moment the goal was crossed, in minor units.
    pub total_cents: i64,
}

impl DomainEvent for CampaignGoalReached {
    fn event_type(&self) -> &'static str {
        CAMPAIGN_GOAL_REACHED
    }
}

/// A donation was recorded against a campaign.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DonationReceived {
    /// The donation's id.
    pub donation_id: String,
    /// The receiving campaign.
    pub campaign_id: String,
    /// The donating user.
    pub donor_id: String,
    /// Amount in minor currency units.
    pub amount_cents: i64,
}

impl DomainEvent for DonationReceived {
    fn event_type(&self) -> &'static str {
        DONATION_RECEIVED
    }
}

/// One user started following another.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserFollowed {
    /// The user who followed.
    pub follower_id: String,
    /// The user being followed.
    pub followed_user_id: String,
}

impl DomainEvent for UserFollowed {
    fn event_type(&self) -> &'static str {
        USER_FOLLOWED
    }
}

/// One user stopped following another.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserUnfollowed {
    /// The user who unfollowed.
    pub follower_id: String,
    /// The user no longer followed.
    pub followed_user_id: String,
}

impl DomainEvent for UserUnfollowed {
    fn event_type(&self) -> &'static str {
        USER_UNFOLLOWED
    }
}

/// Register every fundraising event shape. Call once when building the bus.
pub fn register_events(registry: &mut EventRegistry) {
    registry.register::<CampaignCreated>(CAMPAIGN_CREATED);
    registry.register::<CampaignPublished>(CAMPAIGN_PUBLISHED);
    registry.register::<CampaignGoalReached>(CAMPAIGN_GOAL_REACHED);
    registry.register::<DonationReceived>(DONATION_RECEIVED);
    registry.register::<UserFollowed>(USER_FOLLOWED);
    registry.register::<UserUnfollowed>(USER_UNFOLLOWED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_shapes_are_registered() {
        let mut registry = EventRegistry::new();
        register_events(&mut registry);

        for tag in [
            CAMPAIGN_CREATED,
            CAMPAIGN_PUBLISHED,
            CAMPAIGN_GOAL_REACHED,
            DONATION_RECEIVED,
            USER_FOLLOWED,
            USER_UNFOLLOWED,
        ] {
            assert!(registry.contains(tag), "missing shape for {tag}");
        }
    }
}
