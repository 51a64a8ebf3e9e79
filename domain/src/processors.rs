//! Reference processors: projection updater, audit logger, notification
//! dispatcher.
//!
//! Each turns an event into one side effect against an injected sink. None of
//! them deduplicates on its own — the bus's ledger admission is what makes
//! them effectively at-most-once, including across replays.

use crate::events::{
    self, CampaignCreated, CampaignGoalReached, DonationReceived, UserFollowed, UserUnfollowed,
};
use pledgeflow_core::event::Envelope;
use pledgeflow_core::processor::{Processor, ProcessorError};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Read-model state kept in sync by [`ProjectionProcessor`].
///
/// Denormalized for the dashboard queries: running donation totals per
/// campaign and follower counts per user.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProjectionState {
    /// Donation total per campaign id, in minor units.
    pub campaign_totals: HashMap<String, i64>,
    /// Follower count per user id.
    pub follower_counts: HashMap<String, i64>,
}

/// Keeps the dashboard read models in sync with published events.
///
/// Subscribed with the `"*"` pattern; events it has no projection for are
/// acknowledged untouched, so widening the event catalog never breaks it.
pub struct ProjectionProcessor {
    state: Arc<Mutex<ProjectionState>>,
}

impl ProjectionProcessor {
    /// Stable processor name, the identity in the ledger and the DLQ.
    pub const NAME: &'static str = "projection";

    /// Create a processor writing to the given shared state.
    #[must_use]
    pub const fn new(state: Arc<Mutex<ProjectionState>>) -> Self {
        Self { state }
    }

    fn apply(&self, envelope: &Envelope) -> Result<(), ProcessorError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| ProcessorError::new("projection state lock poisoned"))?;

        match envelope.event_type.as_str() {
            events::CAMPAIGN_CREATED => {
                let event: CampaignCreated = envelope.decode()?;
                state.campaign_totals.entry(event.campaign_id).or_insert(0);
            }
            events::DONATION_RECEIVED => {
                let event: DonationReceived = envelope.decode()?;
                *state.campaign_totals.entry(event.campaign_id).or_insert(0) +=
                    event.amount_cents;
            }
            events::USER_FOLLOWED => {
                let event: UserFollowed = envelope.decode()?;
                *state
                    .follower_counts
                    .entry(event.followed_user_id)
                    .or_insert(0) += 1;
            }
            events::USER_UNFOLLOWED => {
                let event: UserUnfollowed = envelope.decode()?;
                let count = state
                    .follower_counts
                    .entry(event.followed_user_id)
                    .or_insert(0);
                *count = (*count - 1).max(0);
            }
            _ => {}
        }
        Ok(())
    }
}

impl Processor for ProjectionProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle<'a>(
        &'a self,
        envelope: &'a Envelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProcessorError>> + Send + 'a>> {
        Box::pin(async move { self.apply(envelope) })
    }
}

/// One audit trail record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// The audited event's id, as a string for the trail.
    pub event_id: String,
    /// The audited event's type tag.
    pub event_type: String,
    /// Correlation id, if the event carried one.
    pub correlation_id: Option<String>,
}

/// Appends one [`AuditRecord`] per event to a shared trail.
pub struct AuditLogProcessor {
    trail: Arc<Mutex<Vec<AuditRecord>>>,
}

impl AuditLogProcessor {
    /// Stable processor name.
    pub const NAME: &'static str = "audit-log";

    /// Create a processor appending to the given trail.
    #[must_use]
    pub const fn new(trail: Arc<Mutex<Vec<AuditRecord>>>) -> Self {
        Self { trail }
    }
}

impl Processor for AuditLogProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle<'a>(
        &'a self,
        envelope: &'a Envelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProcessorError>> + Send + 'a>> {
        Box::pin(async move {
            let mut trail = self
                .trail
                .lock()
                .map_err(|_| ProcessorError::new("audit trail lock poisoned"))?;
            trail.push(AuditRecord {
                event_id: envelope.id.to_string(),
                event_type: envelope.event_type.clone(),
                correlation_id: envelope.correlation_id.clone(),
            });
            Ok(())
        })
    }
}

/// A user-facing notification to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The user to notify.
    pub recipient_id: String,
    /// Rendered message body.
    pub message: String,
}

/// Delivery seam for notifications.
///
/// The production implementation talks to the hosted platform's push service;
/// [`InMemorySender`] collects notifications for tests.
pub trait NotificationSender: Send + Sync {
    /// Deliver one notification.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError`] if delivery fails; the bus retries and
    /// eventually dead-letters.
    fn send(&self, notification: Notification) -> Result<(), ProcessorError>;
}

/// Sender that collects notifications in memory.
#[derive(Default)]
pub struct InMemorySender {
    sent: Mutex<Vec<Notification>>,
}

impl InMemorySender {
    /// Create an empty sender.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError`] if the lock is poisoned.
    pub fn sent(&self) -> Result<Vec<Notification>, ProcessorError> {
        self.sent
            .lock()
            .map(|s| s.clone())
            .map_err(|_| ProcessorError::new("sent notifications lock poisoned"))
    }
}

impl NotificationSender for InMemorySender {
    fn send(&self, notification: Notification) -> Result<(), ProcessorError> {
        self.sent
            .lock()
            .map_err(|_| ProcessorError::new("sent notifications lock poisoned"))?
            .push(notification);
        Ok(())
    }
}

/// Turns social and milestone events into notifications.
pub struct NotificationProcessor {
    sender: Arc<dyn NotificationSender>,
}

impl NotificationProcessor {
    /// Stable processor name.
    pub const NAME: &'static str = "notifications";

    /// Create a processor delivering through the given sender.
    #[must_use]
    pub fn new(sender: Arc<dyn NotificationSender>) -> Self {
        Self { sender }
    }

    fn notify_for(&self, envelope: &Envelope) -> Result<(), ProcessorError> {
        match envelope.event_type.as_str() {
            events::USER_FOLLOWED => {
                let event: UserFollowed = envelope.decode()?;
                self.sender.send(Notification {
                    recipient_id: event.followed_user_id,
                    message: format!("{} started following you", event.follower_id),
                })
            }
            events::CAMPAIGN_GOAL_REACHED => {
                let event: CampaignGoalReached = envelope.decode()?;
                self.sender.send(Notification {
                    recipient_id: event.owner_id,
                    message: format!(
                        "Your campaign {} reached its goal at {} cents raised",
                        event.campaign_id, event.total_cents
                    ),
                })
            }
            _ => Ok(()),
        }
    }
}

impl Processor for NotificationProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn handle<'a>(
        &'a self,
        envelope: &'a Envelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), ProcessorError>> + Send + 'a>> {
        Box::pin(async move { self.notify_for(envelope) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::factories;

    #[tokio::test]
    async fn projection_accumulates_donations() {
        let state = Arc::new(Mutex::new(ProjectionState::default()));
        let processor = ProjectionProcessor::new(Arc::clone(&state));

        let created =
            factories::campaign_created("c-1", "u-1", "Clean water", 10_000, "USD", None).unwrap();
        let first = factories::donation_received("d-1", "c-1", "u-2", 2_500, None).unwrap();
        let second = factories::donation_received("d-2", "c-1", "u-3", 1_500, None).unwrap();

        processor.handle(&created).await.unwrap();
        processor.handle(&first).await.unwrap();
        processor.handle(&second).await.unwrap();

        let state = state.lock().unwrap();
        assert_eq!(state.campaign_totals.get("c-1"), Some(&4_000));
    }

    #[tokio::test]
    async fn projection_tracks_follower_counts() {
        let state = Arc::new(Mutex::new(ProjectionState::default()));
        let processor = ProjectionProcessor::new(Arc::clone(&state));

        let follow_a = factories::user_followed("u1", "u3", None).unwrap();
        let follow_b = factories::user_followed("u2", "u3", None).unwrap();
        let unfollow = factories::user_unfollowed("u1", "u3", None).unwrap();

        processor.handle(&follow_a).await.unwrap();
        processor.handle(&follow_b).await.unwrap();
        processor.handle(&unfollow).await.unwrap();

        let state = state.lock().unwrap();
        assert_eq!(state.follower_counts.get("u3"), Some(&1));
    }

    #[tokio::test]
    async fn unfollow_never_goes_negative() {
        let state = Arc::new(Mutex::new(ProjectionState::default()));
        let processor = ProjectionProcessor::new(Arc::clone(&state));

        let unfollow = factories::user_unfollowed("u1", "u3", None).unwrap();
        processor.handle(&unfollow).await.unwrap();

        let state = state.lock().unwrap();
        assert_eq!(state.follower_counts.get("u3"), Some(&0));
    }

    #[tokio::test]
    async fn audit_log_records_every_event() {
        let trail = Arc::new(Mutex::new(Vec::new()));
        let processor = AuditLogProcessor::new(Arc::clone(&trail));

        let envelope = factories::campaign_published("c-1", Some("op-1".to_string())).unwrap();
        processor.handle(&envelope).await.unwrap();

        let trail = trail.lock().unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].event_type, events::CAMPAIGN_PUBLISHED);
        assert_eq!(trail[0].correlation_id.as_deref(), Some("op-1"));
    }

    #[tokio::test]
    async fn follow_notifies_the_followed_user() {
        let sender = Arc::new(InMemorySender::new());
        let processor = NotificationProcessor::new(Arc::clone(&sender) as _);

        let envelope = factories::user_followed("u1", "u2", None).unwrap();
        processor.handle(&envelope).await.unwrap();

        let sent = sender.sent().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_id, "u2");
        assert!(sent[0].message.contains("u1"));
    }

    #[tokio::test]
    async fn goal_reached_notifies_the_owner() {
        let sender = Arc::new(InMemorySender::new());
        let processor = NotificationProcessor::new(Arc::clone(&sender) as _);

        let envelope = factories::campaign_goal_reached("c-1", "u-9", 500_000, None).unwrap();
        processor.handle(&envelope).await.unwrap();

        let sent = sender.sent().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient_id, "u-9");
    }

    #[tokio::test]
    async fn unrelated_events_produce_no_notification() {
        let sender = Arc::new(InMemorySender::new());
        let processor = NotificationProcessor::new(Arc::clone(&sender) as _);

        let envelope = factories::donation_received("d-1", "c-1", "u-1", 100, None).unwrap();
        processor.handle(&envelope).await.unwrap();

        assert!(sender.sent().unwrap().is_empty());
    }
}
