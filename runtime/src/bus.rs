//! In-process event bus: publish, subscribe, replay.
//!
//! The bus routes published envelopes to every subscription whose pattern
//! matches the event's type tag, guarding each invocation with the idempotency
//! ledger and retrying failures up to the configured budget before
//! dead-lettering the (event, processor) pair.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │   Factory   │  typed event → Envelope
//! └──────┬──────┘
//!        │ publish
//!        ▼
//! ┌─────────────────┐
//! │ 1. Validate     │◄─── EventRegistry (fail fast, nothing runs)
//! ├─────────────────┤
//! │ 2. Append       │◄─── EventLog (durable record, before any handler)
//! ├─────────────────┤
//! │ 3. Dispatch     │◄─── pattern-matched subscriptions
//! └────────┬────────┘
//!     ┌────┴────┐
//!     ▼         ▼
//! ┌────────┐ ┌────────┐      each guarded by ProcessingLedger,
//! │ Proc A │ │ Proc B │      failures retried then dead-lettered
//! └────────┘ └────────┘
//! ```
//!
//! # Failure Semantics
//!
//! A handler error is caught here, recorded as failed in the ledger, and never
//! propagated to the publisher. The primary write (the campaign row, say) was
//! persisted before `publish` was called; a lagging projection is an eventual
//! consistency trade-off, not a rollback trigger.
//!
//! # Dispatch Modes
//!
//! [`DispatchMode::Sequential`] (the default) awaits each subscription in turn,
//! preserving publish order per processor — projections that assume
//! last-write-wins need this. [`DispatchMode::Concurrent`] joins all
//! subscriptions for one event and forfeits cross-processor ordering for
//! throughput. The mode is explicit configuration, not an implementation
//! accident.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use pledgeflow_core::dead_letter::DeadLetterStore;
use pledgeflow_core::event::Envelope;
use pledgeflow_core::event_log::{EventLog, EventLogError};
use pledgeflow_core::ledger::{Admission, ProcessingLedger};
use pledgeflow_core::processor::Processor;
use pledgeflow_core::registry::{EventRegistry, SchemaValidationError};
use pledgeflow_core::retry::RetryPolicy;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors surfaced synchronously to the publisher.
///
/// Handler failures are deliberately absent: they are contained by the bus and
/// recorded per (event, processor) in the ledger.
#[derive(Error, Debug)]
pub enum PublishError {
    /// The envelope failed schema validation; nothing was appended or dispatched.
    #[error("Schema validation failed: {0}")]
    Validation(#[from] SchemaValidationError),

    /// The event log rejected the append.
    #[error("Event log append failed: {0}")]
    Log(#[from] EventLogError),
}

/// How the bus runs the subscriptions matched by one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Await each subscription in turn. Events of the same type reach a given
    /// processor in publish order.
    #[default]
    Sequential,
    /// Run all matched subscriptions concurrently. No ordering guarantee
    /// between processors for the same event, nor per processor across events.
    Concurrent,
}

/// Bus behavior configuration.
#[derive(Debug, Clone, Default)]
pub struct BusConfig {
    /// Dispatch mode for matched subscriptions.
    pub dispatch: DispatchMode,
    /// Retry budget and backoff applied per (event, processor) within a publish.
    pub retry: RetryPolicy,
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: u64,
    pattern: String,
    processor: Arc<dyn Processor>,
}

/// The in-process event bus.
///
/// Explicitly constructed and dependency-injected: publishers and the DLQ
/// manager receive an `Arc<EventBus>` at startup, and tests build a fresh bus
/// per test. There is no global instance.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(EventBus::new(registry, log, ledger, dead_letters));
/// bus.subscribe("user.*", Arc::new(NotificationProcessor::new(sender))).await;
///
/// let envelope = factories::user_followed("u1", "u2", None)?;
/// bus.publish(envelope).await?;
/// ```
pub struct EventBus {
    registry: EventRegistry,
    event_log: Arc<dyn EventLog>,
    ledger: Arc<dyn ProcessingLedger>,
    dead_letters: Arc<dyn DeadLetterStore>,
    subscriptions: RwLock<Vec<Subscription>>,
    next_subscription: AtomicU64,
    config: BusConfig,
}

impl EventBus {
    /// Create a bus with the default configuration (sequential dispatch,
    /// three-attempt retry budget).
    #[must_use]
    pub fn new(
        registry: EventRegistry,
        event_log: Arc<dyn EventLog>,
        ledger: Arc<dyn ProcessingLedger>,
        dead_letters: Arc<dyn DeadLetterStore>,
    ) -> Self {
        Self {
            registry,
            event_log,
            ledger,
            dead_letters,
            subscriptions: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(0),
            config: BusConfig::default(),
        }
    }

    /// Replace the bus configuration.
    #[must_use]
    pub fn with_config(mut self, config: BusConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a processor for every event whose type tag matches `pattern`.
    ///
    /// Patterns are an exact tag (`"campaign.created"`), a wildcard prefix
    /// (`"user.*"`), or `"*"` for everything. Multiple subscriptions may match
    /// one event; all of them are invoked.
    pub async fn subscribe(
        &self,
        pattern: impl Into<String>,
        processor: Arc<dyn Processor>,
    ) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        let pattern = pattern.into();
        tracing::debug!(
            subscription = id,
            pattern = %pattern,
            processor = processor.name(),
            "Subscription registered"
        );
        self.subscriptions.write().await.push(Subscription {
            id,
            pattern,
            processor,
        });
        SubscriptionId(id)
    }

    /// Remove a subscription. Returns whether it existed.
    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write().await;
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id.0);
        subscriptions.len() != before
    }

    /// Publish an event: validate, append to the log, dispatch to matching
    /// subscriptions, and await them.
    ///
    /// Returns once locally-known handlers have finished (or dead-lettered);
    /// handler failures are recorded, not returned.
    ///
    /// # Errors
    ///
    /// - [`PublishError::Validation`] if the payload fails schema validation.
    ///   No handler runs and nothing is appended.
    /// - [`PublishError::Log`] if the event log append fails.
    pub async fn publish(&self, envelope: Envelope) -> Result<(), PublishError> {
        self.registry.validate(&envelope)?;
        self.event_log.append(envelope.clone()).await?;

        metrics::counter!("event_bus.published", "event_type" => envelope.event_type.clone())
            .increment(1);
        tracing::debug!(
            event_id = %envelope.id,
            event_type = %envelope.event_type,
            correlation_id = envelope.correlation_id.as_deref(),
            "Event published"
        );

        self.dispatch(&envelope).await;
        Ok(())
    }

    /// Publish several events.
    ///
    /// All envelopes are validated before any is appended, so a schema error in
    /// one rejects the batch with no partial side effects. Past validation there
    /// is no atomicity across the batch; each event follows normal per-event
    /// handler semantics.
    ///
    /// # Errors
    ///
    /// Same as [`EventBus::publish`], for the first envelope that fails.
    pub async fn publish_batch(&self, envelopes: Vec<Envelope>) -> Result<(), PublishError> {
        for envelope in &envelopes {
            self.registry.validate(envelope)?;
        }
        for envelope in envelopes {
            self.event_log.append(envelope.clone()).await?;
            metrics::counter!("event_bus.published", "event_type" => envelope.event_type.clone())
                .increment(1);
            self.dispatch(&envelope).await;
        }
        Ok(())
    }

    /// Re-dispatch logged events occurring at or after `from` (all events for
    /// `None`), in original append order, to rebuild or repair projections.
    ///
    /// Replay does not bypass the ledger: pairs already completed are skipped,
    /// so effects that are not naturally idempotent are not duplicated. Returns
    /// the number of events re-dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Log`] if the event log cannot be read.
    pub async fn replay(&self, from: Option<DateTime<Utc>>) -> Result<usize, PublishError> {
        let events = self.event_log.read_from(from).await?;
        tracing::info!(count = events.len(), "Replaying events from log");

        for envelope in &events {
            self.dispatch(envelope).await;
        }
        Ok(events.len())
    }

    /// Find a registered processor by its stable name.
    pub async fn processor_by_name(&self, name: &str) -> Option<Arc<dyn Processor>> {
        self.subscriptions
            .read()
            .await
            .iter()
            .find(|s| s.processor.name() == name)
            .map(|s| Arc::clone(&s.processor))
    }

    pub(crate) fn event_log(&self) -> &Arc<dyn EventLog> {
        &self.event_log
    }

    pub(crate) fn ledger(&self) -> &Arc<dyn ProcessingLedger> {
        &self.ledger
    }

    pub(crate) fn dead_letters(&self) -> &Arc<dyn DeadLetterStore> {
        &self.dead_letters
    }

    /// Run all matching subscriptions for one envelope.
    async fn dispatch(&self, envelope: &Envelope) {
        let matching: Vec<Arc<dyn Processor>> = self
            .subscriptions
            .read()
            .await
            .iter()
            .filter(|s| pattern_matches(&s.pattern, &envelope.event_type))
            .map(|s| Arc::clone(&s.processor))
            .collect();

        match self.config.dispatch {
            DispatchMode::Sequential => {
                for processor in &matching {
                    self.run_guarded(envelope, processor).await;
                }
            }
            DispatchMode::Concurrent => {
                join_all(
                    matching
                        .iter()
                        .map(|processor| self.run_guarded(envelope, processor)),
                )
                .await;
            }
        }
    }

    /// Invoke one processor for one envelope, guarded by the ledger and the
    /// retry budget. Never returns an error: outcomes land in the ledger and,
    /// past the budget, in the dead letter store.
    #[allow(clippy::cognitive_complexity)]
    async fn run_guarded(&self, envelope: &Envelope, processor: &Arc<dyn Processor>) {
        let name = processor.name();

        match self.ledger.begin_attempt(envelope.id, name).await {
            Ok(Admission::Fresh { .. }) => {}
            Ok(Admission::AlreadyCompleted) => {
                metrics::counter!("event_bus.skipped_completed").increment(1);
                tracing::trace!(
                    event_id = %envelope.id,
                    processor = name,
                    "Pair already completed, skipping"
                );
                return;
            }
            Ok(Admission::InFlight) => {
                tracing::debug!(
                    event_id = %envelope.id,
                    processor = name,
                    "Pair already in flight, skipping"
                );
                return;
            }
            Err(e) => {
                tracing::error!(
                    event_id = %envelope.id,
                    processor = name,
                    error = %e,
                    "Ledger admission failed"
                );
                return;
            }
        }

        let mut attempt: u32 = 1;
        loop {
            match processor.handle(envelope).await {
                Ok(()) => {
                    if let Err(e) = self.ledger.mark_completed(envelope.id, name).await {
                        tracing::error!(
                            event_id = %envelope.id,
                            processor = name,
                            error = %e,
                            "Failed to mark pair completed"
                        );
                    }
                    metrics::counter!("event_bus.processed", "processor" => name.to_string())
                        .increment(1);
                    return;
                }
                Err(err) => {
                    metrics::counter!("event_bus.handler_failures", "processor" => name.to_string())
                        .increment(1);
                    tracing::warn!(
                        event_id = %envelope.id,
                        processor = name,
                        attempt,
                        error = %err,
                        "Handler failed"
                    );
                    if let Err(e) = self.ledger.mark_failed(envelope.id, name, err.message()).await
                    {
                        tracing::error!(
                            event_id = %envelope.id,
                            processor = name,
                            error = %e,
                            "Failed to mark pair failed"
                        );
                        return;
                    }

                    if attempt >= self.config.retry.max_attempts {
                        self.dead_letter(envelope, name, err.message(), attempt).await;
                        return;
                    }

                    tokio::time::sleep(self.config.retry.delay_for_attempt(attempt - 1)).await;

                    match self.ledger.begin_attempt(envelope.id, name).await {
                        Ok(Admission::Fresh { .. }) => attempt += 1,
                        Ok(_) => return,
                        Err(e) => {
                            tracing::error!(
                                event_id = %envelope.id,
                                processor = name,
                                error = %e,
                                "Ledger re-admission failed"
                            );
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn dead_letter(&self, envelope: &Envelope, name: &str, reason: &str, failures: u32) {
        match self
            .dead_letters
            .record_failure(envelope.id, name, reason, failures)
            .await
        {
            Ok(entry_id) => {
                metrics::counter!("event_bus.dlq.added", "processor" => name.to_string())
                    .increment(1);
                tracing::warn!(
                    dlq_id = %entry_id,
                    event_id = %envelope.id,
                    event_type = %envelope.event_type,
                    processor = name,
                    failures,
                    "Event dead-lettered after exhausting retry budget"
                );
            }
            Err(e) => {
                tracing::error!(
                    event_id = %envelope.id,
                    processor = name,
                    error = %e,
                    "Failed to record dead letter entry"
                );
            }
        }
    }
}

/// Whether a subscription pattern matches an event type tag.
///
/// `"*"` matches everything; `"user.*"` matches any tag in the `user` group;
/// anything else is an exact match.
fn pattern_matches(pattern: &str, event_type: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix(".*") {
        return event_type
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'));
    }
    pattern == event_type
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_pattern_matches_only_itself() {
        assert!(pattern_matches("campaign.created", "campaign.created"));
        assert!(!pattern_matches("campaign.created", "campaign.published"));
    }

    #[test]
    fn wildcard_prefix_matches_group() {
        assert!(pattern_matches("user.*", "user.followed_user"));
        assert!(pattern_matches("user.*", "user.unfollowed_user"));
        assert!(!pattern_matches("user.*", "campaign.created"));
        // The prefix match is per-segment: "user.*" must not match "users.created".
        assert!(!pattern_matches("user.*", "users.created"));
    }

    #[test]
    fn star_matches_everything() {
        assert!(pattern_matches("*", "campaign.created"));
        assert!(pattern_matches("*", "user.followed_user"));
    }
}
