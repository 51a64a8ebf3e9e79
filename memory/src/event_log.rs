//! In-memory append-only event log.

use chrono::{DateTime, Utc};
use pledgeflow_core::event::Envelope;
use pledgeflow_core::event_log::{EventLog, EventLogError};
use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use uuid::Uuid;

struct LogInner {
    entries: Vec<Envelope>,
    ids: HashSet<Uuid>,
}

/// Vec-backed event log preserving append order.
///
/// Append is idempotent on the event id, matching the trait contract:
/// re-publishing an envelope the log already holds leaves the log unchanged.
pub struct InMemoryEventLog {
    inner: Mutex<LogInner>,
}

impl InMemoryEventLog {
    /// Create an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LogInner {
                entries: Vec::new(),
                ids: HashSet::new(),
            }),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LogInner>, EventLogError> {
        self.inner
            .lock()
            .map_err(|_| EventLogError::Backend("event log lock poisoned".to_string()))
    }
}

impl Default for InMemoryEventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLog for InMemoryEventLog {
    fn append(
        &self,
        envelope: Envelope,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventLogError>> + Send + '_>> {
        Box::pin(async move {
            let mut inner = self.lock()?;
            if inner.ids.insert(envelope.id) {
                inner.entries.push(envelope);
            }
            Ok(())
        })
    }

    fn get(
        &self,
        event_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Envelope>, EventLogError>> + Send + '_>> {
        Box::pin(async move {
            let inner = self.lock()?;
            Ok(inner.entries.iter().find(|e| e.id == event_id).cloned())
        })
    }

    fn read_from(
        &self,
        from: Option<DateTime<Utc>>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Envelope>, EventLogError>> + Send + '_>> {
        Box::pin(async move {
            let inner = self.lock()?;
            Ok(inner
                .entries
                .iter()
                .filter(|e| from.is_none_or(|ts| e.occurred_at >= ts))
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn envelope_at(occurred_at: DateTime<Utc>) -> Envelope {
        Envelope::new(
            Uuid::new_v4(),
            "test.created".to_string(),
            serde_json::json!({ "n": 1 }),
            None,
            occurred_at,
        )
    }

    #[tokio::test]
    async fn append_preserves_order() {
        let log = InMemoryEventLog::new();
        let base = Utc::now();

        let first = envelope_at(base);
        let second = envelope_at(base + Duration::seconds(1));
        log.append(first.clone()).await.unwrap();
        log.append(second.clone()).await.unwrap();

        let all = log.read_from(None).await.unwrap();
        assert_eq!(all, vec![first, second]);
    }

    #[tokio::test]
    async fn append_is_idempotent_on_id() {
        let log = InMemoryEventLog::new();
        let env = envelope_at(Utc::now());

        log.append(env.clone()).await.unwrap();
        log.append(env.clone()).await.unwrap();

        assert_eq!(log.read_from(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn read_from_filters_by_timestamp() {
        let log = InMemoryEventLog::new();
        let base = Utc::now();

        let old = envelope_at(base - Duration::minutes(5));
        let recent = envelope_at(base);
        log.append(old).await.unwrap();
        log.append(recent.clone()).await.unwrap();

        let since = log.read_from(Some(base)).await.unwrap();
        assert_eq!(since, vec![recent]);
    }

    #[tokio::test]
    async fn get_finds_by_id() {
        let log = InMemoryEventLog::new();
        let env = envelope_at(Utc::now());
        log.append(env.clone()).await.unwrap();

        assert_eq!(log.get(env.id).await.unwrap(), Some(env));
        assert_eq!(log.get(Uuid::new_v4()).await.unwrap(), None);
    }
}
