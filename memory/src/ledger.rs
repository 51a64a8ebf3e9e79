//! In-memory idempotency ledger.
//!
//! One `Mutex` guards the whole record map, so `begin_attempt` performs its
//! check-and-reserve inside a single critical section: for any (event,
//! processor) pair, at most one concurrent caller is admitted. This is the
//! in-process equivalent of the unique-constraint insert a durable backend
//! would use.

use chrono::Utc;
use pledgeflow_core::clock::{Clock, SystemClock};
use pledgeflow_core::ledger::{
    Admission, LedgerError, ProcessingLedger, ProcessingStatus, StatusRecord,
};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

type Key = (Uuid, String);

/// `HashMap`-backed idempotency ledger.
pub struct InMemoryLedger {
    records: Mutex<HashMap<Key, StatusRecord>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryLedger {
    /// Create a ledger using the system clock for `completed_at` stamps.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create a ledger with an injected clock (fixed clocks for tests).
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<Key, StatusRecord>>, LedgerError> {
        self.records
            .lock()
            .map_err(|_| LedgerError::Backend("ledger lock poisoned".to_string()))
    }
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingLedger for InMemoryLedger {
    fn begin_attempt(
        &self,
        event_id: Uuid,
        processor_name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Admission, LedgerError>> + Send + '_>> {
        let processor_name = processor_name.to_string();
        Box::pin(async move {
            let mut records = self.lock()?;
            let key = (event_id, processor_name.clone());

            match records.get_mut(&key) {
                None => {
                    records.insert(
                        key,
                        StatusRecord {
                            event_id,
                            processor_name,
                            status: ProcessingStatus::Pending,
                            attempt_count: 1,
                            error_message: None,
                            completed_at: None,
                        },
                    );
                    Ok(Admission::Fresh { attempt: 1 })
                }
                Some(record) => match record.status {
                    ProcessingStatus::Completed => Ok(Admission::AlreadyCompleted),
                    ProcessingStatus::Pending => Ok(Admission::InFlight),
                    ProcessingStatus::Failed => {
                        record.status = ProcessingStatus::Pending;
                        record.attempt_count += 1;
                        Ok(Admission::Fresh {
                            attempt: record.attempt_count,
                        })
                    }
                },
            }
        })
    }

    fn mark_completed(
        &self,
        event_id: Uuid,
        processor_name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + '_>> {
        let processor_name = processor_name.to_string();
        Box::pin(async move {
            let now = self.clock.now();
            let mut records = self.lock()?;
            let key = (event_id, processor_name.clone());

            let record = records.entry(key).or_insert_with(|| StatusRecord {
                event_id,
                processor_name,
                status: ProcessingStatus::Pending,
                attempt_count: 1,
                error_message: None,
                completed_at: None,
            });
            record.status = ProcessingStatus::Completed;
            record.error_message = None;
            record.completed_at = Some(now);
            Ok(())
        })
    }

    fn mark_failed(
        &self,
        event_id: Uuid,
        processor_name: &str,
        error_message: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + '_>> {
        let processor_name = processor_name.to_string();
        let error_message = error_message.to_string();
        Box::pin(async move {
            let mut records = self.lock()?;
            let key = (event_id, processor_name.clone());

            let record = records.entry(key).or_insert_with(|| StatusRecord {
                event_id,
                processor_name,
                status: ProcessingStatus::Pending,
                attempt_count: 1,
                error_message: None,
                completed_at: None,
            });
            record.status = ProcessingStatus::Failed;
            record.error_message = Some(error_message);
            Ok(())
        })
    }

    fn get(
        &self,
        event_id: Uuid,
        processor_name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<StatusRecord>, LedgerError>> + Send + '_>> {
        let key = (event_id, processor_name.to_string());
        Box::pin(async move {
            let records = self.lock()?;
            Ok(records.get(&key).cloned())
        })
    }

    fn purge(
        &self,
        event_id: Uuid,
        processor_name: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), LedgerError>> + Send + '_>> {
        let key = (event_id, processor_name.to_string());
        Box::pin(async move {
            let mut records = self.lock()?;
            records.remove(&key);
            Ok(())
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_admission_is_fresh() {
        let ledger = InMemoryLedger::new();
        let event_id = Uuid::new_v4();

        let admission = ledger.begin_attempt(event_id, "notify").await.unwrap();
        assert_eq!(admission, Admission::Fresh { attempt: 1 });

        let record = ledger.get(event_id, "notify").await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Pending);
        assert_eq!(record.attempt_count, 1);
    }

    #[tokio::test]
    async fn completed_pair_is_never_readmitted() {
        let ledger = InMemoryLedger::new();
        let event_id = Uuid::new_v4();

        ledger.begin_attempt(event_id, "notify").await.unwrap();
        ledger.mark_completed(event_id, "notify").await.unwrap();

        let admission = ledger.begin_attempt(event_id, "notify").await.unwrap();
        assert_eq!(admission, Admission::AlreadyCompleted);

        let record = ledger.get(event_id, "notify").await.unwrap().unwrap();
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn pending_pair_reports_in_flight() {
        let ledger = InMemoryLedger::new();
        let event_id = Uuid::new_v4();

        ledger.begin_attempt(event_id, "notify").await.unwrap();
        let admission = ledger.begin_attempt(event_id, "notify").await.unwrap();
        assert_eq!(admission, Admission::InFlight);
    }

    #[tokio::test]
    async fn failed_pair_readmits_with_bumped_attempt() {
        let ledger = InMemoryLedger::new();
        let event_id = Uuid::new_v4();

        ledger.begin_attempt(event_id, "notify").await.unwrap();
        ledger
            .mark_failed(event_id, "notify", "send refused")
            .await
            .unwrap();

        let record = ledger.get(event_id, "notify").await.unwrap().unwrap();
        assert_eq!(record.status, ProcessingStatus::Failed);
        assert_eq!(record.error_message.as_deref(), Some("send refused"));

        let admission = ledger.begin_attempt(event_id, "notify").await.unwrap();
        assert_eq!(admission, Admission::Fresh { attempt: 2 });
    }

    #[tokio::test]
    async fn pairs_are_independent_per_processor() {
        let ledger = InMemoryLedger::new();
        let event_id = Uuid::new_v4();

        ledger.begin_attempt(event_id, "notify").await.unwrap();
        ledger.mark_completed(event_id, "notify").await.unwrap();

        let admission = ledger.begin_attempt(event_id, "audit").await.unwrap();
        assert_eq!(admission, Admission::Fresh { attempt: 1 });
    }

    #[tokio::test]
    async fn concurrent_admissions_yield_one_fresh() {
        let ledger = Arc::new(InMemoryLedger::new());
        let event_id = Uuid::new_v4();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.begin_attempt(event_id, "notify").await.unwrap()
            }));
        }

        let mut fresh = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), Admission::Fresh { .. }) {
                fresh += 1;
            }
        }
        assert_eq!(fresh, 1);
    }

    #[tokio::test]
    async fn purge_removes_the_record() {
        let ledger = InMemoryLedger::new();
        let event_id = Uuid::new_v4();

        ledger.begin_attempt(event_id, "notify").await.unwrap();
        ledger.purge(event_id, "notify").await.unwrap();

        assert!(ledger.get(event_id, "notify").await.unwrap().is_none());
    }
}
