//! In-memory dead letter store.

use pledgeflow_core::clock::{Clock, SystemClock};
use pledgeflow_core::dead_letter::{DeadLetterEntry, DeadLetterError, DeadLetterStore};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Vec-backed dead letter store.
///
/// Keeps at most one entry per (event, processor) pair; repeated failures fold
/// into the existing entry. Entries stay in first-failure order, which is the
/// order `list` returns and the order bulk reprocessing walks.
pub struct InMemoryDeadLetterStore {
    entries: Mutex<Vec<DeadLetterEntry>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryDeadLetterStore {
    /// Create an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store with an injected clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            clock,
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<DeadLetterEntry>>, DeadLetterError> {
        self.entries
            .lock()
            .map_err(|_| DeadLetterError::Backend("dead letter lock poisoned".to_string()))
    }
}

impl Default for InMemoryDeadLetterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadLetterStore for InMemoryDeadLetterStore {
    fn record_failure(
        &self,
        event_id: Uuid,
        processor_name: &str,
        failure_reason: &str,
        failures: u32,
    ) -> Pin<Box<dyn Future<Output = Result<Uuid, DeadLetterError>> + Send + '_>> {
        let processor_name = processor_name.to_string();
        let failure_reason = failure_reason.to_string();
        Box::pin(async move {
            let now = self.clock.now();
            let mut entries = self.lock()?;

            if let Some(entry) = entries
                .iter_mut()
                .find(|e| e.event_id == event_id && e.processor_name == processor_name)
            {
                entry.failure_count += failures;
                entry.failure_reason = failure_reason;
                entry.last_failed_at = now;
                return Ok(entry.id);
            }

            let id = Uuid::new_v4();
            entries.push(DeadLetterEntry {
                id,
                event_id,
                processor_name,
                failure_reason,
                failure_count: failures,
                first_failed_at: now,
                last_failed_at: now,
            });
            Ok(id)
        })
    }

    fn get(
        &self,
        entry_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<Option<DeadLetterEntry>, DeadLetterError>> + Send + '_>>
    {
        Box::pin(async move {
            let entries = self.lock()?;
            Ok(entries.iter().find(|e| e.id == entry_id).cloned())
        })
    }

    fn list(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<DeadLetterEntry>, DeadLetterError>> + Send + '_>>
    {
        Box::pin(async move {
            let entries = self.lock()?;
            Ok(entries.clone())
        })
    }

    fn resolve(
        &self,
        entry_id: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<(), DeadLetterError>> + Send + '_>> {
        Box::pin(async move {
            let mut entries = self.lock()?;
            entries.retain(|e| e.id != entry_id);
            Ok(())
        })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<usize, DeadLetterError>> + Send + '_>> {
        Box::pin(async move {
            let entries = self.lock()?;
            Ok(entries.len())
        })
    }
}
