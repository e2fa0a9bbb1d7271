//! Worker state registry.
//!
//! The registry is the single source of truth for every live worker's
//! mutable state. All read-modify-write sequences happen under one write
//! lock, and the lock is never held across an `.await` other than its own
//! acquisition.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::error::RegistryError;
use crate::worker::WorkerId;

/// Mutable state of a single worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerRecord {
    /// Worker identity; the registry key.
    pub id: WorkerId,
    /// Cooperative termination request. Only ever goes false → true.
    pub killed: bool,
    /// Current counter value.
    pub value: i64,
    /// When the record was registered.
    pub started_at: DateTime<Utc>,
}

/// Reporting view of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerInfo {
    /// Worker identity.
    pub id: WorkerId,
    /// Counter value at snapshot time.
    pub value: i64,
}

/// Result of a single worker tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The counter was advanced to the contained value.
    Advanced(i64),
    /// The worker was marked killed; the counter was left at the contained value.
    Killed(i64),
    /// No record exists for the worker.
    Missing,
}

/// Keyed store of worker records.
#[derive(Debug, Default)]
pub struct Registry {
    records: RwLock<BTreeMap<WorkerId, WorkerRecord>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new worker with `killed = false`.
    pub async fn insert(&self, id: WorkerId, initial_value: i64) -> Result<(), RegistryError> {
        let mut records = self.records.write().await;
        if records.contains_key(&id) {
            return Err(RegistryError::DuplicateId { id });
        }
        records.insert(
            id,
            WorkerRecord {
                id,
                killed: false,
                value: initial_value,
                started_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Snapshot of a single record.
    pub async fn get(&self, id: WorkerId) -> Result<WorkerRecord, RegistryError> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(RegistryError::NotFound { id })
    }

    /// Request termination. Returns `false` if the id is unknown.
    pub async fn mark_killed(&self, id: WorkerId) -> bool {
        match self.records.write().await.get_mut(&id) {
            Some(record) => {
                record.killed = true;
                true
            }
            None => false,
        }
    }

    /// Overwrite the counter. Returns `false` if the id is unknown.
    pub async fn set_value(&self, id: WorkerId, value: i64) -> bool {
        match self.records.write().await.get_mut(&id) {
            Some(record) => {
                record.value = value;
                true
            }
            None => false,
        }
    }

    /// Check the kill flag and, if clear, advance the counter, in one step.
    pub async fn tick(&self, id: WorkerId) -> TickOutcome {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&id) else {
            return TickOutcome::Missing;
        };
        if record.killed {
            return TickOutcome::Killed(record.value);
        }
        record.value = record.value.wrapping_add(1);
        TickOutcome::Advanced(record.value)
    }

    /// Delete a record. Returns the removed record, if any.
    pub async fn remove(&self, id: WorkerId) -> Option<WorkerRecord> {
        self.records.write().await.remove(&id)
    }

    /// All `(id, value)` pairs, ordered by id.
    pub async fn snapshot(&self) -> Vec<WorkerInfo> {
        self.records
            .read()
            .await
            .values()
            .map(|r| WorkerInfo {
                id: r.id,
                value: r.value,
            })
            .collect()
    }

    /// Number of registered workers, including any awaiting removal.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether no worker is registered.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> WorkerId {
        WorkerId::new(raw)
    }

    #[tokio::test]
    async fn insert_and_get() {
        let registry = Registry::new();
        registry.insert(id(1), 100).await.unwrap();

        let record = registry.get(id(1)).await.unwrap();
        assert_eq!(record.value, 100);
        assert!(!record.killed);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let registry = Registry::new();
        registry.insert(id(1), 0).await.unwrap();

        let result = registry.insert(id(1), 5).await;
        assert_eq!(result, Err(RegistryError::DuplicateId { id: id(1) }));
        // Original record untouched
        assert_eq!(registry.get(id(1)).await.unwrap().value, 0);
    }

    #[tokio::test]
    async fn get_unknown_is_not_found() {
        let registry = Registry::new();
        assert_eq!(
            registry.get(id(9)).await,
            Err(RegistryError::NotFound { id: id(9) })
        );
    }

    #[tokio::test]
    async fn tick_advances_until_killed() {
        let registry = Registry::new();
        registry.insert(id(1), 10).await.unwrap();

        assert_eq!(registry.tick(id(1)).await, TickOutcome::Advanced(11));
        assert_eq!(registry.tick(id(1)).await, TickOutcome::Advanced(12));

        assert!(registry.mark_killed(id(1)).await);
        assert_eq!(registry.tick(id(1)).await, TickOutcome::Killed(12));
        // Value is frozen once killed
        assert_eq!(registry.get(id(1)).await.unwrap().value, 12);
    }

    #[tokio::test]
    async fn tick_on_missing_record() {
        let registry = Registry::new();
        assert_eq!(registry.tick(id(3)).await, TickOutcome::Missing);
    }

    #[tokio::test]
    async fn kill_is_monotonic() {
        let registry = Registry::new();
        registry.insert(id(1), 0).await.unwrap();
        assert!(registry.mark_killed(id(1)).await);
        assert!(registry.mark_killed(id(1)).await);

        registry.set_value(id(1), 50).await;
        let record = registry.get(id(1)).await.unwrap();
        assert!(record.killed);
        assert_eq!(record.value, 50);
    }

    #[tokio::test]
    async fn unknown_ids_are_no_ops() {
        let registry = Registry::new();
        assert!(!registry.mark_killed(id(4)).await);
        assert!(!registry.set_value(id(4), 1).await);
        assert!(registry.remove(id(4)).await.is_none());
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn set_value_then_tick_resumes_from_new_value() {
        let registry = Registry::new();
        registry.insert(id(1), 100).await.unwrap();
        registry.tick(id(1)).await;

        assert!(registry.set_value(id(1), 5).await);
        assert_eq!(registry.tick(id(1)).await, TickOutcome::Advanced(6));
    }

    #[tokio::test]
    async fn tick_wraps_at_max() {
        let registry = Registry::new();
        registry.insert(id(1), i64::MAX).await.unwrap();
        assert_eq!(registry.tick(id(1)).await, TickOutcome::Advanced(i64::MIN));
    }

    #[tokio::test]
    async fn snapshot_is_ordered_by_id() {
        let registry = Registry::new();
        registry.insert(id(3), 30).await.unwrap();
        registry.insert(id(1), 10).await.unwrap();
        registry.insert(id(2), 20).await.unwrap();

        let snapshot = registry.snapshot().await;
        let ids: Vec<u64> = snapshot.iter().map(|w| w.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(snapshot[0].value, 10);
    }

    #[tokio::test]
    async fn remove_one_of_many() {
        let registry = Registry::new();
        registry.insert(id(1), 0).await.unwrap();
        registry.insert(id(2), 0).await.unwrap();

        let removed = registry.remove(id(1)).await.unwrap();
        assert_eq!(removed.id, id(1));
        assert_eq!(registry.len().await, 1);
        assert_eq!(registry.get(id(2)).await.unwrap().value, 0);
    }
}
