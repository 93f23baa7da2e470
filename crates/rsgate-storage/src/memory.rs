//! In-memory storage implementation for testing.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::instrument;

use crate::error::{HealthStatus, StorageResult};
use crate::traits::{CodeRecord, CodeStore, InsertOutcome};

/// In-memory implementation of CodeStore.
///
/// Uses DashMap keyed by canonical code for thread-safe concurrent
/// access. The entry API stands in for the unique constraint on insert,
/// and `get_mut` (which holds the shard lock for the duration of the
/// mutation) stands in for the conditional update, so the same race
/// outcomes as the database backends apply: concurrent inserts of one
/// code admit exactly one writer, and concurrent redemptions of one code
/// admit exactly one redeemer.
#[derive(Debug, Default)]
pub struct MemoryCodeStore {
    codes: DashMap<String, CodeRecord>,
}

impl MemoryCodeStore {
    /// Creates a new in-memory code store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory code store wrapped in Arc.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Total number of rows, including used and soft-deleted ones.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the store holds no rows at all.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

#[async_trait]
impl CodeStore for MemoryCodeStore {
    async fn exists_many(&self, codes: &[String]) -> StorageResult<HashSet<String>> {
        Ok(codes
            .iter()
            .filter(|c| self.codes.contains_key(c.as_str()))
            .cloned()
            .collect())
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn insert_many(&self, rows: Vec<CodeRecord>) -> StorageResult<InsertOutcome> {
        use dashmap::mapref::entry::Entry;

        let mut outcome = InsertOutcome::default();
        for row in rows {
            // Entry API makes the check-and-insert atomic per key,
            // matching the unique-constraint semantics of the DB backends.
            match self.codes.entry(row.code.clone()) {
                Entry::Occupied(_) => outcome.skipped.push(row.code),
                Entry::Vacant(entry) => {
                    entry.insert(row);
                    outcome.inserted += 1;
                }
            }
        }
        Ok(outcome)
    }

    #[instrument(skip(self))]
    async fn atomic_redeem(
        &self,
        code: &str,
        user_id: &str,
    ) -> StorageResult<Option<CodeRecord>> {
        // get_mut holds the shard lock, so check and mutation are one
        // indivisible step.
        let Some(mut entry) = self.codes.get_mut(code) else {
            return Ok(None);
        };
        if entry.is_deleted || entry.used_by.is_some() {
            return Ok(None);
        }
        entry.used_by = Some(user_id.to_string());
        entry.updated_at = chrono::Utc::now();
        Ok(Some(entry.clone()))
    }

    async fn get_code(&self, code: &str) -> StorageResult<Option<CodeRecord>> {
        Ok(self.codes.get(code).map(|r| r.value().clone()))
    }

    async fn soft_delete(&self, code: &str) -> StorageResult<bool> {
        let Some(mut entry) = self.codes.get_mut(code) else {
            return Ok(false);
        };
        if entry.is_deleted {
            return Ok(false);
        }
        entry.is_deleted = true;
        entry.updated_at = chrono::Utc::now();
        Ok(true)
    }

    async fn count_batch(&self, batch: i64) -> StorageResult<u64> {
        Ok(self.codes.iter().filter(|r| r.batch == batch).count() as u64)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        Ok(HealthStatus {
            healthy: true,
            latency: std::time::Duration::ZERO,
            message: Some("in-memory storage".to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(codes: &[&str], batch: i64) -> Vec<CodeRecord> {
        codes.iter().map(|c| CodeRecord::new(*c, batch)).collect()
    }

    #[tokio::test]
    async fn insert_many_skips_duplicates_within_batch() {
        let store = MemoryCodeStore::new();
        let outcome = store
            .insert_many(rows(&["111111", "222222", "111111"], 1))
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 2);
        assert_eq!(outcome.skipped, vec!["111111".to_string()]);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn insert_many_skips_preexisting_rows() {
        let store = MemoryCodeStore::new();
        store.insert_many(rows(&["111111"], 1)).await.unwrap();

        let outcome = store
            .insert_many(rows(&["111111", "333333"], 2))
            .await
            .unwrap();
        assert_eq!(outcome.inserted, 1);
        assert_eq!(outcome.skipped, vec!["111111".to_string()]);

        // The original row keeps its batch tag.
        let kept = store.get_code("111111").await.unwrap().unwrap();
        assert_eq!(kept.batch, 1);
    }

    #[tokio::test]
    async fn exists_many_sees_all_states() {
        let store = MemoryCodeStore::new();
        store
            .insert_many(rows(&["111111", "222222", "333333"], 1))
            .await
            .unwrap();
        store.atomic_redeem("111111", "user-a").await.unwrap();
        store.soft_delete("222222").await.unwrap();

        let existing = store
            .exists_many(&[
                "111111".to_string(),
                "222222".to_string(),
                "333333".to_string(),
                "444444".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(existing.len(), 3);
        assert!(!existing.contains("444444"));
    }

    #[tokio::test]
    async fn atomic_redeem_consumes_once() {
        let store = MemoryCodeStore::new();
        store.insert_many(rows(&["654321"], 1)).await.unwrap();

        let first = store.atomic_redeem("654321", "user-a").await.unwrap();
        assert_eq!(first.unwrap().used_by.as_deref(), Some("user-a"));

        // Second attempt loses, even for the same user.
        let again = store.atomic_redeem("654321", "user-a").await.unwrap();
        assert!(again.is_none());
        let other = store.atomic_redeem("654321", "user-b").await.unwrap();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn atomic_redeem_refuses_deleted_codes() {
        let store = MemoryCodeStore::new();
        store.insert_many(rows(&["654321"], 1)).await.unwrap();
        assert!(store.soft_delete("654321").await.unwrap());

        let result = store.atomic_redeem("654321", "user-a").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn soft_delete_is_one_way_and_idempotent_on_report() {
        let store = MemoryCodeStore::new();
        store.insert_many(rows(&["654321"], 1)).await.unwrap();

        assert!(store.soft_delete("654321").await.unwrap());
        assert!(!store.soft_delete("654321").await.unwrap());
        assert!(!store.soft_delete("missing").await.unwrap());
    }

    #[tokio::test]
    async fn count_batch_counts_only_that_batch() {
        let store = MemoryCodeStore::new();
        store
            .insert_many(rows(&["111111", "222222"], 7))
            .await
            .unwrap();
        store.insert_many(rows(&["333333"], 8)).await.unwrap();

        assert_eq!(store.count_batch(7).await.unwrap(), 2);
        assert_eq!(store.count_batch(8).await.unwrap(), 1);
        assert_eq!(store.count_batch(9).await.unwrap(), 0);
    }
}
