//! Redemption: the single-writer transition from unused to used.

use std::sync::Arc;

use tracing::instrument;

use rsgate_storage::{CodeRecord, CodeStore};

use crate::code::{canonicalize, DEFAULT_CODE_LENGTH};
use crate::error::{AccessError, AccessResult};

/// Consumes codes exactly once on behalf of the storefront.
///
/// The authoritative decision is the store's atomic conditional update;
/// everything else here is input normalization and error-message
/// quality.
pub struct RedemptionEngine<S> {
    store: Arc<S>,
    code_length: usize,
}

impl<S: CodeStore> RedemptionEngine<S> {
    /// Creates an engine expecting the default code length.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_length(store, DEFAULT_CODE_LENGTH)
    }

    /// Creates an engine expecting codes of `code_length` characters.
    pub fn with_length(store: Arc<S>, code_length: usize) -> Self {
        Self { store, code_length }
    }

    /// Redeems `raw_code` for `user_id`, returning the updated row.
    ///
    /// A code maps to exactly one grant: redeeming an already-used code
    /// again is `AlreadyUsed` even for the user who originally redeemed
    /// it.
    #[instrument(skip(self, raw_code))]
    pub async fn redeem(&self, raw_code: &str, user_id: &str) -> AccessResult<CodeRecord> {
        if user_id.trim().is_empty() {
            return Err(AccessError::InvalidInput {
                message: "user id must not be empty".to_string(),
            });
        }
        let code = canonicalize(raw_code, self.code_length)?;

        if let Some(row) = self.store.atomic_redeem(&code, user_id).await? {
            return Ok(row);
        }

        // The atomic update already decided the outcome; this follow-up
        // read only distinguishes NotFound from AlreadyUsed for the
        // caller. A row that looks unused here was consumed or deleted
        // between the two statements, which is still AlreadyUsed.
        match self.store.get_code(&code).await? {
            None => Err(AccessError::NotFound { code }),
            Some(_) => Err(AccessError::AlreadyUsed { code }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use rsgate_storage::MemoryCodeStore;

    async fn engine_with_code(code: &str) -> (Arc<MemoryCodeStore>, RedemptionEngine<MemoryCodeStore>) {
        let store = MemoryCodeStore::new_shared();
        store
            .insert_many(vec![CodeRecord::new(code, 1)])
            .await
            .unwrap();
        let engine = RedemptionEngine::new(Arc::clone(&store));
        (store, engine)
    }

    #[tokio::test]
    async fn redeems_an_unused_code_once() {
        let (store, engine) = engine_with_code("AB12CD").await;

        let row = engine.redeem("  ab12cd ", "user-a").await.unwrap();
        assert_eq!(row.code, "AB12CD");
        assert_eq!(row.used_by.as_deref(), Some("user-a"));

        let stored = store.get_code("AB12CD").await.unwrap().unwrap();
        assert_eq!(stored.used_by.as_deref(), Some("user-a"));
    }

    #[tokio::test]
    async fn second_redemption_is_already_used_even_for_same_user() {
        let (_store, engine) = engine_with_code("AB12CD").await;
        engine.redeem("AB12CD", "user-a").await.unwrap();

        let err = engine.redeem("AB12CD", "user-a").await.unwrap_err();
        assert!(matches!(err, AccessError::AlreadyUsed { .. }));

        let err = engine.redeem("AB12CD", "user-b").await.unwrap_err();
        assert!(matches!(err, AccessError::AlreadyUsed { .. }));
    }

    #[tokio::test]
    async fn unknown_code_is_not_found() {
        let (_store, engine) = engine_with_code("AB12CD").await;
        let err = engine.redeem("ZZZZZZ", "user-a").await.unwrap_err();
        assert!(matches!(err, AccessError::NotFound { .. }));
    }

    #[tokio::test]
    async fn deleted_code_is_already_used_never_success() {
        let (store, engine) = engine_with_code("AB12CD").await;
        store.soft_delete("AB12CD").await.unwrap();

        let err = engine.redeem("AB12CD", "user-a").await.unwrap_err();
        assert!(matches!(err, AccessError::AlreadyUsed { .. }));
    }

    #[tokio::test]
    async fn malformed_input_is_invalid() {
        let (_store, engine) = engine_with_code("AB12CD").await;

        let err = engine.redeem("", "user-a").await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidInput { .. }));

        let err = engine.redeem("AB12CD", "   ").await.unwrap_err();
        assert!(matches!(err, AccessError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn concurrent_redemptions_admit_exactly_one_winner() {
        let (store, engine) = engine_with_code("AB12CD").await;
        let engine = Arc::new(engine);

        let handles: Vec<_> = ["user-a", "user-b"]
            .into_iter()
            .map(|user| {
                let engine = Arc::clone(&engine);
                tokio::spawn(async move { engine.redeem("AB12CD", user).await })
            })
            .collect();

        let results: Vec<_> = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
            .collect();

        let winners: Vec<_> = results.iter().filter(|r| r.is_ok()).collect();
        assert_eq!(winners.len(), 1);
        for result in &results {
            if let Err(e) = result {
                assert!(matches!(e, AccessError::AlreadyUsed { .. }));
            }
        }

        // used_by holds exactly one of the two contenders.
        let row = store.get_code("AB12CD").await.unwrap().unwrap();
        let used_by = row.used_by.as_deref().unwrap();
        assert!(used_by == "user-a" || used_by == "user-b");
    }
}
