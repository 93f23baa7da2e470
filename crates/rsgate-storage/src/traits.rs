//! CodeStore trait definition.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::{HealthStatus, StorageResult};

/// A stored access code.
///
/// Rows are never physically deleted; `is_deleted` marks a code
/// permanently inert while keeping it in the audit trail, and `used_by`
/// is set exactly once, on successful redemption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRecord {
    /// Canonical code value, globally unique across all rows.
    pub code: String,
    /// Generation/import batch that created the code.
    pub batch: i64,
    /// Soft-delete flag; deleted codes are never redeemable.
    pub is_deleted: bool,
    /// User that redeemed the code, if any.
    pub used_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CodeRecord {
    /// Builds a fresh, unused record for insertion.
    pub fn new(code: impl Into<String>, batch: i64) -> Self {
        let now = Utc::now();
        Self {
            code: code.into(),
            batch,
            is_deleted: false,
            used_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Result of a bulk insert.
#[derive(Debug, Clone, Default)]
pub struct InsertOutcome {
    /// Number of rows actually written.
    pub inserted: u64,
    /// Codes rejected by the unique constraint (already present).
    pub skipped: Vec<String>,
}

/// Abstract storage interface for access codes.
///
/// Implementations must be thread-safe (Send + Sync) and must enforce
/// uniqueness of `code` natively: concurrent writers race on the store's
/// own constraint, never on application-level checks. `atomic_redeem` is
/// likewise a single indivisible conditional update, never a
/// read-then-write pair.
#[async_trait]
pub trait CodeStore: Send + Sync + 'static {
    /// Returns the subset of `codes` already present, in any state
    /// (unused, used, or soft-deleted).
    async fn exists_many(&self, codes: &[String]) -> StorageResult<HashSet<String>>;

    /// Inserts rows in bulk, unordered and duplicate-tolerant: a per-row
    /// uniqueness violation is collected into the outcome's `skipped`
    /// list, never fatal to the batch.
    async fn insert_many(&self, rows: Vec<CodeRecord>) -> StorageResult<InsertOutcome>;

    /// Atomically consumes an unused, non-deleted code for `user_id`.
    ///
    /// Returns the updated row on success, or `None` if no row matched
    /// the condition (absent, already used, or deleted). This is the
    /// sole correctness mechanism against concurrent redemption.
    async fn atomic_redeem(&self, code: &str, user_id: &str)
        -> StorageResult<Option<CodeRecord>>;

    /// Read-only lookup of a single code, in any state.
    async fn get_code(&self, code: &str) -> StorageResult<Option<CodeRecord>>;

    /// Marks a code deleted. Returns `false` if the code is absent or
    /// already deleted. One-way: deleted codes are never revived.
    async fn soft_delete(&self, code: &str) -> StorageResult<bool>;

    /// Number of rows tagged with `batch`, for audit reporting.
    async fn count_batch(&self, batch: i64) -> StorageResult<u64>;

    /// Probes backend connectivity.
    async fn health_check(&self) -> StorageResult<HealthStatus>;
}
