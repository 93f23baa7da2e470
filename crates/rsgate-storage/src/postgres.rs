//! PostgreSQL storage implementation.
//!
//! Concurrency control is delegated entirely to the database: the
//! primary key on `code` arbitrates concurrent inserts, and redemption
//! is a single conditional `UPDATE ... RETURNING`, so no transaction or
//! application-level locking is needed.

use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::{debug, instrument};

use crate::error::{HealthStatus, StorageError, StorageResult};
use crate::traits::{CodeRecord, CodeStore, InsertOutcome};

/// Default health check timeout in seconds.
/// Shorter than regular queries since probes should answer fast.
const DEFAULT_HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// PostgreSQL configuration options.
#[derive(Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    pub min_connections: u32,
    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,
}

// Custom Debug implementation to hide credentials in database_url
impl std::fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .finish()
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/rsgate".to_string(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout_secs: 30,
        }
    }
}

/// Parse a database row into a CodeRecord.
fn row_to_code_record(row: &PgRow) -> CodeRecord {
    CodeRecord {
        code: row.get("code"),
        batch: row.get("batch"),
        is_deleted: row.get("is_deleted"),
        used_by: row.get("used_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// PostgreSQL implementation of CodeStore.
pub struct PostgresCodeStore {
    pool: PgPool,
    health_check_timeout: std::time::Duration,
}

impl PostgresCodeStore {
    /// Creates a new PostgreSQL code store from a connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            health_check_timeout: std::time::Duration::from_secs(
                DEFAULT_HEALTH_CHECK_TIMEOUT_SECS,
            ),
        }
    }

    /// Creates a new PostgreSQL code store with the given configuration.
    #[instrument(skip(config))]
    pub async fn from_config(config: &PostgresConfig) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(|e| StorageError::ConnectionError {
                message: e.to_string(),
            })?;

        Ok(Self::new(pool))
    }

    /// Creates a new PostgreSQL code store from a database URL.
    pub async fn from_url(database_url: &str) -> StorageResult<Self> {
        let config = PostgresConfig {
            database_url: database_url.to_string(),
            ..Default::default()
        };
        Self::from_config(&config).await
    }

    /// Creates the schema if it does not exist.
    ///
    /// The primary key on `code` is the uniqueness guarantee every
    /// writer relies on; rows are never dropped, only soft-deleted.
    pub async fn run_migrations(&self) -> StorageResult<()> {
        debug!("Running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS access_codes (
                code VARCHAR(64) PRIMARY KEY,
                batch BIGINT NOT NULL,
                is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
                used_by VARCHAR(255),
                created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError {
            message: format!("Failed to create access_codes table: {e}"),
        })?;

        // Batch counts and per-batch listings are a common admin query.
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_access_codes_batch ON access_codes (batch)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError {
            message: format!("Failed to create batch index: {e}"),
        })?;

        Ok(())
    }
}

#[async_trait]
impl CodeStore for PostgresCodeStore {
    async fn exists_many(&self, codes: &[String]) -> StorageResult<HashSet<String>> {
        if codes.is_empty() {
            return Ok(HashSet::new());
        }

        let rows = sqlx::query("SELECT code FROM access_codes WHERE code = ANY($1)")
            .bind(codes)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::QueryError {
                message: format!("Failed to check existing codes: {e}"),
            })?;

        Ok(rows.iter().map(|r| r.get("code")).collect())
    }

    #[instrument(skip(self, rows), fields(rows = rows.len()))]
    async fn insert_many(&self, rows: Vec<CodeRecord>) -> StorageResult<InsertOutcome> {
        if rows.is_empty() {
            return Ok(InsertOutcome::default());
        }

        let codes: Vec<&str> = rows.iter().map(|r| r.code.as_str()).collect();
        let batches: Vec<i64> = rows.iter().map(|r| r.batch).collect();

        // Single UNNEST batch insert; the primary key arbitrates races
        // with concurrent writers and DO NOTHING keeps them non-fatal.
        // RETURNING tells us which rows actually landed.
        let inserted_rows = sqlx::query(
            r#"
            INSERT INTO access_codes (code, batch)
            SELECT code, batch
            FROM UNNEST($1::text[], $2::bigint[]) AS t(code, batch)
            ON CONFLICT (code) DO NOTHING
            RETURNING code
            "#,
        )
        .bind(&codes)
        .bind(&batches)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError {
            message: format!("Failed to batch insert codes: {e}"),
        })?;

        let inserted: HashSet<String> = inserted_rows.iter().map(|r| r.get("code")).collect();
        let skipped: Vec<String> = rows
            .iter()
            .filter(|r| !inserted.contains(&r.code))
            .map(|r| r.code.clone())
            .collect();

        Ok(InsertOutcome {
            inserted: inserted.len() as u64,
            skipped,
        })
    }

    #[instrument(skip(self))]
    async fn atomic_redeem(
        &self,
        code: &str,
        user_id: &str,
    ) -> StorageResult<Option<CodeRecord>> {
        // One conditional UPDATE; the row lock taken by the update makes
        // concurrent redemptions of the same code serialize, and only
        // the first matches the WHERE clause.
        let row = sqlx::query(
            r#"
            UPDATE access_codes
            SET used_by = $2, updated_at = NOW()
            WHERE code = $1 AND used_by IS NULL AND is_deleted = FALSE
            RETURNING code, batch, is_deleted, used_by, created_at, updated_at
            "#,
        )
        .bind(code)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError {
            message: format!("Failed to redeem code: {e}"),
        })?;

        Ok(row.as_ref().map(row_to_code_record))
    }

    async fn get_code(&self, code: &str) -> StorageResult<Option<CodeRecord>> {
        let row = sqlx::query(
            r#"
            SELECT code, batch, is_deleted, used_by, created_at, updated_at
            FROM access_codes
            WHERE code = $1
            "#,
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError {
            message: format!("Failed to look up code: {e}"),
        })?;

        Ok(row.as_ref().map(row_to_code_record))
    }

    async fn soft_delete(&self, code: &str) -> StorageResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE access_codes
            SET is_deleted = TRUE, updated_at = NOW()
            WHERE code = $1 AND is_deleted = FALSE
            "#,
        )
        .bind(code)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::QueryError {
            message: format!("Failed to soft-delete code: {e}"),
        })?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_batch(&self, batch: i64) -> StorageResult<u64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM access_codes WHERE batch = $1")
            .bind(batch)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StorageError::QueryError {
                message: format!("Failed to count batch: {e}"),
            })?;

        let n: i64 = row.get("n");
        Ok(n as u64)
    }

    async fn health_check(&self) -> StorageResult<HealthStatus> {
        let start = std::time::Instant::now();

        let probe = tokio::time::timeout(
            self.health_check_timeout,
            sqlx::query("SELECT 1").execute(&self.pool),
        )
        .await;

        match probe {
            Ok(Ok(_)) => Ok(HealthStatus {
                healthy: true,
                latency: start.elapsed(),
                message: Some("postgresql".to_string()),
            }),
            Ok(Err(e)) => Ok(HealthStatus {
                healthy: false,
                latency: start.elapsed(),
                message: Some(e.to_string()),
            }),
            Err(_) => Ok(HealthStatus {
                healthy: false,
                latency: start.elapsed(),
                message: Some(format!(
                    "health check timed out after {:?}",
                    self.health_check_timeout
                )),
            }),
        }
    }
}
