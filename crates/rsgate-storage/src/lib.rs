//! rsgate-storage: Storage abstraction layer
//!
//! This crate provides the storage abstraction for rsgate, including:
//! - CodeStore trait for access-code operations
//! - In-memory implementation for testing
//! - PostgreSQL implementation for production
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rsgate-storage                 │
//! ├─────────────────────────────────────────────┤
//! │  traits.rs   - CodeStore trait definition   │
//! │  memory.rs   - In-memory implementation     │
//! │  postgres.rs - PostgreSQL implementation    │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Both uniqueness of codes and exactly-once redemption are enforced by
//! the store itself (unique constraint, atomic conditional update), not
//! by application logic; see the `CodeStore` docs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

// Re-export commonly used types
pub use error::{HealthStatus, StorageError, StorageResult};
pub use memory::MemoryCodeStore;
pub use postgres::{PostgresCodeStore, PostgresConfig};
pub use traits::{CodeRecord, CodeStore, InsertOutcome};
