//! rsgate-domain: Access-code domain logic
//!
//! This crate contains the access-code subsystem's core logic:
//! - Canonical code form (trim, upper-case, length check)
//! - Generator producing store-wide-unique codes from a CSPRNG
//! - Batch importer with idempotent, duplicate-tolerant semantics
//! - Redemption engine with exactly-once consumption
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                rsgate-domain                 │
//! ├─────────────────────────────────────────────┤
//! │  code.rs      - Canonicalizer               │
//! │  generator.rs - Unique code generation      │
//! │  importer.rs  - Idempotent batch import     │
//! │  redeem.rs    - Exactly-once redemption     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! Generator, importer and redemption engine never coordinate with each
//! other; each relies only on the store's unique constraint and atomic
//! conditional update (see `rsgate-storage`). The store handle is
//! constructed once at process start and injected as `Arc<S>`.

pub mod code;
pub mod error;
pub mod generator;
pub mod importer;
pub mod redeem;

// Re-export commonly used types at the crate root
pub use code::{canonicalize, DEFAULT_CODE_LENGTH, DIGIT_ALPHABET};
pub use error::{AccessError, AccessResult};
pub use generator::{CodeGenerator, GeneratorConfig};
pub use importer::{BatchImporter, ImportSummary};
pub use redeem::RedemptionEngine;
