//! rsgate-server: Configuration and CLI wiring
//!
//! This crate contains the operational layer around the access-code
//! subsystem:
//! - Configuration management (defaults, YAML file, env overrides)
//! - Logging initialization
//! - The `rsgate` binary with administrative and redemption commands
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │               rsgate-server                  │
//! ├─────────────────────────────────────────────┤
//! │  config.rs   - Configuration management     │
//! │  logging.rs  - tracing-subscriber setup     │
//! │  main.rs     - rsgate CLI binary            │
//! └─────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod logging;

// Re-exports for convenience
pub use config::{ConfigLoadError, GateConfig};
pub use logging::{init_logging, LoggingConfig};
