//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → SequencerConfig (validated, immutable)
//!     → handed by value to the ledger client and pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; the in-flight window size cannot change at runtime
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::LedgerConfig;
pub use schema::LogFormat;
pub use schema::ObservabilityConfig;
pub use schema::PipelineConfig;
pub use schema::SequencerConfig;
