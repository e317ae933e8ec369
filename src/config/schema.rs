//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the sequencer.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SequencerConfig {
    /// Ledger node connection settings.
    pub ledger: LedgerConfig,

    /// Sequencing pipeline settings.
    pub sequencer: PipelineConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Ledger node connection settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// REST gateway base URL.
    pub rest_url: String,

    /// Failover REST gateway URLs, tried in order.
    pub failover_urls: Vec<String>,

    /// Chain ID the signatures commit to.
    pub chain_id: String,

    /// Deadline for a single ledger request in seconds.
    pub request_timeout_secs: u64,

    /// Poll interval while waiting for a tx to be committed.
    pub commit_poll_interval_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rest_url: "http://localhost:1317".to_string(),
            failover_urls: Vec::new(),
            chain_id: "kavalocalnet_8888-1".to_string(),
            request_timeout_secs: 10,
            commit_poll_interval_ms: 100,
        }
    }
}

/// Sequencing pipeline settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Account to poll. Defaults to the signer's address.
    pub account_address: Option<String>,

    /// Maximum signed-but-unconfirmed txs, including the one being sent.
    pub inflight_limit: u64,

    /// Account state poll interval in milliseconds.
    pub poll_interval_ms: u64,

    /// Responses buffered before the sequencer waits on the caller.
    pub response_buffer: usize,

    /// Sequence resets tolerated for one request before it fails (0 = unlimited).
    pub max_sequence_resets: u32,

    /// Base delay after a sequence reset in milliseconds.
    pub reset_backoff_base_ms: u64,

    /// Maximum delay after repeated sequence resets in milliseconds.
    pub reset_backoff_max_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            account_address: None,
            inflight_limit: 100,
            poll_interval_ms: 1000,
            response_buffer: 1,
            max_sequence_resets: 10,
            reset_backoff_base_ms: 500,
            reset_backoff_max_ms: 30_000,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
