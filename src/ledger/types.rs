//! Ledger-facing types and error definitions.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

// LedgerConfig lives with the rest of the config schema
pub use crate::config::schema::LedgerConfig;

/// Result codes reported by the ledger in the `sdk` codespace.
pub mod codes {
    /// Accepted into the mempool.
    pub const SUCCESS: u32 = 0;
    /// Signature does not verify (usually a stale sequence in the sign bytes).
    pub const UNAUTHORIZED: u32 = 4;
    /// The exact tx is already in the mempool cache.
    pub const TX_IN_MEMPOOL_CACHE: u32 = 19;
    /// Mempool has no room.
    pub const MEMPOOL_IS_FULL: u32 = 20;
    /// Sequence in the tx does not match the account's next sequence.
    pub const WRONG_SEQUENCE: u32 = 32;

    /// Codespace the codes above belong to.
    pub const SDK_CODESPACE: &str = "sdk";
}

/// Account state as observed on the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Account number, fixed for the lifetime of the account.
    pub account_number: u64,
    /// Next sequence the ledger will accept for this account.
    pub sequence: u64,
}

/// Result of a sync-mode broadcast (mempool admission only).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastResult {
    #[serde(default, deserialize_with = "de_u32")]
    pub code: u32,
    #[serde(default)]
    pub codespace: String,
    #[serde(default, rename = "txhash")]
    pub tx_hash: String,
    #[serde(default)]
    pub raw_log: String,
}

impl BroadcastResult {
    /// True when `code` should be read as one of the [`codes`] constants.
    pub fn is_sdk_code(&self) -> bool {
        self.codespace.is_empty() || self.codespace == codes::SDK_CODESPACE
    }
}

/// A transaction that has been included in a block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    #[serde(default, deserialize_with = "de_u64")]
    pub height: u64,
    #[serde(default, rename = "txhash")]
    pub tx_hash: String,
    #[serde(default, deserialize_with = "de_u32")]
    pub code: u32,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default, deserialize_with = "de_u64")]
    pub gas_wanted: u64,
    #[serde(default, deserialize_with = "de_u64")]
    pub gas_used: u64,
}

/// Errors that can occur talking to the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Node could not be reached or answered with a server error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request exceeded its deadline.
    #[error("ledger request timed out after {0} seconds")]
    Timeout(u64),

    /// Ledger refused the tx before it reached the mempool.
    #[error("tx rejected by pre-check: {0}")]
    PreCheck(String),

    /// Response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Account has never been seen by the ledger.
    #[error("account {0} not found")]
    AccountNotFound(String),

    #[error("tx hash is empty")]
    EmptyTxHash,

    /// Tx was not committed before the deadline.
    #[error("timed out waiting for tx to be committed to block")]
    CommitTimeout,

    /// Tx committed but execution failed.
    #[error("tx committed but returned nonzero code {code}: {raw_log}")]
    UnsuccessfulTx { code: u32, raw_log: String },
}

impl LedgerError {
    /// Pre-check rejections are final; everything else is worth retrying.
    pub fn is_pre_check(&self) -> bool {
        matches!(self, LedgerError::PreCheck(_))
    }
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Accepts integers encoded either as JSON numbers or as decimal strings.
pub(crate) fn parse_u64(value: &serde_json::Value) -> Option<u64> {
    match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(0);
    }
    parse_u64(&value).ok_or_else(|| serde::de::Error::custom(format!("invalid integer {}", value)))
}

fn de_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = de_u64(deserializer)?;
    u32::try_from(value).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_result_from_gateway_json() {
        let json = r#"{"height":"0","txhash":"ABC","codespace":"sdk","code":32,"raw_log":"account sequence mismatch"}"#;
        let result: BroadcastResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.code, codes::WRONG_SEQUENCE);
        assert_eq!(result.tx_hash, "ABC");
        assert!(result.is_sdk_code());
    }

    #[test]
    fn test_module_codespace_is_not_sdk() {
        let result = BroadcastResult {
            code: 4,
            codespace: "cdp".to_string(),
            ..Default::default()
        };
        assert!(!result.is_sdk_code());
    }

    #[test]
    fn test_tx_result_string_integers() {
        let json = r#"{"height":"1200","txhash":"FF","code":0,"gas_wanted":"200000","gas_used":"81234"}"#;
        let result: TxResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.height, 1200);
        assert_eq!(result.gas_used, 81234);
    }

    #[test]
    fn test_error_display() {
        let err = LedgerError::Timeout(10);
        assert_eq!(err.to_string(), "ledger request timed out after 10 seconds");

        let err = LedgerError::UnsuccessfulTx {
            code: 5,
            raw_log: "insufficient funds".to_string(),
        };
        assert!(err.to_string().contains("insufficient funds"));
        assert!(!err.is_pre_check());
        assert!(LedgerError::PreCheck("too large".into()).is_pre_check());
    }
}
