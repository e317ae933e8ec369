//! Transaction envelope, sign doc construction and commit monitoring.
//!
//! # Responsibilities
//! - Build unsigned transactions from messages, gas and fee
//! - Produce the canonical sign doc for a given account number and sequence
//! - Encode/decode the signed envelope broadcast to the ledger
//! - Wait for a broadcast tx to be committed to a block

use alloy::primitives::{keccak256, B256};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::ledger::client::TxLookup;
use crate::ledger::types::{LedgerError, LedgerResult, TxResult};

/// A single ledger message, addressed by its type URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerMsg {
    #[serde(rename = "@type")]
    pub type_url: String,
    #[serde(flatten)]
    pub value: serde_json::Map<String, serde_json::Value>,
}

impl LedgerMsg {
    /// Build a message from a type URL and a JSON object body.
    ///
    /// Non-object values are stored under a `value` key.
    pub fn new(type_url: impl Into<String>, value: serde_json::Value) -> Self {
        let value = match value {
            serde_json::Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Self {
            type_url: type_url.into(),
            value,
        }
    }
}

/// An amount of a single denomination. Amounts are decimal strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount: amount.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxBody {
    pub messages: Vec<LedgerMsg>,
    #[serde(default)]
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
}

/// Fee and signer metadata covered by the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub fee: Fee,
    pub sequence: u64,
}

/// Everything except the signer-specific fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsignedTx {
    pub body: TxBody,
    pub fee: Fee,
}

impl UnsignedTx {
    pub fn new(messages: Vec<LedgerMsg>, gas_limit: u64, fee_amount: Vec<Coin>, memo: Option<String>) -> Self {
        Self {
            body: TxBody {
                messages,
                memo: memo.unwrap_or_default(),
            },
            fee: Fee {
                amount: fee_amount,
                gas_limit,
            },
        }
    }
}

/// Chain and account context the signature commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerData {
    pub chain_id: String,
    pub account_number: u64,
    pub sequence: u64,
}

#[derive(Serialize)]
struct SignDoc<'a> {
    body: &'a TxBody,
    auth_info: &'a AuthInfo,
    chain_id: &'a str,
    account_number: u64,
}

/// Digest that gets signed for `tx` under `signer_data`.
pub fn sign_doc_hash(tx: &UnsignedTx, signer_data: &SignerData) -> LedgerResult<B256> {
    let auth_info = AuthInfo {
        fee: tx.fee.clone(),
        sequence: signer_data.sequence,
    };
    let doc = SignDoc {
        body: &tx.body,
        auth_info: &auth_info,
        chain_id: &signer_data.chain_id,
        account_number: signer_data.account_number,
    };
    let bytes = serde_json::to_vec(&doc).map_err(|e| LedgerError::Decode(e.to_string()))?;
    Ok(keccak256(bytes))
}

/// A signed transaction envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedTx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    /// Hex-encoded 65-byte recoverable signature.
    pub signature: String,
}

impl SignedTx {
    /// Sequence this tx was signed for.
    pub fn sequence(&self) -> u64 {
        self.auth_info.sequence
    }

    /// Bytes handed to the ledger.
    pub fn encode(&self) -> LedgerResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| LedgerError::Decode(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> LedgerResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| LedgerError::Decode(e.to_string()))
    }
}

/// Poll `lookup` until `tx_hash` is committed or `deadline` elapses.
///
/// Returns immediately when the hash is empty. A committed tx with a nonzero
/// code is reported as [`LedgerError::UnsuccessfulTx`].
pub async fn wait_for_tx_commit<L: TxLookup + ?Sized>(
    lookup: &L,
    tx_hash: &str,
    deadline: Duration,
    poll_interval: Duration,
) -> LedgerResult<TxResult> {
    if tx_hash.is_empty() {
        return Err(LedgerError::EmptyTxHash);
    }

    let result = timeout(deadline, async {
        loop {
            match lookup.get_tx(tx_hash).await? {
                Some(tx) => return Ok::<_, LedgerError>(tx),
                None => {
                    tracing::debug!(tx_hash = %tx_hash, "Transaction not yet committed");
                    sleep(poll_interval).await;
                }
            }
        }
    })
    .await;

    let tx: TxResult = match result {
        Ok(found) => found?,
        Err(_) => return Err(LedgerError::CommitTimeout),
    };

    if tx.code != 0 {
        return Err(LedgerError::UnsuccessfulTx {
            code: tx.code,
            raw_log: tx.raw_log,
        });
    }
    Ok(tx)
}
