//! Values that flow through the pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::ledger::{BroadcastResult, Coin, LedgerMsg, SignedTx, UnsignedTx};

/// A caller's unit of work. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub messages: Vec<LedgerMsg>,
    pub gas_limit: u64,
    #[serde(default)]
    pub fee_amount: Vec<Coin>,
    #[serde(default)]
    pub memo: Option<String>,
    /// Opaque correlation payload, returned untouched in the [`Response`].
    #[serde(default)]
    pub data: serde_json::Value,
}

impl Request {
    pub fn new(messages: Vec<LedgerMsg>, gas_limit: u64) -> Self {
        Self {
            messages,
            gas_limit,
            fee_amount: Vec::new(),
            memo: None,
            data: serde_json::Value::Null,
        }
    }

    pub fn with_fee(mut self, fee_amount: Vec<Coin>) -> Self {
        self.fee_amount = fee_amount;
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    /// The unsigned transaction this request describes.
    pub fn to_unsigned_tx(&self) -> UnsignedTx {
        UnsignedTx::new(
            self.messages.clone(),
            self.gas_limit,
            self.fee_amount.clone(),
            self.memo.clone(),
        )
    }
}

/// Terminal errors reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("signing failed: {0}")]
    Signing(String),

    #[error("tx rejected by pre-check: {0}")]
    PreCheck(String),

    #[error("broadcast failed with code {code} in codespace '{codespace}': {raw_log}")]
    Unrecoverable {
        code: u32,
        codespace: String,
        raw_log: String,
    },

    #[error("sequence {sequence} still contended after {resets} resets")]
    SequenceContention { sequence: u64, resets: u32 },

    #[error("pipeline is closed")]
    Closed,
}

/// One signing and broadcast attempt for a specific sequence.
#[derive(Debug, Clone)]
pub struct SignedAttempt {
    pub sequence: u64,
    pub request: Request,
    pub tx: SignedTx,
    pub tx_bytes: Vec<u8>,
    /// Result of the most recent broadcast.
    pub result: Option<BroadcastResult>,
    pub error: Option<PipelineError>,
}

impl SignedAttempt {
    pub fn new(sequence: u64, request: Request, tx: SignedTx, tx_bytes: Vec<u8>) -> Self {
        Self {
            sequence,
            request,
            tx,
            tx_bytes,
            result: None,
            error: None,
        }
    }

    pub fn into_response(self) -> Response {
        Response {
            sequence: self.sequence,
            request: self.request,
            tx: Some(self.tx),
            tx_bytes: self.tx_bytes,
            result: self.result,
            error: self.error,
        }
    }
}

/// Terminal result for one accepted request.
#[derive(Debug, Clone)]
pub struct Response {
    /// Sequence the request was assigned (or would have been).
    pub sequence: u64,
    pub request: Request,
    pub tx: Option<SignedTx>,
    pub tx_bytes: Vec<u8>,
    /// Ledger answer to the last broadcast. Execution results live here,
    /// not in `error`.
    pub result: Option<BroadcastResult>,
    pub error: Option<PipelineError>,
}

impl Response {
    /// A response for a request that never made it into the mempool.
    pub fn failed(sequence: u64, request: Request, error: PipelineError) -> Self {
        Self {
            sequence,
            request,
            tx: None,
            tx_bytes: Vec::new(),
            result: None,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Hash reported by the ledger, empty when the tx was never broadcast.
    pub fn tx_hash(&self) -> &str {
        self.result.as_ref().map_or("", |r| r.tx_hash.as_str())
    }
}

/// A request travelling to the sequencer together with its acceptance ack.
#[derive(Debug)]
pub struct Submission {
    pub request: Request,
    pub accepted: oneshot::Sender<()>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_from_json_defaults() {
        let request: Request = serde_json::from_value(json!({
            "messages": [{"@type": "/cosmos.bank.v1beta1.MsgSend", "amount": []}],
            "gas_limit": 200000
        }))
        .unwrap();
        assert_eq!(request.gas_limit, 200_000);
        assert!(request.fee_amount.is_empty());
        assert_eq!(request.memo, None);
        assert!(request.data.is_null());
    }

    #[test]
    fn test_unsigned_tx_carries_request_fields() {
        let request = Request::new(vec![LedgerMsg::new("/test.Msg", json!({"n": 1}))], 50)
            .with_fee(vec![Coin::new("ukava", 10)])
            .with_memo("hello");
        let tx = request.to_unsigned_tx();
        assert_eq!(tx.fee.gas_limit, 50);
        assert_eq!(tx.fee.amount, vec![Coin::new("ukava", 10)]);
        assert_eq!(tx.body.memo, "hello");
        assert_eq!(tx.body.messages.len(), 1);
    }

    #[test]
    fn test_failed_response() {
        let response = Response::failed(7, Request::new(Vec::new(), 1), PipelineError::Closed);
        assert!(!response.is_ok());
        assert_eq!(response.sequence, 7);
        assert_eq!(response.tx_hash(), "");
    }
}
