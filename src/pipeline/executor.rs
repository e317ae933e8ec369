//! Signing, broadcasting and result classification for one sequence slot.
//!
//! # Responsibilities
//! - Turn a [`Request`] into signed bytes for `(account_number, sequence)`
//! - Submit bytes to the ledger and map the answer to a [`BroadcastOutcome`]
//!
//! # Design Decisions
//! - Stateless: all cursor bookkeeping stays in the sequencer
//! - Classification is a pure function so it can be tested without a ledger

use std::sync::Arc;

use crate::ledger::types::codes;
use crate::ledger::{BroadcastResult, LedgerClient, LedgerError, LedgerResult, SignedTx, SignerData, TxSigner};
use crate::observability::metrics;
use crate::pipeline::types::{PipelineError, Request, SignedAttempt};

/// How the sequencer should react to one broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// In the mempool (newly or already).
    Ok,
    /// Terminal for this request.
    Failed(PipelineError),
    /// Try again on the next account state tick.
    Retry,
    /// Cursors have drifted from the ledger.
    ResetSequence,
}

impl BroadcastOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            BroadcastOutcome::Ok => "ok",
            BroadcastOutcome::Failed(_) => "failed",
            BroadcastOutcome::Retry => "retry",
            BroadcastOutcome::ResetSequence => "reset_sequence",
        }
    }
}

/// Map a broadcast answer to an outcome.
pub fn classify(result: &LedgerResult<BroadcastResult>) -> BroadcastOutcome {
    let result = match result {
        Ok(result) => result,
        Err(LedgerError::PreCheck(reason)) => return BroadcastOutcome::Failed(PipelineError::PreCheck(reason.clone())),
        Err(_) => return BroadcastOutcome::Retry,
    };

    if result.code == codes::SUCCESS {
        return BroadcastOutcome::Ok;
    }

    let unrecoverable = || {
        BroadcastOutcome::Failed(PipelineError::Unrecoverable {
            code: result.code,
            codespace: result.codespace.clone(),
            raw_log: result.raw_log.clone(),
        })
    };

    if !result.is_sdk_code() {
        return unrecoverable();
    }

    match result.code {
        codes::TX_IN_MEMPOOL_CACHE => BroadcastOutcome::Ok,
        codes::MEMPOOL_IS_FULL => BroadcastOutcome::Retry,
        codes::UNAUTHORIZED | codes::WRONG_SEQUENCE => BroadcastOutcome::ResetSequence,
        _ => unrecoverable(),
    }
}

/// Signs and broadcasts on behalf of the sequencer.
pub struct BroadcastExecutor {
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn TxSigner>,
    chain_id: String,
}

impl BroadcastExecutor {
    pub fn new(ledger: Arc<dyn LedgerClient>, signer: Arc<dyn TxSigner>, chain_id: impl Into<String>) -> Self {
        Self {
            ledger,
            signer,
            chain_id: chain_id.into(),
        }
    }

    /// Sign `request` for `sequence`. Returns the envelope and its encoded bytes.
    pub fn sign(
        &self,
        request: &Request,
        account_number: u64,
        sequence: u64,
    ) -> Result<(SignedTx, Vec<u8>), PipelineError> {
        let signer_data = SignerData {
            chain_id: self.chain_id.clone(),
            account_number,
            sequence,
        };
        let tx = self
            .signer
            .sign_tx(&request.to_unsigned_tx(), &signer_data)
            .map_err(|e| PipelineError::Signing(e.to_string()))?;
        let bytes = tx.encode().map_err(|e| PipelineError::Signing(e.to_string()))?;
        Ok((tx, bytes))
    }

    /// Broadcast `attempt` and record the answer on it.
    pub async fn broadcast(&self, attempt: &mut SignedAttempt) -> BroadcastOutcome {
        let sequence = attempt.sequence;
        let result = self.ledger.broadcast_tx(&attempt.tx_bytes).await;
        let outcome = classify(&result);
        metrics::record_broadcast_outcome(outcome.label());

        match (&outcome, &result) {
            (BroadcastOutcome::Ok, _) => {
                tracing::debug!(sequence = sequence, "Transaction in mempool");
                attempt.error = None;
            }
            (BroadcastOutcome::Failed(error), _) => {
                tracing::error!(sequence = sequence, error = %error, "Broadcast failed");
                attempt.error = Some(error.clone());
            }
            (BroadcastOutcome::Retry, Err(e)) => {
                tracing::warn!(sequence = sequence, error = %e, "Ledger unreachable, will retry");
            }
            (BroadcastOutcome::Retry, Ok(_)) => {
                tracing::warn!(sequence = sequence, "Mempool full, will retry");
            }
            (BroadcastOutcome::ResetSequence, Ok(r)) => {
                tracing::warn!(sequence = sequence, code = r.code, raw_log = %r.raw_log, "Sequence rejected by ledger");
            }
            (BroadcastOutcome::ResetSequence, Err(_)) => {}
        }

        if let Ok(result) = result {
            attempt.result = Some(result);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MockLedger, ScriptedBroadcast, Wallet};

    const TEST_PRIVATE_KEY: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    fn sdk(code: u32) -> LedgerResult<BroadcastResult> {
        Ok(BroadcastResult {
            code,
            codespace: codes::SDK_CODESPACE.to_string(),
            tx_hash: "HASH".to_string(),
            raw_log: "log".to_string(),
        })
    }

    #[test]
    fn test_classify_result_codes() {
        assert_eq!(classify(&sdk(0)), BroadcastOutcome::Ok);
        assert_eq!(classify(&sdk(19)), BroadcastOutcome::Ok);
        assert_eq!(classify(&sdk(20)), BroadcastOutcome::Retry);
        assert_eq!(classify(&sdk(4)), BroadcastOutcome::ResetSequence);
        assert_eq!(classify(&sdk(32)), BroadcastOutcome::ResetSequence);
        assert_eq!(
            classify(&sdk(5)),
            BroadcastOutcome::Failed(PipelineError::Unrecoverable {
                code: 5,
                codespace: "sdk".to_string(),
                raw_log: "log".to_string(),
            })
        );
    }

    #[test]
    fn test_classify_errors() {
        assert_eq!(
            classify(&Err(LedgerError::Transport("refused".to_string()))),
            BroadcastOutcome::Retry
        );
        assert_eq!(classify(&Err(LedgerError::Timeout(10))), BroadcastOutcome::Retry);
        assert_eq!(
            classify(&Err(LedgerError::PreCheck("bad tx".to_string()))),
            BroadcastOutcome::Failed(PipelineError::PreCheck("bad tx".to_string()))
        );
    }

    #[test]
    fn test_module_codespace_is_not_sdk() {
        let result = Ok(BroadcastResult {
            code: codes::WRONG_SEQUENCE,
            codespace: "evm".to_string(),
            ..Default::default()
        });
        assert!(matches!(classify(&result), BroadcastOutcome::Failed(_)));

        let empty_codespace = Ok(BroadcastResult {
            code: codes::MEMPOOL_IS_FULL,
            ..Default::default()
        });
        assert_eq!(classify(&empty_codespace), BroadcastOutcome::Retry);
    }

    #[tokio::test]
    async fn test_sign_and_broadcast_against_mock() {
        let ledger = MockLedger::new(3, 10);
        let wallet = Wallet::from_private_key(TEST_PRIVATE_KEY).unwrap();
        let executor = BroadcastExecutor::new(Arc::new(ledger.clone()), Arc::new(wallet), "test-1");

        let request = Request::new(Vec::new(), 100).with_memo("first");
        let (tx, bytes) = executor.sign(&request, 3, 10).unwrap();
        assert_eq!(tx.sequence(), 10);

        let mut attempt = SignedAttempt::new(10, request, tx, bytes);
        assert_eq!(executor.broadcast(&mut attempt).await, BroadcastOutcome::Ok);
        assert_eq!(attempt.result.as_ref().map(|r| r.code), Some(0));
        assert_eq!(ledger.mempool_len(), 1);

        // Same bytes again: already in the mempool cache.
        assert_eq!(executor.broadcast(&mut attempt).await, BroadcastOutcome::Ok);
        assert_eq!(attempt.result.as_ref().map(|r| r.code), Some(codes::TX_IN_MEMPOOL_CACHE));

        ledger.script_broadcast(ScriptedBroadcast::Unreachable);
        assert_eq!(executor.broadcast(&mut attempt).await, BroadcastOutcome::Retry);
        assert!(attempt.error.is_none());

        ledger.script_broadcast(ScriptedBroadcast::Code(7));
        assert!(matches!(executor.broadcast(&mut attempt).await, BroadcastOutcome::Failed(_)));
        assert!(attempt.error.is_some());
    }
}
