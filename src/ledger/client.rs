//! Collaborator traits for talking to the ledger.
//!
//! The sequencer only needs two calls: read the account's confirmed state and
//! hand signed bytes to the mempool. Tx lookup is a separate trait because
//! only commit waiting needs it.

use async_trait::async_trait;

use crate::ledger::types::{AccountState, BroadcastResult, LedgerResult, TxResult};

/// Minimal ledger access used by the pipeline.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Fetch the account number and next sequence for `address`.
    ///
    /// Read-only and idempotent; safe to poll.
    async fn fetch_account_state(&self, address: &str) -> LedgerResult<AccountState>;

    /// Submit signed tx bytes to the mempool without waiting for inclusion.
    ///
    /// `Err` means the ledger never produced a result code: a transport
    /// failure, or a pre-check rejection ([`LedgerError::PreCheck`]).
    ///
    /// [`LedgerError::PreCheck`]: crate::ledger::LedgerError::PreCheck
    async fn broadcast_tx(&self, tx_bytes: &[u8]) -> LedgerResult<BroadcastResult>;
}

/// Lookup of committed transactions by hash.
#[async_trait]
pub trait TxLookup: Send + Sync {
    /// `Ok(None)` while the tx is not yet in a block.
    async fn get_tx(&self, tx_hash: &str) -> LedgerResult<Option<TxResult>>;
}
