//! Ledger integration subsystem.
//!
//! # Data Flow
//! ```text
//! Environment Variables (private key)
//!     → wallet.rs (key loading, signing)
//!     → transaction.rs (unsigned tx, sign doc, signed envelope)
//!     → client.rs (collaborator traits)
//!         → rest.rs (REST gateway with timeouts and failover)
//!         → mock.rs (in-process ledger)
//! ```
//!
//! # Security Constraints
//! - Private keys ONLY from environment variables
//! - Never log private keys or sensitive data
//! - All ledger calls have configurable timeouts

pub mod client;
pub mod mock;
pub mod rest;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use client::{LedgerClient, TxLookup};
pub use mock::{MockLedger, ScriptedBroadcast};
pub use rest::RestLedgerClient;
pub use transaction::{wait_for_tx_commit, Coin, LedgerMsg, SignedTx, SignerData, UnsignedTx};
pub use types::codes;
pub use types::{AccountState, BroadcastResult, LedgerConfig, LedgerError, LedgerResult, TxResult};
pub use wallet::{SigningError, TxSigner, Wallet};
