//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap ledger calls with a deadline
//! - Cancel operations cleanly on timeout
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::ledger::types::{LedgerError, LedgerResult};

/// Run `fut` with a deadline, mapping elapsed time to [`LedgerError::Timeout`].
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> LedgerResult<T>
where
    F: Future<Output = LedgerResult<T>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(LedgerError::Timeout(deadline.as_secs())),
    }
}
