//! Background polling of the account's confirmed state.
//!
//! # Responsibilities
//! - Fetch the account state on a fixed interval
//! - Publish every successful observation to the sequencer
//!
//! # Design Decisions
//! - Unbounded channel; the consumer only keeps the newest value
//! - Fetch errors are logged and counted, never escalated
//! - Exits when the consumer goes away or on shutdown

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::ledger::{AccountState, LedgerClient};
use crate::observability::metrics;

pub struct AccountStatePoller {
    ledger: Arc<dyn LedgerClient>,
    address: String,
    interval: Duration,
}

impl AccountStatePoller {
    pub fn new(ledger: Arc<dyn LedgerClient>, address: impl Into<String>, interval: Duration) -> Self {
        Self {
            ledger,
            address: address.into(),
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn spawn(
        self,
        tx: mpsc::UnboundedSender<AccountState>,
        shutdown: broadcast::Receiver<()>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(tx, shutdown))
    }

    pub async fn run(self, tx: mpsc::UnboundedSender<AccountState>, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            address = %self.address,
            interval_ms = self.interval.as_millis() as u64,
            "Account state poller starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.ledger.fetch_account_state(&self.address).await {
                        Ok(state) => {
                            if tx.send(state).is_err() {
                                tracing::debug!("Account state receiver dropped, poller exiting");
                                break;
                            }
                        }
                        Err(e) => {
                            metrics::record_poll_error();
                            tracing::warn!(address = %self.address, error = %e, "Account state query failed");
                        }
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Account state poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
