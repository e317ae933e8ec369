//! The sequencing state machine.
//!
//! # Responsibilities
//! - Assign sequences to requests in acceptance order
//! - Keep signed attempts until the ledger confirms their sequence
//! - Rebroadcast dropped or stale txs and recover from sequence drift
//! - Apply backpressure once `inflight_limit` txs are unconfirmed
//!
//! # Data Flow
//! ```text
//! account state ──┐
//!                 ├─▶ select! ─▶ deliver confirmed ─▶ recover cursors ─▶ broadcast pass
//! submission ─────┘                 │                                        │
//!                                   ▼                                        ▼
//!                          ResponseDispatcher                       BroadcastExecutor
//! ```
//!
//! # Design Decisions
//! - One task owns every cursor and the window; no locks
//! - Confirmation is only ever learned from the account state feed
//! - Consecutive sequence resets back off before the next pass, and a request
//!   that keeps hitting them is failed after `max_sequence_resets`

use tokio::sync::{broadcast, mpsc};

use crate::config::PipelineConfig;
use crate::ledger::AccountState;
use crate::observability::metrics;
use crate::pipeline::dispatcher::ResponseDispatcher;
use crate::pipeline::executor::{BroadcastExecutor, BroadcastOutcome};
use crate::pipeline::types::{PipelineError, Request, Response, SignedAttempt, Submission};
use crate::pipeline::window::InFlightWindow;
use crate::resilience::backoff::BackoffGate;

/// Snapshot of the three sequence cursors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursors {
    /// Next sequence the ledger will accept.
    pub confirmed_sequence: u64,
    /// Next sequence to assign to a never-signed request.
    pub check_tx_seq: u64,
    /// Slot the broadcast pass resumes from.
    pub broadcast_tx_seq: u64,
}

enum Event {
    Account(AccountState),
    Submission(Submission),
}

pub struct Sequencer {
    executor: BroadcastExecutor,
    dispatcher: ResponseDispatcher,
    inflight_limit: u64,
    max_sequence_resets: u32,

    ready: bool,
    account_number: u64,
    cursors: Cursors,
    current: Option<Request>,
    /// Resets seen while the current request was pending.
    current_resets: u32,
    window: InFlightWindow,
    reset_backoff: BackoffGate,
}

impl Sequencer {
    pub fn new(executor: BroadcastExecutor, dispatcher: ResponseDispatcher, config: &PipelineConfig) -> Self {
        let inflight_limit = config.inflight_limit.max(1);
        Self {
            executor,
            dispatcher,
            inflight_limit,
            max_sequence_resets: config.max_sequence_resets,
            ready: false,
            account_number: 0,
            cursors: Cursors {
                confirmed_sequence: 0,
                check_tx_seq: 0,
                broadcast_tx_seq: 0,
            },
            current: None,
            current_resets: 0,
            window: InFlightWindow::new(inflight_limit),
            reset_backoff: BackoffGate::new(config.reset_backoff_base_ms, config.reset_backoff_max_ms),
        }
    }

    pub fn cursors(&self) -> Cursors {
        self.cursors
    }

    /// True once the first account state has been observed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn has_current_request(&self) -> bool {
        self.current.is_some()
    }

    pub fn inflight_limit_reached(&self) -> bool {
        self.cursors.check_tx_seq.saturating_sub(self.cursors.confirmed_sequence) >= self.inflight_limit
    }

    /// Whether a new request may be taken right now.
    pub fn can_accept(&self) -> bool {
        self.ready && self.current.is_none() && !self.inflight_limit_reached()
    }

    /// Nothing left that could still produce a response.
    pub fn is_drained(&self) -> bool {
        self.current.is_none() && self.window.is_empty()
    }

    /// Apply a newly observed account state and deliver confirmed attempts.
    pub async fn on_account_state(&mut self, state: AccountState) {
        if !self.ready {
            self.ready = true;
            self.account_number = state.account_number;
            self.cursors = Cursors {
                confirmed_sequence: state.sequence,
                check_tx_seq: state.sequence,
                broadcast_tx_seq: state.sequence,
            };
            metrics::record_confirmed_sequence(state.sequence);
            tracing::info!(
                account_number = state.account_number,
                sequence = state.sequence,
                "Sequencer initialized from account state"
            );
            return;
        }

        let old = self.cursors.confirmed_sequence;
        if state.sequence < old {
            tracing::warn!(observed = state.sequence, confirmed = old, "Ignoring account state behind confirmed sequence");
            return;
        }
        self.account_number = state.account_number;
        if state.sequence == old {
            return;
        }

        self.cursors.confirmed_sequence = state.sequence;
        metrics::record_confirmed_sequence(state.sequence);

        // Nothing can be tracked at or past `old + inflight_limit`.
        let end = state.sequence.min(old.saturating_add(self.inflight_limit));
        for sequence in old..end {
            if let Some(attempt) = self.window.take(sequence) {
                self.dispatcher.dispatch(attempt.into_response()).await;
            }
        }
    }

    /// Take `request` as the current request.
    pub fn accept(&mut self, request: Request) {
        debug_assert!(self.current.is_none());
        tracing::debug!(next_sequence = self.cursors.check_tx_seq, "Request accepted");
        self.current = Some(request);
        self.current_resets = 0;
    }

    /// Last sequence the broadcast pass should visit, if any.
    fn last_request_tx_seq(&self) -> Option<u64> {
        if self.current.is_some() {
            Some(self.cursors.check_tx_seq)
        } else {
            self.cursors.check_tx_seq.checked_sub(1)
        }
    }

    /// Recover cursors and run one broadcast pass.
    pub async fn process(&mut self) {
        if !self.ready {
            return;
        }

        if self.cursors.check_tx_seq < self.cursors.confirmed_sequence {
            tracing::info!(
                from = self.cursors.check_tx_seq,
                to = self.cursors.confirmed_sequence,
                "Sequence consumed outside this pipeline, advancing"
            );
            self.cursors.check_tx_seq = self.cursors.confirmed_sequence;
        }
        // Slots below the confirmed sequence are already resolved.
        if self.cursors.broadcast_tx_seq < self.cursors.confirmed_sequence {
            self.cursors.broadcast_tx_seq = self.cursors.confirmed_sequence;
        }

        if let Some(last) = self.last_request_tx_seq() {
            if self.cursors.broadcast_tx_seq > last {
                self.cursors.broadcast_tx_seq = last;
            }
        }

        if !self.reset_backoff.is_open() {
            tracing::debug!(streak = self.reset_backoff.streak(), "Holding broadcasts after sequence reset");
        } else {
            self.broadcast_pass().await;
        }

        metrics::record_inflight(self.cursors.check_tx_seq - self.cursors.confirmed_sequence);
    }

    async fn broadcast_pass(&mut self) {
        // Cleared once the pass walks the whole window without a Retry or Reset.
        let mut settled = true;
        while let Some(last) = self.last_request_tx_seq() {
            let sequence = self.cursors.broadcast_tx_seq;
            if sequence > last {
                break;
            }

            let is_current_slot = self.current.is_some() && sequence == self.cursors.check_tx_seq;
            let (mut attempt, fresh) = match self.window.take(sequence) {
                Some(attempt) => (attempt, false),
                None if is_current_slot => {
                    let Some(request) = self.current.take() else {
                        break;
                    };
                    match self.executor.sign(&request, self.account_number, sequence) {
                        Ok((tx, bytes)) => (SignedAttempt::new(sequence, request, tx, bytes), true),
                        Err(error) => {
                            // The sequence was never used; the cursor stays on it.
                            self.current_resets = 0;
                            self.dispatcher.dispatch(Response::failed(sequence, request, error)).await;
                            continue;
                        }
                    }
                }
                None => {
                    self.cursors.broadcast_tx_seq += 1;
                    continue;
                }
            };

            match self.executor.broadcast(&mut attempt).await {
                BroadcastOutcome::Ok => {
                    self.window.insert(attempt);
                    if fresh {
                        self.cursors.check_tx_seq += 1;
                        self.current_resets = 0;
                    }
                    self.cursors.broadcast_tx_seq += 1;
                }
                BroadcastOutcome::Failed(error) => {
                    attempt.error = Some(error);
                    if fresh {
                        self.current_resets = 0;
                    } else {
                        self.cursors.broadcast_tx_seq += 1;
                    }
                    self.dispatcher.dispatch(attempt.into_response()).await;
                }
                BroadcastOutcome::Retry => {
                    self.restore(attempt, fresh);
                    settled = false;
                    break;
                }
                BroadcastOutcome::ResetSequence => {
                    self.restore(attempt, fresh);
                    self.on_sequence_reset(fresh).await;
                    settled = false;
                    break;
                }
            }
        }

        if settled {
            self.reset_backoff.record_success();
        }
    }

    /// Put an unresolved attempt back where it came from.
    fn restore(&mut self, attempt: SignedAttempt, fresh: bool) {
        if fresh {
            self.current = Some(attempt.request);
        } else {
            self.window.insert(attempt);
        }
    }

    /// `fresh` is true when the reset hit the current request's own slot;
    /// only those count towards `max_sequence_resets`.
    async fn on_sequence_reset(&mut self, fresh: bool) {
        metrics::record_sequence_reset();
        let delay = self.reset_backoff.record_failure();
        self.cursors.broadcast_tx_seq = self.cursors.confirmed_sequence;
        tracing::warn!(
            confirmed = self.cursors.confirmed_sequence,
            streak = self.reset_backoff.streak(),
            delay_ms = delay.as_millis() as u64,
            "Resetting broadcast sequence"
        );

        if !fresh || self.current.is_none() {
            return;
        }
        self.current_resets += 1;
        if self.max_sequence_resets == 0 || self.current_resets < self.max_sequence_resets {
            return;
        }

        let resets = self.current_resets;
        self.current_resets = 0;
        if let Some(request) = self.current.take() {
            let sequence = self.cursors.check_tx_seq;
            let error = PipelineError::SequenceContention { sequence, resets };
            self.dispatcher.dispatch(Response::failed(sequence, request, error)).await;
        }
    }

    /// Drive the sequencer until shutdown, or until every submitter is gone
    /// and all outstanding work has been delivered.
    pub async fn run(
        mut self,
        mut account_rx: mpsc::UnboundedReceiver<AccountState>,
        mut requests: mpsc::Receiver<Submission>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        tracing::info!(inflight_limit = self.inflight_limit, "Sequencer starting");
        let mut accepting = true;

        loop {
            if !accepting && self.is_drained() {
                tracing::info!("All submitters closed and window drained, sequencer exiting");
                break;
            }

            let accept = accepting && self.can_accept();
            let event = tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Sequencer received shutdown signal, exiting loop");
                    break;
                }
                state = account_rx.recv() => match state {
                    Some(state) => Event::Account(newest(state, &mut account_rx)),
                    None => {
                        tracing::warn!("Account state feed closed, sequencer exiting");
                        break;
                    }
                },
                submission = requests.recv(), if accept => match submission {
                    Some(submission) => Event::Submission(submission),
                    None => {
                        tracing::info!("Request channel closed, draining in-flight txs");
                        accepting = false;
                        continue;
                    }
                },
            };

            let step = async {
                match event {
                    Event::Account(state) => self.on_account_state(state).await,
                    Event::Submission(submission) => {
                        if submission.accepted.send(()).is_err() {
                            tracing::debug!("Submitter cancelled before acceptance, dropping request");
                            return;
                        }
                        self.accept(submission.request);
                    }
                }
                self.process().await;
            };

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Sequencer received shutdown signal, exiting loop");
                    break;
                }
                _ = step => {}
            }
        }
    }
}

/// Drain queued states and keep only the most recent.
fn newest(mut state: AccountState, rx: &mut mpsc::UnboundedReceiver<AccountState>) -> AccountState {
    while let Ok(next) = rx.try_recv() {
        state = next;
    }
    state
}
