//! Transaction sequencing and broadcast pipeline.
//!
//! # Data Flow
//! ```text
//! caller ──submit──▶ Sequencer ──sign+broadcast──▶ BroadcastExecutor ──▶ ledger mempool
//!                        ▲  │
//!    AccountStatePoller ─┘  └──confirmed──▶ ResponseDispatcher ──▶ Responses
//! ```
//!
//! # Design Decisions
//! - Two tasks: the poller and the sequencer; executor and dispatcher run inline
//! - The sequencer alone owns the cursors, the window, and the signing key
//! - Success is reported only once the polled sequence passes the tx
//!
//! # Failure Modes
//! - Node unreachable / mempool full: retried on the next poll tick
//! - Wrong sequence / unauthorized: rebroadcast from the confirmed sequence
//! - Anything else: terminal error in the response

pub mod dispatcher;
pub mod executor;
pub mod handle;
pub mod poller;
pub mod sequencer;
pub mod types;
pub mod window;

pub use executor::{classify, BroadcastExecutor, BroadcastOutcome};
pub use handle::{Responses, Submitter, TxPipeline};
pub use sequencer::{Cursors, Sequencer};
pub use types::{PipelineError, Request, Response, SignedAttempt};
pub use window::InFlightWindow;
