//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to ledger:
//!     → timeouts.rs (enforce request deadline)
//!
//! ResetSequence outcome in the sequencer:
//!     → backoff.rs (grow the delay before the next broadcast pass)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Transient failures are retried on the next poller tick, not in a tight loop
//! - Repeated sequence resets back off exponentially with jitter

pub mod backoff;
pub mod timeouts;
