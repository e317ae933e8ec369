//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Trigger → poller exits → sequencer exits → response stream closes
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Every long-running task subscribes to the same shutdown broadcast
//! - Sequencing state is in memory only; nothing to flush on exit

pub mod shutdown;
pub mod signals;
