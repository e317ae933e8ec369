//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Poller and sequencer produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Sequencer events carry sequence numbers as fields
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
