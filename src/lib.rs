//! Client-side transaction sequencing and broadcast pipeline.

pub mod config;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;

pub use config::schema::SequencerConfig;
pub use lifecycle::shutdown::Shutdown;
pub use pipeline::{PipelineError, Request, Response, Responses, Submitter, TxPipeline};
