//! Data models for memestash-ingest
//!
//! - Analysis payload and its validation rules
//! - Run state tracked by the progress tracker
//! - Per-run summaries returned by the pipeline

pub mod analysis;
pub mod run_state;
pub mod summary;

pub use analysis::{MemeAnalysis, ValidationError, ValidationRule};
pub use run_state::{LogEntry, RunSnapshot, RunState, RunStatus, LOG_CAPACITY};
pub use summary::{IngestSummary, RetrySummary};
