//! Service modules for the meme ingest pipeline
//!
//! - Source fetchers (Discord threads, remote URLs) behind `ImageSource`
//! - Content-hash deduplication
//! - Vision analysis behind `ImageAnalyzer`, with response parsing
//! - Retry ledger and progress tracker
//! - Pipeline orchestrator tying the above into run modes

pub mod analysis_client;
pub mod hash_deduplicator;
pub mod http_client;
pub mod pipeline;
pub mod progress_tracker;
pub mod remote_fetcher;
pub mod response_parser;
pub mod retry_ledger;
pub mod source_fetcher;
pub mod thread_fetcher;

pub use analysis_client::{AnalysisClient, AnalysisError, AnalysisOutcome, ImageAnalyzer};
pub use hash_deduplicator::{DedupOutcome, HashDeduplicator};
pub use http_client::build_http_client;
pub use pipeline::{normalize_remote_urls, PipelineOrchestrator, PipelineSettings};
pub use progress_tracker::{ProgressTracker, RunHandle};
pub use remote_fetcher::RemoteFetcher;
pub use response_parser::{decode_and_validate, extract_fenced_payload, FormatError, FormatErrorCause};
pub use retry_ledger::RetryLedger;
pub use source_fetcher::{FetchError, FetchReport, FetchedImage, ImageSource};
pub use thread_fetcher::{ThreadFetcher, ThreadRef};
