//! Pipeline orchestrator
//!
//! Three run modes share one per-item flow:
//!
//! - **Scheduled sweep** (`sweep_threads`): every Discord thread in the list file
//! - **Remote batch** (`remote_batch`): an explicit list of image URLs
//! - **Retry sweep** (`retry_sweep`): re-analysis of failed records
//!
//! Every mode runs under a `RunHandle`. The `run_*` entry points acquire the
//! handle themselves; the plain variants take one the caller already holds.
//! Per-item errors are recorded on the run and counted without stopping it.

use chrono::Utc;
use memestash_common::db::{public_filepath, AnalysisStatus, MemeRecord};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use crate::db::memes::{self, InsertOutcome};
use crate::error::{IngestError, PipelineError};
use crate::models::{IngestSummary, MemeAnalysis};
use crate::services::{
    AnalysisOutcome, DedupOutcome, FetchedImage, HashDeduplicator, ImageAnalyzer, ImageSource,
    ProgressTracker, RetryLedger, RunHandle,
};

mod remote_batch;
mod retry_sweep;
mod sweep_threads;

pub const SWEEP_TASK: &str = "Discord sweep";
pub const REMOTE_BATCH_TASK: &str = "Remote image fetch";
pub const RETRY_TASK: &str = "Retry failed analyses";

/// File locations read by the pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub upload_dir: PathBuf,
    pub prompt_file: PathBuf,
    pub thread_list_file: PathBuf,
}

/// What happened to one fetched image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Stored { analysis_failed: bool },
    Duplicate,
}

impl IngestSummary {
    fn tally(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Stored { analysis_failed } => {
                self.new_records += 1;
                if analysis_failed {
                    self.analysis_failures += 1;
                }
            }
            ItemOutcome::Duplicate => self.duplicates += 1,
        }
    }
}

pub struct PipelineOrchestrator {
    db: SqlitePool,
    progress: Arc<ProgressTracker>,
    thread_source: Arc<dyn ImageSource>,
    remote_source: Arc<dyn ImageSource>,
    analyzer: Arc<dyn ImageAnalyzer>,
    dedup: HashDeduplicator,
    ledger: RetryLedger,
    settings: PipelineSettings,
}

impl PipelineOrchestrator {
    pub fn new(
        db: SqlitePool,
        progress: Arc<ProgressTracker>,
        thread_source: Arc<dyn ImageSource>,
        remote_source: Arc<dyn ImageSource>,
        analyzer: Arc<dyn ImageAnalyzer>,
        ledger: RetryLedger,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            dedup: HashDeduplicator::new(db.clone()),
            db,
            progress,
            thread_source,
            remote_source,
            analyzer,
            ledger,
            settings,
        }
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    /// Read the prompt template at run start
    async fn read_prompt(&self) -> Result<String, String> {
        tokio::fs::read_to_string(&self.settings.prompt_file)
            .await
            .map_err(|e| {
                format!(
                    "Failed to read prompt file {}: {}",
                    self.settings.prompt_file.display(),
                    e
                )
            })
    }

    /// Fetch one input URL and run every image it yields through the item flow
    async fn ingest_from(
        &self,
        run: &RunHandle,
        source: &dyn ImageSource,
        url: &str,
        prompt: &str,
        summary: &mut IngestSummary,
    ) {
        let report = match source.fetch(url).await {
            Ok(report) => report,
            Err(e) => {
                run.record_error(format!("Failed to fetch {}: {}", url, IngestError::from(e)));
                summary.errors += 1;
                return;
            }
        };

        for error in report.errors {
            run.record_error(error);
            summary.errors += 1;
        }

        for image in report.images {
            let filename = image.filename.clone();
            match self.ingest_image(run, source.name(), image, prompt).await {
                Ok(outcome) => summary.tally(outcome),
                Err(e) => {
                    run.record_error(format!("Failed to process {}: {}", filename, e));
                    summary.errors += 1;
                }
            }
        }
    }

    /// Dedup, reserve, analyze and record a single downloaded image
    async fn ingest_image(
        &self,
        run: &RunHandle,
        source_label: &str,
        image: FetchedImage,
        prompt: &str,
    ) -> Result<ItemOutcome, IngestError> {
        match self.dedup.check_and_reserve(&image.path).await? {
            DedupOutcome::Unique(hash) => {
                self.store_unique(run, source_label, image, hash, prompt).await
            }
            DedupOutcome::Duplicate { .. } => self.skip_duplicate(run, &image).await,
        }
    }

    async fn skip_duplicate(
        &self,
        run: &RunHandle,
        image: &FetchedImage,
    ) -> Result<ItemOutcome, IngestError> {
        self.dedup.discard(&image.path).await?;
        run.log(format!("Skipped duplicate image: {}", image.filename));
        Ok(ItemOutcome::Duplicate)
    }

    /// Reserve `hash` with a pending record, then analyze and store the result
    async fn store_unique(
        &self,
        run: &RunHandle,
        source_label: &str,
        image: FetchedImage,
        hash: String,
        prompt: &str,
    ) -> Result<ItemOutcome, IngestError> {
        let placeholder = MemeAnalysis::pending_placeholder(source_label);
        let mut record = MemeRecord {
            guid: Uuid::new_v4(),
            filepath: public_filepath(&image.filename),
            filename: image.filename.clone(),
            text_content: String::new(),
            description: String::new(),
            tags: Vec::new(),
            title: String::new(),
            upload_time: Utc::now(),
            file_hash: hash,
            source_url: Some(image.source_url.clone()),
            analysis_status: AnalysisStatus::Pending,
            retry_count: 0,
            last_retry_at: None,
        };
        placeholder.apply_to(&mut record);

        if memes::insert_pending(&self.db, &record).await? == InsertOutcome::DuplicateHash {
            // Same content stored after the pre-check ran
            return self.skip_duplicate(run, &image).await;
        }

        run.advance(None, Some(&format!("Analyzing image: {}", image.filename)));
        match self.analyzer.analyze(&image.path, prompt).await {
            AnalysisOutcome::Success(analysis) => {
                let stored = memes::record_analysis(
                    &self.db,
                    record.guid,
                    &analysis,
                    AnalysisStatus::Success,
                )
                .await;
                if let Err(e) = stored {
                    // Leave the record retryable instead of stuck in pending
                    memes::record_analysis(
                        &self.db,
                        record.guid,
                        &placeholder,
                        AnalysisStatus::Failed,
                    )
                    .await?;
                    run.record_error(format!(
                        "Failed to save analysis for {}, marked for retry: {}",
                        image.filename, e
                    ));
                    return Ok(ItemOutcome::Stored { analysis_failed: true });
                }
                Ok(ItemOutcome::Stored { analysis_failed: false })
            }
            AnalysisOutcome::Failure(e) => {
                run.record_error(format!("Analysis failed for {}: {}", image.filename, e));
                memes::record_analysis(&self.db, record.guid, &placeholder, AnalysisStatus::Failed)
                    .await?;
                Ok(ItemOutcome::Stored { analysis_failed: true })
            }
        }
    }
}

/// Record a setup failure, finish the run and hand back the error
fn abort_run(run: RunHandle, message: String) -> PipelineError {
    run.record_error(message.clone());
    run.finish();
    PipelineError::Setup(message)
}

/// Trim entries and keep only http(s) URLs
pub fn normalize_remote_urls<S: AsRef<str>>(urls: &[S]) -> Vec<String> {
    urls.iter()
        .map(|u| u.as_ref().trim())
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .map(str::to_string)
        .collect()
}
