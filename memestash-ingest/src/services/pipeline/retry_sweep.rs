//! Retry sweep over failed analyses

use super::{abort_run, PipelineOrchestrator, RETRY_TASK};
use crate::db::memes;
use crate::error::PipelineError;
use crate::models::RetrySummary;
use crate::services::{AnalysisOutcome, RunHandle};

impl PipelineOrchestrator {
    pub async fn run_retry_sweep(&self) -> Result<RetrySummary, PipelineError> {
        let run = self.progress.start_run(RETRY_TASK, 0)?;
        self.retry_sweep(run).await
    }

    /// Re-analyze every record the ledger considers eligible
    pub async fn retry_sweep(&self, run: RunHandle) -> Result<RetrySummary, PipelineError> {
        let records = match self.ledger.collect_eligible(&self.db).await {
            Ok(records) => records,
            Err(e) => {
                return Err(abort_run(
                    run,
                    format!("Failed to load records eligible for retry: {}", e),
                ))
            }
        };

        if records.is_empty() {
            run.log("No failed analyses eligible for retry");
            run.finish();
            return Ok(RetrySummary::default());
        }

        let total = records.len();
        run.set_total(total);

        let prompt = match self.read_prompt().await {
            Ok(prompt) => prompt,
            Err(message) => return Err(abort_run(run, message)),
        };

        let mut summary = RetrySummary::default();
        for (index, mut record) in records.into_iter().enumerate() {
            run.advance(
                Some(index + 1),
                Some(&format!("Retrying analysis {}/{}: {}", index + 1, total, record.filename)),
            );
            summary.attempted += 1;

            let image_path = self.settings.upload_dir.join(&record.filename);
            match self.analyzer.analyze(&image_path, &prompt).await {
                AnalysisOutcome::Success(analysis) => {
                    self.ledger.apply_success(&mut record, &analysis);
                    summary.recovered += 1;
                }
                AnalysisOutcome::Failure(e) => {
                    self.ledger.apply_failure(&mut record);
                    run.record_error(format!("Retry failed for {}: {}", record.filename, e));
                    summary.still_failed += 1;
                }
            }

            if let Err(e) = memes::update_after_retry(&self.db, &record).await {
                run.record_error(format!("Failed to save {}: {}", record.filename, e));
                summary.errors += 1;
            }
        }

        run.log(format!("Retry complete: {}", summary.log_line()));
        run.finish();
        Ok(summary)
    }
}
