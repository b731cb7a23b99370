//! Remote image URL batch

use super::{abort_run, PipelineOrchestrator, REMOTE_BATCH_TASK};
use crate::error::PipelineError;
use crate::models::IngestSummary;
use crate::services::RunHandle;

/// Longest URL prefix shown in progress messages
const URL_PREVIEW_CHARS: usize = 50;

impl PipelineOrchestrator {
    pub async fn run_remote_batch(&self, urls: Vec<String>) -> Result<IngestSummary, PipelineError> {
        let run = self.progress.start_run(REMOTE_BATCH_TASK, urls.len())?;
        self.remote_batch(run, urls).await
    }

    /// Download and ingest each URL in order
    pub async fn remote_batch(
        &self,
        run: RunHandle,
        urls: Vec<String>,
    ) -> Result<IngestSummary, PipelineError> {
        let prompt = match self.read_prompt().await {
            Ok(prompt) => prompt,
            Err(message) => return Err(abort_run(run, message)),
        };

        let total = urls.len();
        run.set_total(total);

        let mut summary = IngestSummary::default();
        for (index, url) in urls.iter().enumerate() {
            let preview: String = url.chars().take(URL_PREVIEW_CHARS).collect();
            run.advance(
                Some(index + 1),
                Some(&format!("Processing remote image {}/{}: {}", index + 1, total, preview)),
            );
            self.ingest_from(&run, self.remote_source.as_ref(), url, &prompt, &mut summary)
                .await;
        }

        run.log(format!("Remote fetch complete: {}", summary.log_line()));
        run.finish();
        Ok(summary)
    }
}
