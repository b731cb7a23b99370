//! Scheduled sweep of the Discord thread list

use std::path::Path;

use super::{abort_run, PipelineOrchestrator, SWEEP_TASK};
use crate::error::PipelineError;
use crate::models::IngestSummary;
use crate::services::RunHandle;

/// Non-blank lines of the thread list, or `None` when the file does not exist
async fn read_thread_list(path: &Path) -> std::io::Result<Option<Vec<String>>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(
            content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl PipelineOrchestrator {
    pub async fn run_scheduled_sweep(&self) -> Result<IngestSummary, PipelineError> {
        let run = self.progress.start_run(SWEEP_TASK, 0)?;
        self.scheduled_sweep(run).await
    }

    /// Sweep every thread URL in the list file
    pub async fn scheduled_sweep(&self, run: RunHandle) -> Result<IngestSummary, PipelineError> {
        let list_path = &self.settings.thread_list_file;
        let urls = match read_thread_list(list_path).await {
            Ok(Some(urls)) => urls,
            Ok(None) => {
                tracing::warn!(path = %list_path.display(), "Thread list not found, nothing to sweep");
                run.log(format!("Thread list not found: {}", list_path.display()));
                run.finish();
                return Ok(IngestSummary::default());
            }
            Err(e) => {
                return Err(abort_run(
                    run,
                    format!("Failed to read thread list {}: {}", list_path.display(), e),
                ))
            }
        };

        let prompt = match self.read_prompt().await {
            Ok(prompt) => prompt,
            Err(message) => return Err(abort_run(run, message)),
        };

        let total = urls.len();
        run.set_total(total);

        let mut summary = IngestSummary::default();
        for (index, url) in urls.iter().enumerate() {
            run.advance(
                Some(index),
                Some(&format!("Processing thread {}/{}: {}", index + 1, total, url)),
            );
            self.ingest_from(&run, self.thread_source.as_ref(), url, &prompt, &mut summary)
                .await;
        }
        run.advance(Some(total), None);

        run.log(format!("Discord sweep complete: {}", summary.log_line()));
        run.finish();
        Ok(summary)
    }
}
