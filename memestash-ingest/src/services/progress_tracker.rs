//! Run progress tracking
//!
//! The tracker is shared by every pipeline mode and the status endpoint.
//! A run is owned through a `RunHandle`: only the handle mutates state, and
//! at most one handle exists at a time.

use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use crate::error::PipelineError;
use crate::models::{RunSnapshot, RunState, RunStatus};

#[derive(Debug, Default)]
pub struct ProgressTracker {
    state: Mutex<RunState>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RunState> {
        // State stays usable after a panic elsewhere; every update is a plain field write
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Begin a run, or fail with `Busy` while another run is active
    ///
    /// Resets counters and errors; the log ring carries over.
    pub fn start_run(
        self: &Arc<Self>,
        task_name: impl Into<String>,
        total: usize,
    ) -> Result<RunHandle, PipelineError> {
        let task_name = task_name.into();
        let mut state = self.lock();

        if state.status == RunStatus::Running {
            return Err(PipelineError::Busy {
                task: state.current_task.clone().unwrap_or_default(),
            });
        }

        state.status = RunStatus::Running;
        state.current_task = Some(task_name.clone());
        state.total_items = total;
        state.processed_items = 0;
        state.start_time = Some(Utc::now());
        state.errors.clear();

        let mut message = format!("Started task: {}", task_name);
        if total > 0 {
            message.push_str(&format!(" ({} items)", total));
        }
        tracing::info!(task = %task_name, "{}", message);
        state.push_log(message);
        drop(state);

        Ok(RunHandle {
            tracker: Arc::clone(self),
            task_name,
            started: Instant::now(),
            finished: false,
        })
    }

    pub fn is_running(&self) -> bool {
        self.lock().status == RunStatus::Running
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.lock().snapshot()
    }
}

/// Exclusive ownership of the active run
///
/// Dropping an unfinished handle finishes the run.
#[derive(Debug)]
pub struct RunHandle {
    tracker: Arc<ProgressTracker>,
    task_name: String,
    started: Instant,
    finished: bool,
}

impl RunHandle {
    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Set the processed count and/or log a message
    pub fn advance(&self, processed: Option<usize>, message: Option<&str>) {
        let mut state = self.tracker.lock();
        if let Some(processed) = processed {
            state.processed_items = processed;
        }
        if let Some(message) = message.filter(|m| !m.is_empty()) {
            tracing::info!(task = %self.task_name, "{}", message);
            state.push_log(message);
        }
    }

    pub fn set_total(&self, total: usize) {
        self.tracker.lock().total_items = total;
    }

    pub fn log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!(task = %self.task_name, "{}", message);
        self.tracker.lock().push_log(message);
    }

    pub fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        tracing::error!(task = %self.task_name, "{}", error);
        let mut state = self.tracker.lock();
        state.push_log(format!("Error: {}", error));
        state.errors.push(error);
    }

    /// Log the summary and return the tracker to idle
    pub fn finish(mut self) {
        self.complete();
    }

    fn complete(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;

        let elapsed = self.started.elapsed().as_secs_f64();
        let mut state = self.tracker.lock();
        let mut message = format!("Finished task: {} ({:.1}s)", self.task_name, elapsed);
        if !state.errors.is_empty() {
            message.push_str(&format!(", {} errors", state.errors.len()));
        }
        tracing::info!(task = %self.task_name, "{}", message);
        state.push_log(message);
        state.status = RunStatus::Idle;
        state.current_task = None;
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.complete();
    }
}
