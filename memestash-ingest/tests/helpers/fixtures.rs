//! Database, workspace and pipeline fixtures

use async_trait::async_trait;
use memestash_ingest::models::{MemeAnalysis, RunStatus};
use memestash_ingest::services::{
    AnalysisError, AnalysisOutcome, ImageAnalyzer, ImageSource, PipelineOrchestrator,
    PipelineSettings, ProgressTracker, RetryLedger,
};
use serde_json::json;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const TEST_PROMPT: &str = "Describe this meme as JSON.";

/// Single-connection in-memory database with the memes table
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    memestash_common::db::create_memes_table(&pool)
        .await
        .expect("Failed to create memes table");
    pool
}

/// Temporary upload dir, prompt file and thread list location
pub struct TestWorkspace {
    _dir: TempDir,
    pub root: PathBuf,
    pub upload_dir: PathBuf,
    pub prompt_file: PathBuf,
    pub thread_list_file: PathBuf,
}

impl TestWorkspace {
    /// Workspace with a prompt file and no thread list
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let root = dir.path().to_path_buf();
        let upload_dir = root.join("uploads");
        std::fs::create_dir_all(&upload_dir).expect("Failed to create upload dir");

        let prompt_file = root.join("prompt.md");
        std::fs::write(&prompt_file, TEST_PROMPT).expect("Failed to write prompt");

        Self {
            thread_list_file: root.join("memes.txt"),
            _dir: dir,
            root,
            upload_dir,
            prompt_file,
        }
    }

    pub fn write_thread_list(&self, urls: &[&str]) {
        std::fs::write(&self.thread_list_file, urls.join("\n")).expect("Failed to write thread list");
    }

    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            upload_dir: self.upload_dir.clone(),
            prompt_file: self.prompt_file.clone(),
            thread_list_file: self.thread_list_file.clone(),
        }
    }

    /// Names of files currently in the upload directory, sorted
    pub fn uploaded_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.upload_dir)
            .expect("Failed to read upload dir")
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Bytes recognized as PNG, distinct per `seed`
pub fn png_bytes(seed: u8) -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&[0, 0, 0, 13, b'I', b'H', b'D', b'R']);
    bytes.extend(std::iter::repeat(seed).take(64));
    bytes
}

/// Analysis JSON that passes every validation rule
pub fn valid_analysis_json(title: &str) -> String {
    json!({
        "text_content": "when the tests pass on the first try",
        "description": "A surprised cat looking at a green CI badge",
        "tags": ["cat", "ci", "surprised", "programming", "meme"],
        "title": title,
    })
    .to_string()
}

/// Analyzer returning queued outcomes, then successes
#[derive(Default)]
pub struct ScriptedAnalyzer {
    script: Mutex<VecDeque<Result<MemeAnalysis, u16>>>,
    calls: Mutex<Vec<PathBuf>>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an HTTP failure with `status`
    pub fn fail_next(&self, status: u16) {
        self.script.lock().unwrap().push_back(Err(status));
    }

    pub fn succeed_next(&self, analysis: MemeAnalysis) {
        self.script.lock().unwrap().push_back(Ok(analysis));
    }

    /// Fail every call with `status`
    pub fn always_fail(status: u16) -> Self {
        let analyzer = Self::new();
        for _ in 0..64 {
            analyzer.fail_next(status);
        }
        analyzer
    }

    pub fn calls(&self) -> Vec<PathBuf> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, image_path: &Path, _prompt_template: &str) -> AnalysisOutcome {
        self.calls.lock().unwrap().push(image_path.to_path_buf());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Ok(analysis)) => AnalysisOutcome::Success(analysis),
            Some(Err(status)) => AnalysisOutcome::Failure(AnalysisError::Http { status }),
            None => AnalysisOutcome::Success(MemeAnalysis::offline_placeholder()),
        }
    }
}

pub fn build_orchestrator(
    db: SqlitePool,
    workspace: &TestWorkspace,
    thread_source: Arc<dyn ImageSource>,
    remote_source: Arc<dyn ImageSource>,
    analyzer: Arc<dyn ImageAnalyzer>,
    max_attempts: u32,
) -> Arc<PipelineOrchestrator> {
    Arc::new(PipelineOrchestrator::new(
        db,
        Arc::new(ProgressTracker::new()),
        thread_source,
        remote_source,
        analyzer,
        RetryLedger::new(max_attempts),
        workspace.settings(),
    ))
}

/// Poll until no run is active, panicking after five seconds
pub async fn wait_until_idle(progress: &ProgressTracker) {
    for _ in 0..500 {
        if progress.snapshot().status == RunStatus::Idle {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run did not finish within 5 seconds");
}
