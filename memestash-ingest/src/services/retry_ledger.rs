//! Retry eligibility and bookkeeping for failed analyses

use chrono::Utc;
use memestash_common::db::{AnalysisStatus, MemeRecord};
use memestash_common::Result;
use sqlx::SqlitePool;

use crate::db::memes;
use crate::models::MemeAnalysis;

#[derive(Debug, Clone, Copy)]
pub struct RetryLedger {
    max_attempts: u32,
}

impl RetryLedger {
    pub fn new(max_attempts: u32) -> Self {
        Self { max_attempts }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Failed and still under the attempt limit
    pub fn eligible_for_retry(&self, record: &MemeRecord) -> bool {
        record.analysis_status == AnalysisStatus::Failed && record.retry_count < self.max_attempts
    }

    pub async fn collect_eligible(&self, db: &SqlitePool) -> Result<Vec<MemeRecord>> {
        memes::find_eligible_for_retry(db, self.max_attempts).await
    }

    /// A retry analysis succeeded; `retry_count` is left as is
    pub fn apply_success(&self, record: &mut MemeRecord, analysis: &MemeAnalysis) {
        analysis.apply_to(record);
        record.analysis_status = AnalysisStatus::Success;
        record.last_retry_at = Some(Utc::now());
    }

    /// A retry analysis failed again
    pub fn apply_failure(&self, record: &mut MemeRecord) {
        record.retry_count = (record.retry_count + 1).min(self.max_attempts);
        record.analysis_status = AnalysisStatus::Failed;
        record.last_retry_at = Some(Utc::now());
    }
}
