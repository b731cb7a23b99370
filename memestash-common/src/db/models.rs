//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Analysis lifecycle of a stored meme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    /// Reserved by the pipeline, first analysis not yet recorded
    Pending,
    /// Analysis content passed validation
    Success,
    /// Analysis failed; content is placeholder
    Failed,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Pending => "pending",
            AnalysisStatus::Success => "success",
            AnalysisStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(AnalysisStatus::Pending),
            "success" => Ok(AnalysisStatus::Success),
            "failed" => Ok(AnalysisStatus::Failed),
            other => Err(crate::Error::InvalidInput(format!(
                "Unknown analysis status: {}",
                other
            ))),
        }
    }
}

/// One ingested image and its analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemeRecord {
    pub guid: Uuid,
    /// Name of the file inside the upload directory (unique)
    pub filename: String,
    /// Public path the file is served under
    pub filepath: String,
    pub text_content: String,
    pub description: String,
    pub tags: Vec<String>,
    pub title: String,
    pub upload_time: DateTime<Utc>,
    /// SHA-256 of the file content (unique, dedup key)
    pub file_hash: String,
    /// Thread URL or remote image URL the file came from
    pub source_url: Option<String>,
    pub analysis_status: AnalysisStatus,
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
}

/// Public path the upload directory is served under
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Public path of a stored file
pub fn public_filepath(filename: &str) -> String {
    format!("{}/{}", UPLOADS_URL_PREFIX, filename)
}
