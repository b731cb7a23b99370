//! Per-run summaries returned by the pipeline entry points

use serde::{Deserialize, Serialize};

/// Outcome counts of a source sweep or remote batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSummary {
    /// Records created (success or failed analysis)
    pub new_records: usize,
    /// Items skipped because their content was already stored
    pub duplicates: usize,
    /// New records whose first analysis failed
    pub analysis_failures: usize,
    /// Items that could not be fetched, hashed or persisted
    pub errors: usize,
}

impl IngestSummary {
    pub fn log_line(&self) -> String {
        format!(
            "{} new, {} duplicate, {} errors ({} analysis failures)",
            self.new_records, self.duplicates, self.errors, self.analysis_failures
        )
    }
}

/// Outcome counts of a retry sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySummary {
    pub attempted: usize,
    pub recovered: usize,
    pub still_failed: usize,
    /// Records whose updated state could not be persisted
    pub errors: usize,
}

impl RetrySummary {
    pub fn log_line(&self) -> String {
        format!(
            "recovered {}/{}, {} still failed, {} errors",
            self.recovered, self.attempted, self.still_failed, self.errors
        )
    }
}
