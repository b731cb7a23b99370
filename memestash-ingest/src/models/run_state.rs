//! Pipeline run state
//!
//! One run is active at a time. State persists after a run finishes so the
//! errors and log of the last run stay visible until the next one starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of log entries kept; older entries are evicted first
pub const LOG_CAPACITY: usize = 100;

/// Run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
}

/// One timestamped progress log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub message: String,
}

/// State of the current or most recently finished run
#[derive(Debug, Clone)]
pub struct RunState {
    pub status: RunStatus,
    pub current_task: Option<String>,
    pub total_items: usize,
    pub processed_items: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
    pub logs: VecDeque<LogEntry>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            status: RunStatus::Idle,
            current_task: None,
            total_items: 0,
            processed_items: 0,
            start_time: None,
            errors: Vec::new(),
            logs: VecDeque::with_capacity(LOG_CAPACITY),
        }
    }
}

impl RunState {
    /// Append a log entry, evicting the oldest once capacity is reached
    pub fn push_log(&mut self, message: impl Into<String>) {
        if self.logs.len() == LOG_CAPACITY {
            self.logs.pop_front();
        }
        self.logs.push_back(LogEntry {
            time: Utc::now(),
            message: message.into(),
        });
    }

    /// Percentage of items processed (0.0 when the total is unknown)
    pub fn progress_percent(&self) -> f64 {
        if self.total_items > 0 {
            (self.processed_items as f64 / self.total_items as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            status: self.status,
            current_task: self.current_task.clone(),
            total_items: self.total_items,
            processed_items: self.processed_items,
            progress_percent: self.progress_percent(),
            start_time: self.start_time,
            error_count: self.errors.len(),
            errors: self.errors.clone(),
            logs: self.logs.iter().cloned().collect(),
        }
    }
}

/// Point-in-time copy of the run state, returned to status callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub status: RunStatus,
    pub current_task: Option<String>,
    pub total_items: usize,
    pub processed_items: usize,
    pub progress_percent: f64,
    pub start_time: Option<DateTime<Utc>>,
    pub error_count: usize,
    pub errors: Vec<String>,
    pub logs: Vec<LogEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_ring_keeps_latest_entries_in_order() {
        let mut state = RunState::default();
        for i in 0..(LOG_CAPACITY + 25) {
            state.push_log(format!("line {}", i));
        }

        assert_eq!(state.logs.len(), LOG_CAPACITY);
        let messages: Vec<&str> = state.logs.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages.first(), Some(&"line 25"));
        assert_eq!(messages.last(), Some(&"line 124"));
        for pair in state.logs.iter().collect::<Vec<_>>().windows(2) {
            assert!(pair[0].time <= pair[1].time);
        }
    }

    #[test]
    fn test_progress_percent() {
        let mut state = RunState::default();
        assert_eq!(state.progress_percent(), 0.0);

        state.total_items = 4;
        state.processed_items = 1;
        assert_eq!(state.progress_percent(), 25.0);
    }

    #[test]
    fn test_snapshot_serializes_lowercase_status() {
        let json = serde_json::to_value(RunState::default().snapshot()).unwrap();
        assert_eq!(json["status"], "idle");
        assert_eq!(json["error_count"], 0);
    }
}
