//! Outcome records for specs and suites

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final state of a spec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecState {
    Passed,
    Failed,
    Skipped,
    Panicked,
    TimedOut,
}

impl fmt::Display for SpecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpecState::Passed => write!(f, "Passed"),
            SpecState::Failed => write!(f, "Failed"),
            SpecState::Skipped => write!(f, "Skipped"),
            SpecState::Panicked => write!(f, "Panicked"),
            SpecState::TimedOut => write!(f, "TimedOut"),
        }
    }
}

impl SpecState {
    /// Whether the state counts against the suite
    pub fn is_failure(&self) -> bool {
        matches!(self, SpecState::Failed | SpecState::Panicked | SpecState::TimedOut)
    }
}

/// Report for one spec run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecReport {
    /// Declaration index within the suite
    pub index: usize,
    pub container: Vec<String>,
    pub text: String,
    pub full_text: String,
    pub tags: Vec<String>,
    pub test_id: Option<String>,
    pub state: SpecState,
    pub failure: Option<String>,
    /// Steps and other lines captured while the spec ran
    pub captured_output: Vec<String>,
    /// Text destined for junit `system-out`, set by output enrichers
    #[serde(default)]
    pub system_out: Option<String>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    /// Parallel process that ran the spec
    pub process: usize,
}

impl SpecReport {
    pub fn is_failure(&self) -> bool {
        self.state.is_failure()
    }

    /// Name used for junit classname: the container path
    pub fn classname(&self) -> String {
        self.container.join(" ")
    }
}

/// Report for a whole suite run in one process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub name: String,
    pub specs: Vec<SpecReport>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub setup_failure: Option<String>,
    pub teardown_failure: Option<String>,
    pub process: usize,
    pub parallel_total: usize,
}

/// Counts of spec states
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuiteCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
}

impl SuiteReport {
    pub fn counts(&self) -> SuiteCounts {
        let mut counts = SuiteCounts {
            total: self.specs.len(),
            ..Default::default()
        };
        for spec in &self.specs {
            match spec.state {
                SpecState::Passed => counts.passed += 1,
                SpecState::Failed => counts.failed += 1,
                SpecState::Panicked | SpecState::TimedOut => counts.errored += 1,
                SpecState::Skipped => counts.skipped += 1,
            }
        }
        counts
    }

    /// Whether the run should exit successfully
    pub fn succeeded(&self) -> bool {
        self.setup_failure.is_none()
            && self.teardown_failure.is_none()
            && !self.specs.iter().any(SpecReport::is_failure)
    }
}
