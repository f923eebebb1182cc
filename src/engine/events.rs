//! Progress events emitted by a running scan job.

use crate::findings::Finding;
use serde::{Deserialize, Serialize};

/// Gate that kept a check from running on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Minimum strength above the configured strength
    Strength,
    /// The `when` predicate returned false
    When,
    /// Dedupe key already seen earlier in the job
    Duplicate,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::Strength => write!(f, "strength"),
            SkipReason::When => write!(f, "when"),
            SkipReason::Duplicate => write!(f, "duplicate"),
        }
    }
}

/// Events emitted during a scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanEvent {
    /// Processing of a target has started.
    TargetStarted { target: String, index: usize },
    /// A batch has started on a target.
    BatchStarted {
        target: String,
        batch: usize,
        checks: Vec<String>,
    },
    /// A check was filtered out by one of the gates.
    CheckSkipped {
        target: String,
        check: String,
        reason: SkipReason,
    },
    /// A task was instantiated.
    TaskStarted { target: String, check: String },
    /// A task reached `Done`.
    TaskFinished {
        target: String,
        check: String,
        steps: u32,
    },
    /// A task failed.
    TaskFailed {
        target: String,
        check: String,
        error: String,
    },
    /// A step reported a finding.
    FindingReported { finding: Finding },
    /// All batches ran for a target.
    TargetFinished { target: String, findings: usize },
    /// The job halted at a cancellation check-point.
    JobStopped { findings: usize },
    /// Every target was processed.
    JobCompleted { findings: usize },
}
