//! Findings reported by checks.
//!
//! A [`Finding`] is an immutable fact: once built it is only read. The engine
//! appends findings to an ordered sequence and never removes or edits them.
//!
//! ## Example
//!
//! ```
//! use vigil::findings::{Finding, Severity};
//!
//! let finding = Finding::new("Reflected input", Severity::Medium, "req-42")
//!     .with_description("The `q` parameter is echoed back unescaped")
//!     .with_location("query:q");
//!
//! assert_eq!(finding.correlation().request_id, "req-42");
//! assert!(finding.severity().is_actionable());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity level for findings, ordered from least to most critical.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational observation.
    #[default]
    Info,
    Low,
    Medium,
    High,
    /// Requires immediate attention.
    Critical,
}

impl Severity {
    /// Check if this severity is considered critical.
    pub fn is_critical(&self) -> bool {
        matches!(self, Self::Critical)
    }

    /// Check if this severity warrants action (medium or above).
    ///
    /// # Examples
    ///
    /// ```
    /// use vigil::findings::Severity;
    ///
    /// assert!(Severity::High.is_actionable());
    /// assert!(!Severity::Low.is_actionable());
    /// ```
    pub fn is_actionable(&self) -> bool {
        *self >= Self::Medium
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Info => "info",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        write!(f, "{}", s)
    }
}

/// Links a finding back to the traffic that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correlation {
    /// Id of the request that exhibited the issue.
    pub request_id: String,
    /// Free-form locations inside the request (e.g. `query:q`, `header:Cookie`).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
}

/// A single reported issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    name: String,
    #[serde(default)]
    description: String,
    severity: Severity,
    /// Id of the check that reported this finding, filled in by the engine or
    /// carried over from a serialized report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    check_id: Option<String>,
    correlation: Correlation,
    created_at: DateTime<Utc>,
}

impl Finding {
    /// Create a finding correlated to a request.
    pub fn new(name: impl Into<String>, severity: Severity, request_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            severity,
            check_id: None,
            correlation: Correlation {
                request_id: request_id.into(),
                locations: Vec::new(),
            },
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a location inside the correlated request.
    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.correlation.locations.push(location.into());
        self
    }

    /// Attribute the finding to `check_id`.
    ///
    /// A finding that already names a check, such as one read back from a
    /// serialized report, keeps it.
    pub(crate) fn attributed_to(mut self, check_id: &str) -> Self {
        if self.check_id.is_none() {
            self.check_id = Some(check_id.to_string());
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn check_id(&self) -> Option<&str> {
        self.check_id.as_deref()
    }

    pub fn correlation(&self) -> &Correlation {
        &self.correlation
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} (request {})",
            self.severity, self.name, self.correlation.request_id
        )?;
        if let Some(ref check) = self.check_id {
            write!(f, " via {}", check)?;
        }
        Ok(())
    }
}

/// Per-severity counts over a set of findings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindingsSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl FindingsSummary {
    /// Summarise a slice of findings.
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut summary = Self::default();
        for finding in findings {
            summary.total += 1;
            match finding.severity() {
                Severity::Critical => summary.critical += 1,
                Severity::High => summary.high += 1,
                Severity::Medium => summary.medium += 1,
                Severity::Low => summary.low += 1,
                Severity::Info => summary.info += 1,
            }
        }
        summary
    }

    /// Highest severity present, if any.
    pub fn highest(&self) -> Option<Severity> {
        [
            (self.critical, Severity::Critical),
            (self.high, Severity::High),
            (self.medium, Severity::Medium),
            (self.low, Severity::Low),
            (self.info, Severity::Info),
        ]
        .into_iter()
        .find(|(count, _)| *count > 0)
        .map(|(_, severity)| severity)
    }
}
