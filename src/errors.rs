//! Typed error hierarchy for the scan engine.
//!
//! Two top-level enums cover the two failure classes:
//! - `BatchError`: configuration errors found while planning, before any target runs
//! - `ScanError`: failures raised while a job is running (steps, dependencies, requests)

use thiserror::Error;

/// Errors from building the execution plan over a set of checks.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Unknown dependency '{dependency}' in check '{check}': no check with that id exists")]
    UnknownDependency { check: String, dependency: String },

    #[error("Circular dependency detected between checks: {checks:?}")]
    CircularDependency { checks: Vec<String> },

    #[error("Duplicate check id: {id}")]
    DuplicateCheck { id: String },
}

/// Errors raised while a scan job is running.
///
/// A step may return any of these; the scheduler never swallows them unless the
/// job runs with `fail_fast` disabled.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Output of check '{dependency}' has not been published for this target")]
    UnresolvedDependency { dependency: String },

    #[error("Check '{check}' already published its output for this target")]
    AlreadyPublished { check: String },

    #[error("Check '{check}' has no step named '{step}'")]
    UnknownStep { check: String, step: String },

    #[error("Request failed: {0}")]
    Request(#[source] anyhow::Error),

    #[error("Failed to compute artifact '{key}': {source}")]
    Artifact {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScanError {
    /// Check if this error comes from reading an unpublished dependency.
    pub fn is_unresolved_dependency(&self) -> bool {
        matches!(self, Self::UnresolvedDependency { .. })
    }
}
