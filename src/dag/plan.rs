//! Execution plans: the ordered batches a job walks for every target.

use crate::check::CheckDefinition;
use std::fmt;
use std::sync::Arc;

/// A group of checks with no dependency between them.
#[derive(Debug, Clone)]
pub struct Batch {
    checks: Vec<Arc<CheckDefinition>>,
}

impl Batch {
    pub(crate) fn new(checks: Vec<Arc<CheckDefinition>>) -> Self {
        Self { checks }
    }

    pub fn checks(&self) -> &[Arc<CheckDefinition>] {
        &self.checks
    }

    /// Ids of the checks in this batch, in execution order.
    pub fn ids(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Dependency-ordered batches, fixed for the lifetime of a job.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    batches: Vec<Batch>,
}

impl ExecutionPlan {
    pub(crate) fn new(batches: Vec<Batch>) -> Self {
        Self { batches }
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    /// Number of batches.
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total number of checks across all batches.
    pub fn check_count(&self) -> usize {
        self.batches.iter().map(Batch::len).sum()
    }

    /// Index of the batch holding the given check.
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.batches
            .iter()
            .position(|batch| batch.checks.iter().any(|c| c.id() == id))
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, batch) in self.batches.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "[{}]", batch.ids().join(", "))?;
        }
        Ok(())
    }
}
