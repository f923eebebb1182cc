//! The step contract every check obeys.
//!
//! A check is a named set of steps over an opaque JSON state. Each step receives
//! the current state and the target's [`RuntimeContext`], may suspend on I/O,
//! and returns a [`StepOutcome`] naming what happens next. The engine never
//! looks inside the state; it only reads step names and outcome tags.

use crate::engine::RuntimeContext;
use crate::errors::ScanError;
use crate::findings::Finding;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

/// What a step returns.
pub type StepResult = Result<StepOutcome, ScanError>;

/// Result of running one step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The task stays active and runs `next_step` in the next round.
    Continue {
        next_step: String,
        state: Value,
        findings: Vec<Finding>,
    },
    /// The task is finished; `state` is the final state.
    Done { state: Value, findings: Vec<Finding> },
}

impl StepOutcome {
    /// Continue at `next_step` with a new state.
    pub fn next(next_step: impl Into<String>, state: Value) -> Self {
        Self::Continue {
            next_step: next_step.into(),
            state,
            findings: Vec::new(),
        }
    }

    /// Finish with a final state.
    pub fn done(state: Value) -> Self {
        Self::Done {
            state,
            findings: Vec::new(),
        }
    }

    /// Attach a finding to this outcome.
    pub fn with_finding(mut self, finding: Finding) -> Self {
        self.findings_mut().push(finding);
        self
    }

    /// Attach several findings to this outcome.
    pub fn with_findings(mut self, findings: impl IntoIterator<Item = Finding>) -> Self {
        self.findings_mut().extend(findings);
        self
    }

    /// Check if this outcome terminates the task.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    pub fn findings(&self) -> &[Finding] {
        match self {
            Self::Continue { findings, .. } | Self::Done { findings, .. } => findings,
        }
    }

    fn findings_mut(&mut self) -> &mut Vec<Finding> {
        match self {
            Self::Continue { findings, .. } | Self::Done { findings, .. } => findings,
        }
    }
}

/// One step of a check.
///
/// Implemented for any `Fn(Value, Arc<RuntimeContext>) -> impl Future<Output = StepResult>`,
/// so most checks are written as async closures.
#[async_trait]
pub trait Step: Send + Sync {
    async fn run(&self, state: Value, ctx: Arc<RuntimeContext>) -> StepResult;
}

#[async_trait]
impl<F, Fut> Step for F
where
    F: Fn(Value, Arc<RuntimeContext>) -> Fut + Send + Sync,
    Fut: Future<Output = StepResult> + Send + 'static,
{
    async fn run(&self, state: Value, ctx: Arc<RuntimeContext>) -> StepResult {
        (self)(state, ctx).await
    }
}

/// The state machine of a check: its steps, first step and initial state.
#[derive(Clone, Default)]
pub struct CheckSteps {
    initial_step: String,
    initial_state: Value,
    steps: HashMap<String, Arc<dyn Step>>,
}

impl CheckSteps {
    /// Start a state machine at `initial_step` with `initial_state`.
    pub fn new(initial_step: impl Into<String>, initial_state: Value) -> Self {
        Self {
            initial_step: initial_step.into(),
            initial_state,
            steps: HashMap::new(),
        }
    }

    /// Add (or replace) a named step written as an async closure.
    pub fn step<F, Fut>(self, name: impl Into<String>, step: F) -> Self
    where
        F: Fn(Value, Arc<RuntimeContext>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StepResult> + Send + 'static,
    {
        self.step_impl(name, step)
    }

    /// Add (or replace) a named step implemented as a type.
    pub fn step_impl(mut self, name: impl Into<String>, step: impl Step + 'static) -> Self {
        self.steps.insert(name.into(), Arc::new(step));
        self
    }

    pub fn initial_step(&self) -> &str {
        &self.initial_step
    }

    pub fn initial_state(&self) -> &Value {
        &self.initial_state
    }

    /// Look up a step by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Step>> {
        self.steps.get(name).cloned()
    }

    /// Names of all declared steps, sorted.
    pub fn step_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.steps.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for CheckSteps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckSteps")
            .field("initial_step", &self.initial_step)
            .field("initial_state", &self.initial_state)
            .field("steps", &self.step_names())
            .finish()
    }
}
