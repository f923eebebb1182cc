//! A running instance of one check against one target.

use crate::check::{CheckDefinition, StepOutcome};
use crate::engine::RuntimeContext;
use crate::errors::ScanError;
use crate::findings::Finding;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// What one call to [`Task::advance`] produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// The task stays active for the next round.
    Continue { findings: Vec<Finding> },
    /// The task finished; `published` is true when it wrote an output value.
    Done {
        findings: Vec<Finding>,
        published: bool,
    },
}

impl Advance {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done { .. })
    }

    pub fn findings(&self) -> &[Finding] {
        match self {
            Self::Continue { findings } | Self::Done { findings, .. } => findings,
        }
    }

    pub fn into_findings(self) -> Vec<Finding> {
        match self {
            Self::Continue { findings } | Self::Done { findings, .. } => findings,
        }
    }
}

/// Step cursor plus opaque state of one check on one target.
pub struct Task {
    check: Arc<CheckDefinition>,
    ctx: Arc<RuntimeContext>,
    step: String,
    state: Value,
    steps_run: u32,
    done: bool,
}

impl Task {
    /// Create a task positioned at the check's initial step and state.
    pub fn new(check: Arc<CheckDefinition>, ctx: Arc<RuntimeContext>) -> Self {
        let step = check.steps().initial_step().to_string();
        let state = check.steps().initial_state().clone();
        Self {
            check,
            ctx,
            step,
            state,
            steps_run: 0,
            done: false,
        }
    }

    pub fn check_id(&self) -> &str {
        self.check.id()
    }

    /// Name of the step the next `advance` runs.
    pub fn current_step(&self) -> &str {
        &self.step
    }

    pub fn state(&self) -> &Value {
        &self.state
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Number of steps run so far.
    pub fn steps_run(&self) -> u32 {
        self.steps_run
    }

    /// Run the current step once.
    ///
    /// Findings come back attributed to this check. On `Done` the check's
    /// projected output, if any, is published to the target's dependency
    /// store, readable once the scheduler commits the batch. Step errors are
    /// returned unchanged and leave the task where it was.
    pub async fn advance(&mut self) -> Result<Advance, ScanError> {
        if self.done {
            return Err(ScanError::Other(anyhow::anyhow!(
                "Task for check '{}' is already done",
                self.check.id()
            )));
        }

        let step = self
            .check
            .steps()
            .get(&self.step)
            .ok_or_else(|| ScanError::UnknownStep {
                check: self.check.id().to_string(),
                step: self.step.clone(),
            })?;

        debug!(check = %self.check.id(), step = %self.step, "advancing task");
        let outcome = step.run(self.state.clone(), Arc::clone(&self.ctx)).await?;
        self.steps_run += 1;

        match outcome {
            StepOutcome::Continue {
                next_step,
                state,
                findings,
            } => {
                self.step = next_step;
                self.state = state;
                Ok(Advance::Continue {
                    findings: self.attribute(findings),
                })
            }
            StepOutcome::Done { state, findings } => {
                self.state = state;
                self.done = true;
                let published = match self.check.output(&self.state) {
                    Some(value) => {
                        self.ctx.dependencies().publish(self.check.id(), value)?;
                        true
                    }
                    None => false,
                };
                Ok(Advance::Done {
                    findings: self.attribute(findings),
                    published,
                })
            }
        }
    }

    fn attribute(&self, findings: Vec<Finding>) -> Vec<Finding> {
        findings
            .into_iter()
            .map(|f| f.attributed_to(self.check.id()))
            .collect()
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("check", &self.check.id())
            .field("step", &self.step)
            .field("steps_run", &self.steps_run)
            .field("done", &self.done)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{CheckSteps, StepOutcome};
    use crate::config::ScanConfig;
    use crate::engine::{RequestSender, TargetArtifacts, DependencyStore};
    use crate::findings::Severity;
    use crate::target::{Request, Response, ScanTarget};
    use async_trait::async_trait;
    use serde_json::json;

    struct NoNetwork;

    #[async_trait]
    impl RequestSender for NoNetwork {
        async fn send(&self, _request: Request) -> anyhow::Result<Response> {
            anyhow::bail!("no network in tests")
        }
    }

    fn context() -> Arc<RuntimeContext> {
        let target = Arc::new(ScanTarget::new(
            Request::get("example.com", "/").with_id("req-1"),
            None,
        ));
        Arc::new(RuntimeContext::new(
            Arc::clone(&target),
            Arc::new(NoNetwork),
            Arc::new(DependencyStore::new()),
            Arc::new(TargetArtifacts::new(target)),
            Arc::new(ScanConfig::default()),
        ))
    }

    fn counter_check() -> Arc<CheckDefinition> {
        let steps = CheckSteps::new("count", json!({"n": 0}))
            .step("count", |state, _ctx| async move {
                let n = state["n"].as_u64().unwrap_or(0) + 1;
                if n < 3 {
                    Ok(StepOutcome::next("count", json!({"n": n})))
                } else {
                    Ok(StepOutcome::next("report", json!({"n": n})))
                }
            })
            .step("report", |state, ctx| async move {
                let finding = Finding::new("counted", Severity::Info, ctx.target().id());
                Ok(StepOutcome::done(state).with_finding(finding))
            });
        Arc::new(
            CheckDefinition::builder("counter")
                .steps(steps)
                .publish_state()
                .build(),
        )
    }

    #[tokio::test]
    async fn test_advance_walks_steps_until_done() {
        let ctx = context();
        let mut task = counter_check().create_task(Arc::clone(&ctx));
        assert_eq!(task.current_step(), "count");

        let mut rounds = 0;
        let findings = loop {
            rounds += 1;
            let advance = task.advance().await.unwrap();
            if advance.is_done() {
                break advance.into_findings();
            }
            assert!(advance.findings().is_empty());
        };

        assert_eq!(rounds, 4);
        assert_eq!(task.steps_run(), 4);
        assert!(task.is_done());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].check_id(), Some("counter"));
        assert!(!ctx.dependencies().contains("counter"));
        ctx.dependencies().commit();
        assert_eq!(ctx.dependency("counter").unwrap(), json!({"n": 3}));
    }

    #[tokio::test]
    async fn test_done_without_output_publishes_nothing() {
        let ctx = context();
        let check = Arc::new(
            CheckDefinition::builder("quiet")
                .steps(CheckSteps::new("only", json!(1)).step("only", |state, _ctx| async move {
                    Ok(StepOutcome::done(state))
                }))
                .build(),
        );
        let mut task = check.create_task(Arc::clone(&ctx));

        let advance = task.advance().await.unwrap();
        assert_eq!(
            advance,
            Advance::Done {
                findings: vec![],
                published: false
            }
        );
        assert!(!ctx.dependencies().contains("quiet"));
    }

    #[tokio::test]
    async fn test_unknown_step() {
        let check = Arc::new(
            CheckDefinition::builder("broken")
                .steps(CheckSteps::new("start", json!({})).step("start", |state, _ctx| async move {
                    Ok(StepOutcome::next("nowhere", state))
                }))
                .build(),
        );
        let mut task = check.create_task(context());

        task.advance().await.unwrap();
        let err = task.advance().await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::UnknownStep { ref step, .. } if step == "nowhere"
        ));
    }

    #[tokio::test]
    async fn test_step_error_propagates_unchanged() {
        let check = Arc::new(
            CheckDefinition::builder("reader")
                .steps(CheckSteps::new("read", json!({})).step("read", |_state, ctx| async move {
                    let crawl = ctx.dependency("crawl")?;
                    Ok(StepOutcome::done(crawl))
                }))
                .build(),
        );
        let mut task = check.create_task(context());

        let err = task.advance().await.unwrap_err();
        assert!(err.is_unresolved_dependency());
        assert!(!task.is_done());
        assert_eq!(task.current_step(), "read");
    }

    #[tokio::test]
    async fn test_advance_after_done_fails() {
        let mut task = counter_check().create_task(context());
        while !task.advance().await.unwrap().is_done() {}
        assert!(matches!(task.advance().await, Err(ScanError::Other(_))));
    }
}
