//! The scan job: walks targets, batches and rounds, driving tasks to completion.

use crate::check::CheckDefinition;
use crate::config::ScanConfig;
use crate::dag::{Batcher, ExecutionPlan};
use crate::engine::artifacts::TargetArtifacts;
use crate::engine::context::{RequestSender, RuntimeContext};
use crate::engine::dedupe::DedupeCache;
use crate::engine::events::{ScanEvent, SkipReason};
use crate::engine::store::DependencyStore;
use crate::engine::task::Task;
use crate::errors::{BatchError, ScanError};
use crate::findings::Finding;
use crate::target::ScanTarget;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Lifecycle of a scan job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Constructed, not started
    #[default]
    Idle,
    /// `start()` is processing targets
    Running,
    /// Halted at a cancellation check-point
    Stopped,
    /// Every target was processed
    Completed,
    /// A task failure aborted the job
    Failed,
}

impl JobState {
    /// Check if the job can no longer make progress.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Completed | Self::Failed)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Idle => write!(f, "idle"),
            JobState::Running => write!(f, "running"),
            JobState::Stopped => write!(f, "stopped"),
            JobState::Completed => write!(f, "completed"),
            JobState::Failed => write!(f, "failed"),
        }
    }
}

/// Cloneable handle that can stop a job from elsewhere, including from inside a step.
#[derive(Debug, Clone, Default)]
pub struct ScanHandle {
    cancel: CancellationToken,
}

impl ScanHandle {
    /// Request the job to stop at its next check-point.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Runs a fixed set of checks over a fixed list of targets.
pub struct ScanJob {
    plan: ExecutionPlan,
    targets: Vec<Arc<ScanTarget>>,
    sender: Arc<dyn RequestSender>,
    config: Arc<ScanConfig>,
    dedupe: DedupeCache,
    findings: Vec<Finding>,
    state: JobState,
    handle: ScanHandle,
    event_tx: Option<mpsc::Sender<ScanEvent>>,
}

impl ScanJob {
    /// Create a job, computing the batch order up front.
    ///
    /// Unknown or circular dependencies fail here, before any task exists.
    pub fn new(
        checks: Vec<Arc<CheckDefinition>>,
        targets: Vec<ScanTarget>,
        sender: Arc<dyn RequestSender>,
        config: ScanConfig,
    ) -> Result<Self, BatchError> {
        let plan = Batcher::plan(checks)?;
        debug!(plan = %plan, "execution plan built");

        Ok(Self {
            plan,
            targets: targets.into_iter().map(Arc::new).collect(),
            sender,
            config: Arc::new(config),
            dedupe: DedupeCache::new(),
            findings: Vec::new(),
            state: JobState::Idle,
            handle: ScanHandle::default(),
            event_tx: None,
        })
    }

    /// Set the event channel for progress updates.
    ///
    /// Events are sent without waiting: when the channel is full the event is
    /// dropped and a debug line is logged. Size the channel for the expected
    /// volume if every event matters.
    pub fn with_event_channel(mut self, tx: mpsc::Sender<ScanEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// Findings accumulated so far, in the order steps reported them.
    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    /// A handle that stops this job.
    pub fn handle(&self) -> ScanHandle {
        self.handle.clone()
    }

    /// Stop the job at its next check-point.
    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.handle.is_stopped()
    }

    /// Process every target and return the accumulated findings.
    ///
    /// Returns early with the findings gathered so far once the job is
    /// stopped. With `fail_fast` (the default) the first task error aborts the
    /// job and is returned unchanged.
    pub async fn start(&mut self) -> Result<Vec<Finding>, ScanError> {
        if self.state != JobState::Idle {
            return Err(ScanError::Other(anyhow::anyhow!(
                "Scan job cannot start: it is {}",
                self.state
            )));
        }

        self.state = JobState::Running;
        info!(
            targets = self.targets.len(),
            batches = self.plan.len(),
            checks = self.plan.check_count(),
            strength = %self.config.strength,
            "starting scan job"
        );

        match self.run().await {
            Ok(()) if self.is_stopped() => {
                self.state = JobState::Stopped;
                info!(findings = self.findings.len(), "scan job stopped");
                self.emit(ScanEvent::JobStopped {
                    findings: self.findings.len(),
                });
                Ok(self.findings.clone())
            }
            Ok(()) => {
                self.state = JobState::Completed;
                info!(findings = self.findings.len(), "scan job completed");
                self.emit(ScanEvent::JobCompleted {
                    findings: self.findings.len(),
                });
                Ok(self.findings.clone())
            }
            Err(e) => {
                self.state = JobState::Failed;
                Err(e)
            }
        }
    }

    async fn run(&mut self) -> Result<(), ScanError> {
        let targets = self.targets.clone();
        let batches: Vec<Vec<Arc<CheckDefinition>>> = self
            .plan
            .batches()
            .iter()
            .map(|batch| batch.checks().to_vec())
            .collect();

        for (index, target) in targets.iter().enumerate() {
            if self.is_stopped() {
                return Ok(());
            }
            self.run_target(index, target, &batches).await?;
        }
        Ok(())
    }

    async fn run_target(
        &mut self,
        index: usize,
        target: &Arc<ScanTarget>,
        batches: &[Vec<Arc<CheckDefinition>>],
    ) -> Result<(), ScanError> {
        let target_id = target.id().to_string();
        let before = self.findings.len();
        info!(target_id = %target_id, index, url = %target.request.url(), "scanning target");
        self.emit(ScanEvent::TargetStarted {
            target: target_id.clone(),
            index,
        });

        // Store and artifacts belong to this pass and are dropped with it.
        let ctx = Arc::new(RuntimeContext::new(
            Arc::clone(target),
            Arc::clone(&self.sender),
            Arc::new(DependencyStore::new()),
            Arc::new(TargetArtifacts::new(Arc::clone(target))),
            Arc::clone(&self.config),
        ));

        for (batch, checks) in batches.iter().enumerate() {
            if self.is_stopped() {
                return Ok(());
            }
            debug!(target_id = %target_id, batch, checks = checks.len(), "starting batch");
            self.emit(ScanEvent::BatchStarted {
                target: target_id.clone(),
                batch,
                checks: checks.iter().map(|c| c.id().to_string()).collect(),
            });

            let tasks = self.instantiate(&ctx, checks);
            self.run_rounds(&target_id, tasks).await?;

            // Outputs of this batch become readable from the next one on.
            let published = ctx.dependencies().commit();
            debug!(target_id = %target_id, batch, published, "batch finished");
        }

        if !self.is_stopped() {
            let findings = self.findings.len() - before;
            debug!(target_id = %target_id, findings, "target finished");
            self.emit(ScanEvent::TargetFinished {
                target: target_id,
                findings,
            });
        }
        Ok(())
    }

    /// Create one task per check that passes every gate.
    fn instantiate(&mut self, ctx: &Arc<RuntimeContext>, checks: &[Arc<CheckDefinition>]) -> Vec<Task> {
        let target_id = ctx.target().id();
        let mut tasks = Vec::with_capacity(checks.len());

        for check in checks {
            if let Some(reason) = self.gate(ctx, check) {
                debug!(target_id, check = check.id(), %reason, "check skipped");
                self.emit(ScanEvent::CheckSkipped {
                    target: target_id.to_string(),
                    check: check.id().to_string(),
                    reason,
                });
                continue;
            }

            self.emit(ScanEvent::TaskStarted {
                target: target_id.to_string(),
                check: check.id().to_string(),
            });
            tasks.push(check.create_task(Arc::clone(ctx)));
        }
        tasks
    }

    /// Evaluate strength, `when` and dedupe in that order, stopping at the first rejection.
    fn gate(&mut self, ctx: &RuntimeContext, check: &CheckDefinition) -> Option<SkipReason> {
        if check
            .min_strength()
            .is_some_and(|min| !self.config.allows(min))
        {
            return Some(SkipReason::Strength);
        }
        if !check.applies_to(ctx) {
            return Some(SkipReason::When);
        }
        match check.dedupe_key(ctx) {
            Some(key) if !self.dedupe.admit(check.id(), &key) => Some(SkipReason::Duplicate),
            _ => None,
        }
    }

    /// Advance every active task once per round, in order, until none remain.
    async fn run_rounds(&mut self, target_id: &str, mut tasks: Vec<Task>) -> Result<(), ScanError> {
        while !tasks.is_empty() {
            if self.is_stopped() {
                return Ok(());
            }

            let mut active = Vec::with_capacity(tasks.len());
            for mut task in tasks {
                match task.advance().await {
                    Ok(advance) => {
                        let done = advance.is_done();
                        self.collect(advance.into_findings());
                        if done {
                            debug!(target_id, check = task.check_id(), steps = task.steps_run(), "task done");
                            self.emit(ScanEvent::TaskFinished {
                                target: target_id.to_string(),
                                check: task.check_id().to_string(),
                                steps: task.steps_run(),
                            });
                        } else {
                            active.push(task);
                        }
                    }
                    Err(e) => self.task_failed(target_id, &task, e)?,
                }
            }
            tasks = active;
        }
        Ok(())
    }

    /// Report a task failure; re-raise it unless failures are isolated.
    fn task_failed(&mut self, target_id: &str, task: &Task, error: ScanError) -> Result<(), ScanError> {
        warn!(
            target_id,
            check = task.check_id(),
            step = task.current_step(),
            error = %error,
            "task failed"
        );
        self.emit(ScanEvent::TaskFailed {
            target: target_id.to_string(),
            check: task.check_id().to_string(),
            error: error.to_string(),
        });

        if self.config.fail_fast {
            Err(error)
        } else {
            Ok(())
        }
    }

    fn collect(&mut self, findings: Vec<Finding>) {
        for finding in findings {
            debug!(finding = %finding, "finding reported");
            self.emit(ScanEvent::FindingReported {
                finding: finding.clone(),
            });
            self.findings.push(finding);
        }
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(ref tx) = self.event_tx {
            if let Err(e) = tx.try_send(event) {
                debug!(error = %e, "scan event dropped");
            }
        }
    }
}

impl std::fmt::Debug for ScanJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanJob")
            .field("plan", &self.plan.to_string())
            .field("targets", &self.targets.len())
            .field("findings", &self.findings.len())
            .field("state", &self.state)
            .finish()
    }
}
