//! Check definitions.
//!
//! A [`CheckDefinition`] bundles a check's metadata, its applicability rules
//! (`when`, minimum strength, dedupe key), the ids of checks whose output it
//! reads, and the step state machine a [`Task`] runs. Definitions are
//! immutable once built.
//!
//! ## Example
//!
//! ```
//! use vigil::check::{CheckDefinition, CheckSteps, CheckType, StepOutcome};
//! use vigil::config::Strength;
//! use serde_json::json;
//!
//! let check = CheckDefinition::builder("cors-misconfig")
//!     .name("CORS misconfiguration")
//!     .check_type(CheckType::Active)
//!     .min_strength(Strength::Medium)
//!     .dedupe_key(|ctx| ctx.target().host_path_key())
//!     .steps(CheckSteps::new("fuzz", json!({})).step("fuzz", |state, _ctx| async move {
//!         Ok(StepOutcome::done(state))
//!     }))
//!     .build();
//!
//! assert_eq!(check.id(), "cors-misconfig");
//! ```

mod registry;
mod step;

pub use registry::{CheckRegistry, SelectOptions};
pub use step::{CheckSteps, Step, StepOutcome, StepResult};

use crate::config::Strength;
use crate::engine::{RuntimeContext, Task};
use crate::findings::Severity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Decides whether a check applies to a target.
pub type WhenFn = Arc<dyn Fn(&RuntimeContext) -> bool + Send + Sync>;
/// Computes the dedupe key of a target for a check.
pub type DedupeKeyFn = Arc<dyn Fn(&RuntimeContext) -> String + Send + Sync>;
/// Projects a task's final state into the value published for dependents.
pub type OutputFn = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Whether a check sends its own traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    /// Sends derived requests to the target
    #[default]
    Active,
    /// Only inspects the existing request/response
    Passive,
}

impl std::fmt::Display for CheckType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckType::Active => write!(f, "active"),
            CheckType::Passive => write!(f, "passive"),
        }
    }
}

/// Descriptive data about a check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckMetadata {
    /// Unique id; the join key for dependencies
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub check_type: CheckType,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Severities this check may report
    #[serde(default)]
    pub severities: Vec<Severity>,
    /// Lowest configured strength at which this check may run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_strength: Option<Strength>,
    /// Ids of checks whose output must be published first
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A registered check.
#[derive(Clone)]
pub struct CheckDefinition {
    metadata: CheckMetadata,
    when: Option<WhenFn>,
    dedupe_key: Option<DedupeKeyFn>,
    output: Option<OutputFn>,
    steps: Arc<CheckSteps>,
}

impl CheckDefinition {
    /// Start building a check with the given id.
    pub fn builder(id: impl Into<String>) -> CheckBuilder {
        let id = id.into();
        CheckBuilder {
            definition: CheckDefinition {
                metadata: CheckMetadata {
                    name: id.clone(),
                    id,
                    ..Default::default()
                },
                when: None,
                dedupe_key: None,
                output: None,
                steps: Arc::new(CheckSteps::default()),
            },
        }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn metadata(&self) -> &CheckMetadata {
        &self.metadata
    }

    pub fn depends_on(&self) -> &[String] {
        &self.metadata.depends_on
    }

    pub fn min_strength(&self) -> Option<Strength> {
        self.metadata.min_strength
    }

    pub fn steps(&self) -> &CheckSteps {
        &self.steps
    }

    /// Evaluate the `when` predicate. Checks without one apply everywhere.
    pub fn applies_to(&self, ctx: &RuntimeContext) -> bool {
        self.when.as_ref().is_none_or(|when| when(ctx))
    }

    /// Compute the dedupe key, if the check declares one.
    pub fn dedupe_key(&self, ctx: &RuntimeContext) -> Option<String> {
        self.dedupe_key.as_ref().map(|key| key(ctx))
    }

    /// Project a final state into the value to publish, if any.
    pub fn output(&self, final_state: &Value) -> Option<Value> {
        self.output.as_ref().and_then(|output| output(final_state))
    }

    /// Instantiate a task of this check bound to one target's context.
    pub fn create_task(self: &Arc<Self>, ctx: Arc<RuntimeContext>) -> Task {
        Task::new(Arc::clone(self), ctx)
    }
}

impl std::fmt::Debug for CheckDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckDefinition")
            .field("metadata", &self.metadata)
            .field("when", &self.when.is_some())
            .field("dedupe_key", &self.dedupe_key.is_some())
            .field("output", &self.output.is_some())
            .field("steps", &self.steps)
            .finish()
    }
}

/// Builder for [`CheckDefinition`].
pub struct CheckBuilder {
    definition: CheckDefinition,
}

impl CheckBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.definition.metadata.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.definition.metadata.description = description.into();
        self
    }

    pub fn check_type(mut self, check_type: CheckType) -> Self {
        self.definition.metadata.check_type = check_type;
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition.metadata.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn severities(mut self, severities: impl IntoIterator<Item = Severity>) -> Self {
        self.definition.metadata.severities = severities.into_iter().collect();
        self
    }

    pub fn min_strength(mut self, strength: Strength) -> Self {
        self.definition.metadata.min_strength = Some(strength);
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.definition.metadata.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn when(mut self, when: impl Fn(&RuntimeContext) -> bool + Send + Sync + 'static) -> Self {
        self.definition.when = Some(Arc::new(when));
        self
    }

    pub fn dedupe_key(
        mut self,
        key: impl Fn(&RuntimeContext) -> String + Send + Sync + 'static,
    ) -> Self {
        self.definition.dedupe_key = Some(Arc::new(key));
        self
    }

    pub fn output(
        mut self,
        output: impl Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    ) -> Self {
        self.definition.output = Some(Arc::new(output));
        self
    }

    /// Publish the final state unchanged as the check's output.
    pub fn publish_state(self) -> Self {
        self.output(|state| Some(state.clone()))
    }

    pub fn steps(mut self, steps: CheckSteps) -> Self {
        self.definition.steps = Arc::new(steps);
        self
    }

    pub fn build(self) -> CheckDefinition {
        self.definition
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_defaults() {
        let check = CheckDefinition::builder("x").build();
        assert_eq!(check.id(), "x");
        assert_eq!(check.metadata().name, "x");
        assert_eq!(check.metadata().check_type, CheckType::Active);
        assert!(check.depends_on().is_empty());
        assert!(check.min_strength().is_none());
        assert_eq!(check.output(&json!({"a": 1})), None);
    }

    #[test]
    fn test_builder_metadata() {
        let check = CheckDefinition::builder("sqli")
            .name("SQL injection")
            .description("Error-based SQL injection")
            .check_type(CheckType::Active)
            .tags(["injection", "database"])
            .severities([Severity::High, Severity::Critical])
            .min_strength(Strength::High)
            .depends_on(["param-discovery"])
            .build();

        let meta = check.metadata();
        assert_eq!(meta.name, "SQL injection");
        assert_eq!(meta.tags, vec!["injection", "database"]);
        assert_eq!(meta.severities.len(), 2);
        assert_eq!(check.min_strength(), Some(Strength::High));
        assert_eq!(check.depends_on(), &["param-discovery".to_string()]);
    }

    #[test]
    fn test_output_projection() {
        let check = CheckDefinition::builder("crawler")
            .output(|state| state.get("paths").cloned())
            .build();
        assert_eq!(
            check.output(&json!({"paths": ["/a"], "cursor": 3})),
            Some(json!(["/a"]))
        );
        assert_eq!(check.output(&json!({})), None);

        let identity = CheckDefinition::builder("id").publish_state().build();
        assert_eq!(identity.output(&json!(7)), Some(json!(7)));
    }

    #[test]
    fn test_metadata_serde_uses_type_key() {
        let check = CheckDefinition::builder("headers")
            .check_type(CheckType::Passive)
            .build();
        let json = serde_json::to_value(check.metadata()).unwrap();
        assert_eq!(json["type"], "passive");
    }
}
