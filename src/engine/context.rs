//! The runtime context shared by every check running against one target.

use crate::config::ScanConfig;
use crate::engine::artifacts::TargetArtifacts;
use crate::engine::store::DependencyStore;
use crate::errors::ScanError;
use crate::target::{Request, Response, ScanTarget};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Capability to send a request and await its response.
///
/// Timeouts, retries, rate limits and concurrency are the sender's business;
/// the engine only awaits the result.
#[async_trait]
pub trait RequestSender: Send + Sync {
    async fn send(&self, request: Request) -> anyhow::Result<Response>;
}

/// Target plus the collaborators checks may use while scanning it.
///
/// Built once per target and shared by all of that target's tasks.
pub struct RuntimeContext {
    target: Arc<ScanTarget>,
    sender: Arc<dyn RequestSender>,
    dependencies: Arc<DependencyStore>,
    artifacts: Arc<TargetArtifacts>,
    config: Arc<ScanConfig>,
}

impl RuntimeContext {
    pub fn new(
        target: Arc<ScanTarget>,
        sender: Arc<dyn RequestSender>,
        dependencies: Arc<DependencyStore>,
        artifacts: Arc<TargetArtifacts>,
        config: Arc<ScanConfig>,
    ) -> Self {
        Self {
            target,
            sender,
            dependencies,
            artifacts,
            config,
        }
    }

    pub fn target(&self) -> &ScanTarget {
        &self.target
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Send a request through the injected sender.
    pub async fn send(&self, request: Request) -> Result<Response, ScanError> {
        debug!(request_id = %request.id, url = %request.url(), "sending request");
        self.sender.send(request).await.map_err(ScanError::Request)
    }

    /// Output published by `check` for this target.
    pub fn dependency(&self, check: &str) -> Result<Value, ScanError> {
        self.dependencies.get(check)
    }

    /// Output published by `check`, deserialized.
    pub fn dependency_as<T: DeserializeOwned>(&self, check: &str) -> Result<T, ScanError> {
        self.dependencies.get_as(check)
    }

    /// Read-only view of the outputs published by earlier batches.
    pub fn dependencies(&self) -> &DependencyStore {
        &self.dependencies
    }

    pub fn artifacts(&self) -> &TargetArtifacts {
        &self.artifacts
    }
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("target", &self.target.id())
            .field("dependencies", &self.dependencies.len())
            .field("artifacts", &self.artifacts)
            .field("config", &self.config)
            .finish()
    }
}
