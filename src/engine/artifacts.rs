//! Lazily computed, per-target artifacts shared between checks.
//!
//! Expensive derivations of a target (a parsed body, an extracted form list)
//! are computed once on first request and handed out as `Arc`s to every later
//! requester for the same target. A [`TargetArtifacts`] is built for one
//! target pass and dropped with it.

use crate::errors::ScanError;
use crate::target::ScanTarget;
use dashmap::DashMap;
use serde_json::Value;
use std::any::Any;
use std::sync::Arc;
use tracing::debug;

type Entry = Arc<dyn Any + Send + Sync>;

/// Cache key of the built-in parsed-JSON artifact.
pub const RESPONSE_JSON: &str = "response-json";

/// Artifacts derived from one target.
pub struct TargetArtifacts {
    target: Arc<ScanTarget>,
    entries: DashMap<String, Entry>,
}

impl TargetArtifacts {
    pub fn new(target: Arc<ScanTarget>) -> Self {
        Self {
            target,
            entries: DashMap::new(),
        }
    }

    /// Return the artifact stored under `key`, computing it on first use.
    ///
    /// `compute` runs only on a miss. The engine drives one step at a time, so a
    /// key is computed once per target; if two computations ever race, the
    /// first stored value wins and is returned to both callers.
    pub fn get_or_compute<T, F>(&self, key: &str, compute: F) -> Result<Arc<T>, ScanError>
    where
        T: Send + Sync + 'static,
        F: FnOnce(&ScanTarget) -> anyhow::Result<T>,
    {
        let cached = self.entries.get(key).map(|entry| Arc::clone(entry.value()));
        if let Some(entry) = cached {
            return Self::downcast(key, entry);
        }

        debug!(target_id = %self.target.id(), key, "computing artifact");
        let value: Entry = Arc::new(compute(&self.target).map_err(|source| ScanError::Artifact {
            key: key.to_string(),
            source,
        })?);

        let stored = Arc::clone(self.entries.entry(key.to_string()).or_insert(value).value());
        Self::downcast(key, stored)
    }

    /// The response body parsed as JSON, or `None` when there is no parseable body.
    pub fn response_json(&self) -> Result<Arc<Option<Value>>, ScanError> {
        self.get_or_compute(RESPONSE_JSON, |target| {
            Ok(target
                .response
                .as_ref()
                .and_then(|r| r.body.as_deref())
                .and_then(|body| serde_json::from_str(body).ok()))
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn downcast<T: Send + Sync + 'static>(key: &str, entry: Entry) -> Result<Arc<T>, ScanError> {
        entry.downcast::<T>().map_err(|_| ScanError::Artifact {
            key: key.to_string(),
            source: anyhow::anyhow!(
                "cached with a different type than {}",
                std::any::type_name::<T>()
            ),
        })
    }
}

impl std::fmt::Debug for TargetArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        f.debug_struct("TargetArtifacts")
            .field("target", &self.target.id())
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Request, Response};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn target(body: Option<&str>) -> Arc<ScanTarget> {
        let response = body.map(|b| Response::new(200).with_body(b));
        Arc::new(ScanTarget::new(
            Request::get("example.com", "/").with_id("t1"),
            response,
        ))
    }

    #[test]
    fn test_computes_once() {
        let artifacts = TargetArtifacts::new(target(None));
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = artifacts
                .get_or_compute("path-len", |t| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(t.request.path.len())
                })
                .unwrap();
            assert_eq!(*value, 1);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(artifacts.contains("path-len"));
    }

    #[test]
    fn test_failed_compute_is_not_cached() {
        let artifacts = TargetArtifacts::new(target(None));
        let err = artifacts
            .get_or_compute::<u32, _>("flaky", |_| anyhow::bail!("parse error"))
            .unwrap_err();
        assert!(matches!(err, ScanError::Artifact { ref key, .. } if key == "flaky"));
        assert!(!artifacts.contains("flaky"));

        let value = artifacts.get_or_compute("flaky", |_| Ok(7u32)).unwrap();
        assert_eq!(*value, 7);
    }

    #[test]
    fn test_type_mismatch() {
        let artifacts = TargetArtifacts::new(target(None));
        artifacts.get_or_compute("n", |_| Ok(1u32)).unwrap();
        let err = artifacts.get_or_compute("n", |_| Ok("x".to_string())).unwrap_err();
        assert!(matches!(err, ScanError::Artifact { .. }));
    }

    #[test]
    fn test_response_json() {
        let artifacts = TargetArtifacts::new(target(Some(r#"{"user": "admin"}"#)));
        let parsed = artifacts.response_json().unwrap();
        let value = Option::as_ref(&parsed).unwrap();
        assert_eq!(value["user"], "admin");

        let html = TargetArtifacts::new(target(Some("<html></html>")));
        assert!(html.response_json().unwrap().is_none());

        let empty = TargetArtifacts::new(target(None));
        assert!(empty.response_json().unwrap().is_none());
    }
}
