//! Per-target store of published check outputs.

use crate::errors::ScanError;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Write-once map from check id to the value that check published.
///
/// One store exists per target pass and is dropped with it, so outputs never
/// leak across targets. Published values are staged until the scheduler
/// commits them at the end of the batch, so tasks only ever read outputs of
/// earlier batches. Checks get read access only.
#[derive(Debug, Default)]
pub struct DependencyStore {
    outputs: DashMap<String, Value>,
    staged: DashMap<String, Value>,
}

impl DependencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the output of `check`. A check publishes at most once per target.
    pub(crate) fn publish(&self, check: &str, value: Value) -> Result<(), ScanError> {
        if self.outputs.contains_key(check) {
            return Err(ScanError::AlreadyPublished {
                check: check.to_string(),
            });
        }
        match self.staged.entry(check.to_string()) {
            Entry::Occupied(_) => Err(ScanError::AlreadyPublished {
                check: check.to_string(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(value);
                Ok(())
            }
        }
    }

    /// Make every staged output readable. Returns how many were committed.
    pub(crate) fn commit(&self) -> usize {
        let checks: Vec<String> = self.staged.iter().map(|e| e.key().clone()).collect();
        let mut committed = 0;
        for check in checks {
            if let Some((check, value)) = self.staged.remove(&check) {
                self.outputs.insert(check, value);
                committed += 1;
            }
        }
        committed
    }

    /// Read the output of `check`, failing if it has not been published.
    pub fn get(&self, check: &str) -> Result<Value, ScanError> {
        self.outputs
            .get(check)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ScanError::UnresolvedDependency {
                dependency: check.to_string(),
            })
    }

    /// Read and deserialize the output of `check`.
    pub fn get_as<T: DeserializeOwned>(&self, check: &str) -> Result<T, ScanError> {
        let value = self.get(check)?;
        serde_json::from_value(value).map_err(|e| {
            ScanError::Other(
                anyhow::Error::new(e)
                    .context(format!("Output of check '{}' has an unexpected shape", check)),
            )
        })
    }

    /// Check whether the output of `check` is readable.
    pub fn contains(&self, check: &str) -> bool {
        self.outputs.contains_key(check)
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}
