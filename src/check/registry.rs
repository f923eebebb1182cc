//! Registry of known check definitions with filtered selection.

use super::{CheckDefinition, CheckType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Filters applied by [`CheckRegistry::select`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOptions {
    /// Keep only checks of this type
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub check_type: Option<CheckType>,
    /// Whitelist of check ids; `None` keeps everything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    /// Check ids to drop
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl SelectOptions {
    pub fn with_type(mut self, check_type: CheckType) -> Self {
        self.check_type = Some(check_type);
        self
    }

    pub fn with_include<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_exclude<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = ids.into_iter().map(Into::into).collect();
        self
    }
}

/// Holds every known check in registration order.
///
/// Ids are not checked for uniqueness here; the batcher rejects duplicates when
/// a job is built.
#[derive(Debug, Default, Clone)]
pub struct CheckRegistry {
    checks: Vec<Arc<CheckDefinition>>,
}

impl CheckRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append definitions.
    pub fn register(&mut self, definitions: impl IntoIterator<Item = CheckDefinition>) {
        self.checks
            .extend(definitions.into_iter().map(Arc::new));
    }

    /// Select checks: include-list first, then type, then exclude-list.
    pub fn select(&self, options: &SelectOptions) -> Vec<Arc<CheckDefinition>> {
        self.checks
            .iter()
            .filter(|check| {
                options
                    .include
                    .as_ref()
                    .is_none_or(|include| include.iter().any(|id| id == check.id()))
            })
            .filter(|check| {
                options
                    .check_type
                    .is_none_or(|t| check.metadata().check_type == t)
            })
            .filter(|check| !options.exclude.iter().any(|id| id == check.id()))
            .cloned()
            .collect()
    }

    /// All registered checks, unfiltered.
    pub fn all(&self) -> Vec<Arc<CheckDefinition>> {
        self.checks.clone()
    }

    /// First check registered under `id`.
    pub fn get(&self, id: &str) -> Option<Arc<CheckDefinition>> {
        self.checks.iter().find(|c| c.id() == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}
