//! Scan configuration.
//!
//! Reads from `vigil.toml` when present and layers environment overrides on top.
//! Only `strength` and `fail_fast` are consulted by the scheduler; the remaining
//! fields are policy knobs for collaborators wrapping the engine (request
//! senders, timeout supervisors).
//!
//! # Configuration File Format
//!
//! ```toml
//! strength = "high"
//! fail_fast = true
//! concurrent_checks = 2
//! concurrent_requests = 5
//! requests_delay_ms = 100
//! check_timeout_secs = 30
//! scan_timeout_secs = 600
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File name looked up by [`ScanConfig::load_or_default`].
pub const CONFIG_FILE_NAME: &str = "vigil.toml";

/// How intrusive a scan is allowed to be.
///
/// Checks declare a minimum strength; a check only runs when the configured
/// strength is at least that high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strength {
    /// Passive and low-request checks only
    Low,
    /// Normal active scanning (default)
    #[default]
    Medium,
    /// Everything, including noisy or heavy checks
    High,
}

impl std::fmt::Display for Strength {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strength::Low => write!(f, "low"),
            Strength::Medium => write!(f, "medium"),
            Strength::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Strength {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Strength::Low),
            "medium" => Ok(Strength::Medium),
            "high" => Ok(Strength::High),
            _ => anyhow::bail!("Invalid strength '{}'. Valid values: low, medium, high", s),
        }
    }
}

/// Effective configuration for a scan job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Strength threshold gating which checks may run
    #[serde(default)]
    pub strength: Strength,
    /// Abort the whole job on the first task failure
    #[serde(default = "default_fail_fast")]
    pub fail_fast: bool,
    /// Checks a collaborator may tick in parallel (not enforced by the scheduler)
    #[serde(default = "default_concurrent_checks")]
    pub concurrent_checks: usize,
    /// Requests a sender may have in flight
    #[serde(default = "default_concurrent_requests")]
    pub concurrent_requests: usize,
    /// Delay a sender should observe between requests
    #[serde(default)]
    pub requests_delay_ms: u64,
    /// Per-check timeout for supervisors layered above the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_timeout_secs: Option<u64>,
    /// Whole-scan timeout for supervisors layered above the engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_timeout_secs: Option<u64>,
}

fn default_fail_fast() -> bool {
    true
}

fn default_concurrent_checks() -> usize {
    2
}

fn default_concurrent_requests() -> usize {
    5
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            strength: Strength::default(),
            fail_fast: default_fail_fast(),
            concurrent_checks: default_concurrent_checks(),
            concurrent_requests: default_concurrent_requests(),
            requests_delay_ms: 0,
            check_timeout_secs: None,
            scan_timeout_secs: None,
        }
    }
}

impl ScanConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse vigil.toml")
    }

    /// Load `vigil.toml` from the given directory.
    /// Returns default configuration if the file doesn't exist.
    pub fn load_or_default(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize vigil.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Apply `VIGIL_STRENGTH` and `VIGIL_FAIL_FAST` on top of the file settings.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup`, keyed by environment variable name.
    ///
    /// `VIGIL_FAIL_FAST` is disabled by `false` or `0`; any other value enables it.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("VIGIL_STRENGTH") {
            self.strength = value
                .parse()
                .context("Invalid VIGIL_STRENGTH environment variable")?;
        }
        if let Some(value) = lookup("VIGIL_FAIL_FAST") {
            self.fail_fast = value != "false" && value != "0";
        }
        Ok(self)
    }

    /// Set the strength threshold.
    pub fn with_strength(mut self, strength: Strength) -> Self {
        self.strength = strength;
        self
    }

    /// Enable or disable fail-fast mode.
    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Check whether a check gated at `min` may run under this configuration.
    pub fn allows(&self, min: Strength) -> bool {
        min <= self.strength
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_strength_ordering() {
        assert!(Strength::Low < Strength::Medium);
        assert!(Strength::Medium < Strength::High);
    }

    #[test]
    fn test_strength_from_str() {
        assert_eq!("HIGH".parse::<Strength>().unwrap(), Strength::High);
        assert_eq!("low".parse::<Strength>().unwrap(), Strength::Low);
        let err = "extreme".parse::<Strength>().unwrap_err();
        assert!(err.to_string().contains("Valid values"));
    }

    #[test]
    fn test_parse_empty_uses_defaults() {
        let config = ScanConfig::parse("").unwrap();
        assert_eq!(config, ScanConfig::default());
        assert_eq!(config.strength, Strength::Medium);
        assert!(config.fail_fast);
        assert_eq!(config.concurrent_checks, 2);
    }

    #[test]
    fn test_parse_full_file() {
        let config = ScanConfig::parse(
            r#"
strength = "high"
fail_fast = false
concurrent_checks = 4
concurrent_requests = 10
requests_delay_ms = 250
check_timeout_secs = 30
"#,
        )
        .unwrap();
        assert_eq!(config.strength, Strength::High);
        assert!(!config.fail_fast);
        assert_eq!(config.concurrent_checks, 4);
        assert_eq!(config.concurrent_requests, 10);
        assert_eq!(config.requests_delay_ms, 250);
        assert_eq!(config.check_timeout_secs, Some(30));
        assert_eq!(config.scan_timeout_secs, None);
    }

    #[test]
    fn test_parse_invalid_strength() {
        let result = ScanConfig::parse(r#"strength = "extreme""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = ScanConfig::default().with_strength(Strength::Low);
        config.save(&path).unwrap();

        let loaded = ScanConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempdir().unwrap();
        let config = ScanConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config, ScanConfig::default());
    }

    #[test]
    fn test_allows() {
        let config = ScanConfig::default().with_strength(Strength::Medium);
        assert!(config.allows(Strength::Low));
        assert!(config.allows(Strength::Medium));
        assert!(!config.allows(Strength::High));
    }

    #[test]
    fn test_overrides_absent_leave_config_unchanged() {
        let config = ScanConfig::default().with_strength(Strength::Low);
        let overridden = config.clone().with_overrides_from(vars(&[])).unwrap();
        assert_eq!(overridden, config);
    }

    #[test]
    fn test_strength_override() {
        let config = ScanConfig::default()
            .with_strength(Strength::Low)
            .with_overrides_from(vars(&[("VIGIL_STRENGTH", "HIGH")]))
            .unwrap();
        assert_eq!(config.strength, Strength::High);
        assert!(config.fail_fast);
    }

    #[test]
    fn test_fail_fast_override() {
        for value in ["false", "0"] {
            let config = ScanConfig::default()
                .with_overrides_from(vars(&[("VIGIL_FAIL_FAST", value)]))
                .unwrap();
            assert!(!config.fail_fast, "{value} should disable fail_fast");
        }

        let config = ScanConfig::default()
            .with_fail_fast(false)
            .with_overrides_from(vars(&[("VIGIL_FAIL_FAST", "1")]))
            .unwrap();
        assert!(config.fail_fast);
    }

    #[test]
    fn test_invalid_strength_override() {
        let err = ScanConfig::default()
            .with_overrides_from(vars(&[("VIGIL_STRENGTH", "extreme"), ("VIGIL_FAIL_FAST", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("Invalid VIGIL_STRENGTH"));
        assert!(format!("{err:#}").contains("Valid values: low, medium, high"));
    }
}
