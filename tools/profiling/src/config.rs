#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Configuration for the example routines

use crate::error::{DemoError, Result};
use crate::facility::{Facilities, Facility};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Upper bound for any workload size
const MAX_WORKLOAD_LEN: u64 = 50_000_000;

/// Upper bound for report lengths
const MAX_REPORT_ENTRIES: usize = 100;

/// Upper bound for the RSS settle pause
const MAX_SETTLE_PAUSE_MS: u64 = 10_000;

/// Workload sizes, report lengths and facility switches for the examples
///
/// Every field falls back to its default when missing from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    /// Values checked by the defensive-check example
    assertion_values: Vec<f64>,

    /// Upper bound (exclusive) of the sum-of-squares range
    sum_range: u64,

    /// Entries shown in the call-graph report
    callgraph_top: usize,

    /// Length of the list built by the allocation-tracing example
    alloc_list_len: u64,

    /// Length of the map built by the allocation-tracing example
    alloc_map_len: u64,

    /// Sites shown per allocation report
    alloc_top: usize,

    /// Element count for the line-level memory examples
    line_workload_len: u64,

    /// Length of the list allocated by the RSS example
    rss_list_len: u64,

    /// Pause after allocating/releasing so RSS samples settle
    settle_pause_ms: u64,

    /// Facilities switched off at runtime
    disabled_facilities: Vec<Facility>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            assertion_values: vec![1.5, 2.3, 0.7, -0.001, 4.4],
            sum_range: 100_000,
            callgraph_top: 10,
            alloc_list_len: 300_000,
            alloc_map_len: 150_000,
            alloc_top: 10,
            line_workload_len: 500_000,
            rss_list_len: 300_000,
            settle_pause_ms: 300,
            disabled_facilities: Vec::new(),
        }
    }
}

impl DemoConfig {
    /// Load and validate a TOML config file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The file cannot be read
    /// - The TOML is malformed or has unknown keys
    /// - Any value fails validation
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| DemoError::config_read_failed(path, e.to_string()))?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate a TOML config document
    ///
    /// # Errors
    ///
    /// Returns error if the TOML is malformed or any value fails validation
    ///
    /// # Examples
    ///
    /// ```
    /// # use profiling_examples::DemoConfig;
    /// let config = DemoConfig::from_toml_str("callgraph_top = 5\nsettle_pause_ms = 0\n");
    /// assert!(config.is_ok());
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| DemoError::ConfigParseFailed(e.to_string()))?;
        config.validate()
    }

    /// Check every field against its bounds
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::InvalidConfig`] naming the first offending field
    pub fn validate(self) -> Result<Self> {
        if self.assertion_values.is_empty() {
            return Err(DemoError::InvalidConfig(
                "assertion_values cannot be empty".to_string(),
            ));
        }
        if self.assertion_values.iter().any(|v| !v.is_finite()) {
            return Err(DemoError::InvalidConfig(
                "assertion_values must be finite".to_string(),
            ));
        }

        [
            ("sum_range", self.sum_range),
            ("alloc_list_len", self.alloc_list_len),
            ("alloc_map_len", self.alloc_map_len),
            ("line_workload_len", self.line_workload_len),
            ("rss_list_len", self.rss_list_len),
        ]
        .into_iter()
        .try_for_each(|(name, len)| Self::validate_workload_len(name, len))?;

        [
            ("callgraph_top", self.callgraph_top),
            ("alloc_top", self.alloc_top),
        ]
        .into_iter()
        .try_for_each(|(name, n)| Self::validate_report_entries(name, n))?;

        if self.settle_pause_ms > MAX_SETTLE_PAUSE_MS {
            return Err(DemoError::InvalidConfig(format!(
                "settle_pause_ms {} exceeds maximum of {MAX_SETTLE_PAUSE_MS}",
                self.settle_pause_ms
            )));
        }

        Ok(self)
    }

    fn validate_workload_len(name: &str, len: u64) -> Result<()> {
        if len == 0 || len > MAX_WORKLOAD_LEN {
            Err(DemoError::InvalidConfig(format!(
                "{name} must be in 1..={MAX_WORKLOAD_LEN}, got {len}"
            )))
        } else {
            Ok(())
        }
    }

    fn validate_report_entries(name: &str, n: usize) -> Result<()> {
        if n == 0 || n > MAX_REPORT_ENTRIES {
            Err(DemoError::InvalidConfig(format!(
                "{name} must be in 1..={MAX_REPORT_ENTRIES}, got {n}"
            )))
        } else {
            Ok(())
        }
    }

    /// Replace the defensive-check values
    #[must_use]
    pub fn with_assertion_values(mut self, values: Vec<f64>) -> Self {
        self.assertion_values = values;
        self
    }

    /// Set the sum-of-squares range
    #[must_use]
    pub const fn with_sum_range(mut self, sum_range: u64) -> Self {
        self.sum_range = sum_range;
        self
    }

    /// Set the call-graph report length
    #[must_use]
    pub const fn with_callgraph_top(mut self, top: usize) -> Self {
        self.callgraph_top = top;
        self
    }

    /// Set the allocation workload sizes
    #[must_use]
    pub const fn with_alloc_lens(mut self, list_len: u64, map_len: u64) -> Self {
        self.alloc_list_len = list_len;
        self.alloc_map_len = map_len;
        self
    }

    /// Set the line-level workload size
    #[must_use]
    pub const fn with_line_workload_len(mut self, len: u64) -> Self {
        self.line_workload_len = len;
        self
    }

    /// Set the RSS workload size
    #[must_use]
    pub const fn with_rss_list_len(mut self, len: u64) -> Self {
        self.rss_list_len = len;
        self
    }

    /// Set the RSS settle pause; out-of-range pauses saturate and are
    /// rejected by [`DemoConfig::validate`]
    #[must_use]
    pub fn with_settle_pause(mut self, pause: Duration) -> Self {
        self.settle_pause_ms = u64::try_from(pause.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Switch off a facility
    #[must_use]
    pub fn with_disabled_facility(mut self, facility: Facility) -> Self {
        if !self.disabled_facilities.contains(&facility) {
            self.disabled_facilities.push(facility);
        }
        self
    }

    #[must_use]
    pub fn assertion_values(&self) -> &[f64] {
        &self.assertion_values
    }

    #[must_use]
    pub const fn sum_range(&self) -> u64 {
        self.sum_range
    }

    #[must_use]
    pub const fn callgraph_top(&self) -> usize {
        self.callgraph_top
    }

    #[must_use]
    pub const fn alloc_list_len(&self) -> u64 {
        self.alloc_list_len
    }

    #[must_use]
    pub const fn alloc_map_len(&self) -> u64 {
        self.alloc_map_len
    }

    #[must_use]
    pub const fn alloc_top(&self) -> usize {
        self.alloc_top
    }

    #[must_use]
    pub const fn line_workload_len(&self) -> u64 {
        self.line_workload_len
    }

    #[must_use]
    pub const fn rss_list_len(&self) -> u64 {
        self.rss_list_len
    }

    /// Pause between RSS samples
    #[must_use]
    pub const fn settle_pause(&self) -> Duration {
        Duration::from_millis(self.settle_pause_ms)
    }

    /// Runtime facility switches derived from this config
    #[must_use]
    pub fn facilities(&self) -> Facilities {
        Facilities::with_disabled(self.disabled_facilities.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = DemoConfig::default().validate();
        assert!(config.is_ok());
    }

    #[test]
    fn test_default_matches_documented_workloads() {
        let config = DemoConfig::default();
        assert_eq!(config.assertion_values(), &[1.5, 2.3, 0.7, -0.001, 4.4]);
        assert_eq!(config.sum_range(), 100_000);
        assert_eq!(config.callgraph_top(), 10);
        assert_eq!(config.alloc_list_len(), 300_000);
        assert_eq!(config.alloc_map_len(), 150_000);
        assert_eq!(config.line_workload_len(), 500_000);
        assert_eq!(config.settle_pause(), Duration::from_millis(300));
    }

    #[test]
    fn test_empty_assertion_values_rejected() {
        let config = DemoConfig::default()
            .with_assertion_values(Vec::new())
            .validate();
        assert!(matches!(config, Err(DemoError::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_workload_rejected() {
        let config = DemoConfig::default().with_sum_range(0).validate();
        assert!(matches!(config, Err(DemoError::InvalidConfig(msg)) if msg.contains("sum_range")));
    }

    #[test]
    fn test_report_length_bounds() {
        let too_many = DemoConfig::default().with_callgraph_top(101).validate();
        assert!(matches!(too_many, Err(DemoError::InvalidConfig(_))));

        let zero = DemoConfig::default().with_callgraph_top(0).validate();
        assert!(matches!(zero, Err(DemoError::InvalidConfig(_))));
    }

    #[test]
    fn test_settle_pause_too_long() {
        let config = DemoConfig::default()
            .with_settle_pause(Duration::from_secs(11))
            .validate();
        assert!(matches!(config, Err(DemoError::InvalidConfig(_))));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DemoConfig::from_toml_str(
            "callgraph_top = 3\ndisabled_facilities = [\"process-memory\"]\n",
        );
        assert!(config.is_ok());
        if let Ok(cfg) = config {
            assert_eq!(cfg.callgraph_top(), 3);
            assert_eq!(cfg.sum_range(), 100_000);
            assert!(cfg.facilities().acquire(Facility::ProcessMemory).is_err());
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        let config = DemoConfig::from_toml_str("no_such_key = 1\n");
        assert!(matches!(config, Err(DemoError::ConfigParseFailed(_))));
    }

    #[test]
    fn test_load_from_file() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut file = NamedTempFile::new()?;
        writeln!(file, "alloc_top = 4")?;
        writeln!(file, "settle_pause_ms = 0")?;
        file.flush()?;

        let config = DemoConfig::load(file.path())?;
        assert_eq!(config.alloc_top(), 4);
        assert_eq!(config.settle_pause(), Duration::ZERO);
        Ok(())
    }

    #[test]
    fn test_load_missing_file() {
        let config = DemoConfig::load(Path::new("/nonexistent/profiling-examples.toml"));
        assert!(matches!(config, Err(DemoError::ConfigReadFailed { .. })));
    }

    #[test]
    fn test_huge_settle_pause_saturates_and_is_rejected() {
        let config = DemoConfig::default().with_settle_pause(Duration::MAX);
        assert_eq!(config.settle_pause_ms, u64::MAX);
        assert!(matches!(
            config.validate(),
            Err(DemoError::InvalidConfig(msg)) if msg.contains("settle_pause_ms")
        ));
    }

    #[test]
    fn test_disabled_facility_flows_into_facilities() {
        let config = DemoConfig::default().with_disabled_facility(Facility::LineMemory);
        assert!(config.facilities().acquire(Facility::LineMemory).is_err());
    }

    #[test]
    fn test_disabled_facility_not_duplicated() {
        let config = DemoConfig::default()
            .with_disabled_facility(Facility::LineMemory)
            .with_disabled_facility(Facility::LineMemory);
        assert_eq!(config.disabled_facilities.len(), 1);
    }
}
