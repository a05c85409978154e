//! Error types for the profiling examples.
//!
//! Only two failures are part of the examples themselves: the intentional
//! invariant violation of the defensive check, and a missing optional
//! facility. Everything else is configuration or output-sink plumbing.

use std::path::PathBuf;

use thiserror::Error;

use crate::facility::Facility;

/// Error type for example routines and their configuration.
#[derive(Debug, Error)]
pub enum DemoError {
    #[error(
        "invariant violated at index {index}: value {value} is negative \
         (data must contain only non-negative values)"
    )]
    InvariantViolated {
        index: usize,
        value: f64,
        partial_total: f64,
    },

    #[error("{facility} is not available: {reason}")]
    FacilityUnavailable { facility: Facility, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file '{path}': {reason}")]
    ConfigReadFailed { path: PathBuf, reason: String },

    #[error("TOML parse error: {0}")]
    ConfigParseFailed(String),

    #[error("failed to read process metrics: {0}")]
    ProcessMetrics(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DemoError {
    /// Create a facility-unavailable error.
    pub fn facility_unavailable(facility: Facility, reason: impl Into<String>) -> Self {
        Self::FacilityUnavailable {
            facility,
            reason: reason.into(),
        }
    }

    /// Create a config read error.
    pub fn config_read_failed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ConfigReadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, DemoError>;
