//! Optional profiling facilities
//!
//! A facility is usable when its Cargo feature was compiled in and it has
//! not been disabled at runtime (config or `--disable`). Callers that fail
//! to acquire one either return early with a warning or fall back to a
//! pass-through, and must not touch the facility afterwards.

use std::collections::BTreeSet;
use std::fmt;
use std::io::Write;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{DemoError, Result};

/// An optional capability some examples depend on
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum Facility {
    /// Line-by-line heap profiler
    LineMemory,
    /// Process resident-set-size inspector
    ProcessMemory,
}

impl Facility {
    /// Cargo feature that provides this facility
    #[must_use]
    pub const fn feature(self) -> &'static str {
        match self {
            Self::LineMemory => "line-memory",
            Self::ProcessMemory => "process-memory",
        }
    }

    /// Whether the facility was compiled into this build
    #[must_use]
    pub const fn compiled_in(self) -> bool {
        match self {
            Self::LineMemory => cfg!(feature = "line-memory"),
            Self::ProcessMemory => cfg!(feature = "process-memory"),
        }
    }

    /// Hint printed when the facility is missing
    #[must_use]
    pub fn install_hint(self) -> String {
        format!(
            "Install it with: cargo install profiling-examples --features {}",
            self.feature()
        )
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LineMemory => write!(f, "line-level memory profiler"),
            Self::ProcessMemory => write!(f, "process memory inspector"),
        }
    }
}

/// Runtime view of which facilities may be used
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Facilities {
    disabled: BTreeSet<Facility>,
}

impl Facilities {
    /// Facilities with the given ones switched off
    #[must_use]
    pub fn with_disabled(disabled: impl IntoIterator<Item = Facility>) -> Self {
        Self {
            disabled: disabled.into_iter().collect(),
        }
    }

    /// Try to acquire a facility
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::FacilityUnavailable`] if the feature is not
    /// compiled in or the facility was disabled at runtime.
    pub fn acquire(&self, facility: Facility) -> Result<()> {
        if !facility.compiled_in() {
            return Err(DemoError::facility_unavailable(
                facility,
                format!("feature `{}` is not compiled in", facility.feature()),
            ));
        }
        if self.disabled.contains(&facility) {
            return Err(DemoError::facility_unavailable(
                facility,
                "disabled by configuration",
            ));
        }
        Ok(())
    }
}

/// Print the degraded-facility warning plus the install hint
///
/// # Errors
///
/// Returns error if the output sink cannot be written
pub fn report_unavailable(out: &mut dyn Write, err: &DemoError) -> Result<()> {
    warn!(error = %err, "optional facility unavailable, skipping");
    writeln!(out, "warning: {err}")?;
    if let DemoError::FacilityUnavailable { facility, .. } = err {
        writeln!(out, "{}", facility.install_hint())?;
    }
    Ok(())
}
