#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Resident-set-size sampling for the current process

use crate::error::Result;
use crate::facility::{Facilities, Facility};

/// One RSS reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RssSample {
    /// Resident Set Size in bytes
    rss: u64,
}

impl RssSample {
    #[must_use]
    pub const fn new(rss: u64) -> Self {
        Self { rss }
    }

    /// Get RSS in megabytes
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // Acceptable precision loss for display purposes
    pub const fn rss_mb(&self) -> f64 {
        self.rss as f64 / (1024.0 * 1024.0)
    }
}

/// Handle for sampling the current process's RSS
#[cfg(feature = "process-memory")]
pub struct RssProbe {
    system: sysinfo::System,
    pid: sysinfo::Pid,
}

#[cfg(feature = "process-memory")]
impl RssProbe {
    /// Acquire the probe for the current process
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The `process-memory` facility is missing or disabled
    /// - The current PID cannot be determined
    pub fn acquire(facilities: &Facilities) -> Result<Self> {
        use crate::error::DemoError;

        facilities.acquire(Facility::ProcessMemory)?;
        let pid = sysinfo::get_current_pid()
            .map_err(|e| DemoError::ProcessMetrics(format!("cannot determine own pid: {e}")))?;
        Ok(Self {
            system: sysinfo::System::new(),
            pid,
        })
    }

    /// Refresh and read the current RSS
    ///
    /// # Errors
    ///
    /// Returns error if the process is not visible to the inspector
    pub fn sample(&mut self) -> Result<RssSample> {
        use crate::error::DemoError;
        use sysinfo::{ProcessRefreshKind, ProcessesToUpdate};

        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[self.pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system
            .process(self.pid)
            .map(|p| RssSample::new(p.memory()))
            .ok_or_else(|| DemoError::ProcessMetrics(format!("process {} not found", self.pid)))
    }
}

/// Stand-in compiled without `process-memory`; it can never be acquired
#[cfg(not(feature = "process-memory"))]
pub struct RssProbe {
    _private: (),
}

#[cfg(not(feature = "process-memory"))]
impl RssProbe {
    /// Always fails: the inspector is not compiled in
    ///
    /// # Errors
    ///
    /// Always returns [`DemoError::FacilityUnavailable`](crate::DemoError::FacilityUnavailable)
    pub fn acquire(facilities: &Facilities) -> Result<Self> {
        facilities.acquire(Facility::ProcessMemory)?;
        Err(crate::error::DemoError::facility_unavailable(
            Facility::ProcessMemory,
            "not compiled in",
        ))
    }

    /// Unreachable in practice since [`RssProbe::acquire`] never succeeds
    ///
    /// # Errors
    ///
    /// Always returns [`DemoError::FacilityUnavailable`](crate::DemoError::FacilityUnavailable)
    pub fn sample(&mut self) -> Result<RssSample> {
        Err(crate::error::DemoError::facility_unavailable(
            Facility::ProcessMemory,
            "not compiled in",
        ))
    }
}
