//! Instrumented global allocator and heap accounting
//!
//! Counters are process-wide atomics: allocations made by other threads
//! while a region is open are included, and the byte counters never go
//! down.

use std::alloc::System;

use stats_alloc::{INSTRUMENTED_SYSTEM, Region, Stats, StatsAlloc};

#[global_allocator]
static GLOBAL: &StatsAlloc<System> = &INSTRUMENTED_SYSTEM;

/// Heap activity observed over a region
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapDelta {
    /// Bytes handed out (including realloc growth)
    pub bytes_allocated: u64,

    /// Bytes returned (including realloc shrink)
    pub bytes_freed: u64,

    /// Number of allocation calls
    pub allocations: u64,
}

impl HeapDelta {
    fn from_stats(stats: &Stats) -> Self {
        Self {
            bytes_allocated: to_u64(stats.bytes_allocated),
            bytes_freed: to_u64(stats.bytes_deallocated),
            allocations: to_u64(stats.allocations),
        }
    }

    /// Allocated minus freed; negative when the region released memory
    #[must_use]
    pub fn net_bytes(&self) -> i64 {
        to_i64(self.bytes_allocated).saturating_sub(to_i64(self.bytes_freed))
    }
}

/// Run `f` and report the heap activity it caused
pub fn measure<T>(f: impl FnOnce() -> T) -> (T, HeapDelta) {
    let region = Region::new(GLOBAL);
    let value = f();
    let change = region.change();
    (value, HeapDelta::from_stats(&change))
}

/// Bytes currently live on the heap, process-wide
#[must_use]
pub fn live_bytes() -> i64 {
    HeapDelta::from_stats(&GLOBAL.stats()).net_bytes()
}

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Human-readable byte count in the units the reports use
#[must_use]
#[allow(clippy::cast_precision_loss)] // display only
pub fn format_bytes(bytes: i64) -> String {
    let magnitude = bytes.unsigned_abs();
    let sign = if bytes < 0 { "-" } else { "" };
    if magnitude >= 1024 * 1024 {
        format!("{sign}{:.1} MiB", magnitude as f64 / (1024.0 * 1024.0))
    } else if magnitude >= 1024 {
        format!("{sign}{:.1} KiB", magnitude as f64 / 1024.0)
    } else {
        format!("{sign}{magnitude} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measure_sees_vec_allocation() {
        let (v, delta) = measure(|| vec![0_u8; 64 * 1024]);
        assert_eq!(v.len(), 64 * 1024);
        assert!(delta.bytes_allocated >= 64 * 1024);
        assert!(delta.allocations >= 1);
    }

    #[test]
    fn test_dropping_inside_region_frees() {
        let ((), delta) = measure(|| {
            let v = vec![1_u64; 4096];
            drop(v);
        });
        assert!(delta.bytes_freed >= 4096 * 8);
    }

    #[test]
    fn test_net_bytes_sign() {
        let delta = HeapDelta {
            bytes_allocated: 100,
            bytes_freed: 250,
            allocations: 1,
        };
        assert_eq!(delta.net_bytes(), -150);
    }

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(-3 * 1024 * 1024), "-3.0 MiB");
    }
}
