#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Allocation tracing attributed to source lines
//!
//! [`AllocationTracer::trace`] is `#[track_caller]`: allocations made by the
//! closure are charged to the file and line that called it. Site sizes are
//! cumulative bytes allocated, so a later snapshot never reports less than
//! an earlier one for the same site.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;

use tracing::debug;

use crate::heap::{self, format_bytes};

/// Source location allocations are charged to
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Site {
    file: &'static str,
    line: u32,
}

impl From<&'static Location<'static>> for Site {
    fn from(loc: &'static Location<'static>) -> Self {
        Self {
            file: loc.file(),
            line: loc.line(),
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Accumulated allocations for one site
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiteStats {
    /// Bytes allocated at this site
    pub size: u64,

    /// Allocation calls made at this site
    pub count: u64,
}

impl SiteStats {
    /// Mean allocation size in bytes
    #[must_use]
    pub fn average(&self) -> u64 {
        self.size.checked_div(self.count).unwrap_or(0)
    }
}

/// One line of [`Snapshot::statistics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteStatistic {
    pub site: Site,
    pub stats: SiteStats,
}

impl fmt::Display for SiteStatistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: size={}, count={}, average={}",
            self.site,
            format_bytes(to_i64(self.stats.size)),
            self.stats.count,
            format_bytes(to_i64(self.stats.average())),
        )
    }
}

/// One line of [`Snapshot::compare_to`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteDiff {
    pub site: Site,
    pub stats: SiteStats,
    pub size_diff: i64,
    pub count_diff: i64,
}

impl fmt::Display for SiteDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: size={} ({}{}), count={} ({:+}), average={}",
            self.site,
            format_bytes(to_i64(self.stats.size)),
            if self.size_diff >= 0 { "+" } else { "" },
            format_bytes(self.size_diff),
            self.stats.count,
            self.count_diff,
            format_bytes(to_i64(self.stats.average())),
        )
    }
}

/// Point-in-time copy of the tracer's per-site table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    sites: BTreeMap<Site, SiteStats>,
}

impl Snapshot {
    /// Stats recorded for `site`, if it allocated before the snapshot
    #[must_use]
    pub fn get(&self, site: &Site) -> Option<SiteStats> {
        self.sites.get(site).copied()
    }

    /// Sites ordered by bytes allocated, largest first
    #[must_use]
    pub fn statistics(&self) -> Vec<SiteStatistic> {
        let mut stats: Vec<_> = self
            .sites
            .iter()
            .map(|(site, stats)| SiteStatistic {
                site: *site,
                stats: *stats,
            })
            .collect();
        stats.sort_by(|a, b| b.stats.size.cmp(&a.stats.size).then(a.site.cmp(&b.site)));
        stats
    }

    /// Per-site difference `self - older`, largest absolute size change first
    ///
    /// Sites missing from `older` count as zero there.
    #[must_use]
    pub fn compare_to(&self, older: &Self) -> Vec<SiteDiff> {
        let mut diffs: Vec<_> = self
            .sites
            .iter()
            .map(|(site, stats)| {
                let old = older.get(site).unwrap_or_default();
                SiteDiff {
                    site: *site,
                    stats: *stats,
                    size_diff: to_i64(stats.size).saturating_sub(to_i64(old.size)),
                    count_diff: to_i64(stats.count).saturating_sub(to_i64(old.count)),
                }
            })
            .collect();
        diffs.sort_by(|a, b| {
            b.size_diff
                .unsigned_abs()
                .cmp(&a.size_diff.unsigned_abs())
                .then(a.site.cmp(&b.site))
        });
        diffs
    }
}

/// Records allocations per call site while it is alive
#[derive(Debug)]
pub struct AllocationTracer {
    sites: BTreeMap<Site, SiteStats>,
}

impl AllocationTracer {
    /// Start tracing
    #[must_use]
    pub fn start() -> Self {
        debug!("allocation tracer started");
        Self {
            sites: BTreeMap::new(),
        }
    }

    /// Run `f`, charging the heap it allocates to the caller's line
    #[track_caller]
    pub fn trace<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let site = Site::from(Location::caller());
        let (value, delta) = heap::measure(f);
        let entry = self.sites.entry(site).or_default();
        entry.size = entry.size.saturating_add(delta.bytes_allocated);
        entry.count = entry.count.saturating_add(delta.allocations);
        value
    }

    /// Copy the current per-site table
    #[must_use]
    pub fn take_snapshot(&self) -> Snapshot {
        Snapshot {
            sites: self.sites.clone(),
        }
    }
}

impl Drop for AllocationTracer {
    fn drop(&mut self) {
        debug!(sites = self.sites.len(), "allocation tracer stopped");
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(line: u32) -> Site {
        Site {
            file: "src/lib.rs",
            line,
        }
    }

    fn snapshot(entries: &[(u32, u64, u64)]) -> Snapshot {
        Snapshot {
            sites: entries
                .iter()
                .map(|&(line, size, count)| (site(line), SiteStats { size, count }))
                .collect(),
        }
    }

    #[test]
    fn test_trace_charges_caller_line() {
        let mut tracer = AllocationTracer::start();
        let expected_line = line!().saturating_add(1);
        let v: Vec<u64> = tracer.trace(|| (0..10_000).collect());
        assert_eq!(v.len(), 10_000);

        let snap = tracer.take_snapshot();
        let stats = snap.statistics();
        assert_eq!(stats.len(), 1);
        let first = stats.first().copied();
        assert!(first.is_some_and(|s| s.site.line == expected_line
            && s.site.file.ends_with("alloc_trace.rs")
            && s.stats.size >= 10_000 * 8));
    }

    #[test]
    fn test_later_snapshot_never_smaller() {
        let mut tracer = AllocationTracer::start();
        let mut keep = Vec::new();
        for _ in 0..3 {
            keep.push(tracer.trace(|| vec![0_u8; 4096]));
        }
        let first = tracer.take_snapshot();
        keep.push(tracer.trace(|| vec![0_u8; 8192]));
        for _ in 0..2 {
            keep.push(tracer.trace(|| vec![0_u8; 4096]));
        }
        let second = tracer.take_snapshot();

        for stat in first.statistics() {
            let later = second.get(&stat.site).unwrap_or_default();
            assert!(later.size >= stat.stats.size);
            assert!(later.count >= stat.stats.count);
        }
        assert!(second.compare_to(&first).iter().all(|d| d.size_diff >= 0));
        assert_eq!(keep.len(), 6);
    }

    #[test]
    fn test_statistics_sorted_by_size() {
        let snap = snapshot(&[(1, 10, 1), (2, 300, 3), (3, 50, 1)]);
        let sizes: Vec<u64> = snap.statistics().iter().map(|s| s.stats.size).collect();
        assert_eq!(sizes, vec![300, 50, 10]);
    }

    #[test]
    fn test_compare_to_treats_new_sites_as_zero() {
        let older = snapshot(&[(1, 100, 1)]);
        let newer = snapshot(&[(1, 150, 2), (2, 400, 4)]);
        let diffs = newer.compare_to(&older);

        assert_eq!(diffs.len(), 2);
        assert_eq!(diffs.first().map(|d| (d.site, d.size_diff)), Some((site(2), 400)));
        assert_eq!(
            diffs.get(1).map(|d| (d.size_diff, d.count_diff)),
            Some((50, 1))
        );
    }

    #[test]
    fn test_diff_display() {
        let newer = snapshot(&[(7, 2048, 2)]);
        let diffs = newer.compare_to(&Snapshot::default());
        let text = diffs.first().map(ToString::to_string).unwrap_or_default();
        assert_eq!(
            text,
            "src/lib.rs:7: size=2.0 KiB (+2.0 KiB), count=2 (+2), average=1.0 KiB"
        );
    }

    #[test]
    fn test_average_of_empty_site() {
        assert_eq!(SiteStats::default().average(), 0);
    }
}
