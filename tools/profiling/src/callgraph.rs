#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! Deterministic call-graph profiler built on `tracing` spans
//!
//! Every entered span counts as one call of the function it names. The
//! profiler only sees spans while [`CallGraphProfiler::profile`] has its
//! subscriber installed on the current thread.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{Metadata, Subscriber, span};
use tracing_subscriber::Registry;
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;

use crate::error::Result;

/// Identity of a profiled function: its span callsite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionKey {
    name: &'static str,
    file: Option<&'static str>,
    line: Option<u32>,
}

impl FunctionKey {
    fn from_metadata(meta: &'static Metadata<'static>) -> Self {
        Self {
            name: meta.name(),
            file: meta.file(),
            line: meta.line(),
        }
    }
}

impl fmt::Display for FunctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}({})", self.name),
            (Some(file), None) => write!(f, "{file}({})", self.name),
            _ => write!(f, "{{{}}}", self.name),
        }
    }
}

/// Aggregated timings for one function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionStats {
    pub function: FunctionKey,

    /// Number of calls
    pub ncalls: u64,

    /// Time spent in the function itself, excluding callees
    pub tottime: Duration,

    /// Time spent in the function and its callees, recursion counted once
    pub cumtime: Duration,
}

impl FunctionStats {
    const fn new(function: FunctionKey) -> Self {
        Self {
            function,
            ncalls: 0,
            tottime: Duration::ZERO,
            cumtime: Duration::ZERO,
        }
    }

    fn per_call(total: Duration, ncalls: u64) -> f64 {
        #[allow(clippy::cast_precision_loss)] // display only
        let n = ncalls.max(1) as f64;
        total.as_secs_f64() / n
    }
}

#[derive(Debug)]
struct Frame {
    function: FunctionKey,
    entered: Instant,
    callee_time: Duration,
}

#[derive(Debug, Default)]
struct Recorder {
    stack: Vec<Frame>,
    functions: HashMap<FunctionKey, FunctionStats>,
    wall_time: Duration,
}

impl Recorder {
    fn enter(&mut self, function: FunctionKey, now: Instant) {
        self.stack.push(Frame {
            function,
            entered: now,
            callee_time: Duration::ZERO,
        });
    }

    fn exit(&mut self, function: FunctionKey, now: Instant) {
        // Out-of-order exits (spans entered on another path) are ignored
        if self.stack.last().is_none_or(|top| top.function != function) {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };

        let elapsed = now.saturating_duration_since(frame.entered);
        let own = elapsed.saturating_sub(frame.callee_time);
        let recursive = self.stack.iter().any(|f| f.function == function);

        let stats = self
            .functions
            .entry(function)
            .or_insert_with(|| FunctionStats::new(function));
        stats.ncalls = stats.ncalls.saturating_add(1);
        stats.tottime = stats.tottime.saturating_add(own);
        if !recursive {
            stats.cumtime = stats.cumtime.saturating_add(elapsed);
        }

        if let Some(parent) = self.stack.last_mut() {
            parent.callee_time = parent.callee_time.saturating_add(elapsed);
        }
    }
}

/// `tracing` layer feeding span enter/exit into a shared recorder
#[derive(Debug, Clone, Default)]
pub struct CallGraphLayer {
    recorder: Arc<Mutex<Recorder>>,
}

impl<S> Layer<S> for CallGraphLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_enter(&self, id: &span::Id, ctx: Context<'_, S>) {
        let now = Instant::now();
        let Some(span) = ctx.span(id) else {
            return;
        };
        if let Ok(mut recorder) = self.recorder.lock() {
            recorder.enter(FunctionKey::from_metadata(span.metadata()), now);
        }
    }

    fn on_exit(&self, id: &span::Id, ctx: Context<'_, S>) {
        let now = Instant::now();
        let Some(span) = ctx.span(id) else {
            return;
        };
        if let Ok(mut recorder) = self.recorder.lock() {
            recorder.exit(FunctionKey::from_metadata(span.metadata()), now);
        }
    }
}

/// Scoped call-graph profiler
#[derive(Debug, Clone, Default)]
pub struct CallGraphProfiler {
    layer: CallGraphLayer,
}

impl CallGraphProfiler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with the profiling subscriber installed on this thread
    ///
    /// The previous subscriber is restored when `f` returns.
    pub fn profile<T>(&self, f: impl FnOnce() -> T) -> T {
        let subscriber = Registry::default().with(self.layer.clone());
        let started = Instant::now();
        let value = tracing::subscriber::with_default(subscriber, f);
        let elapsed = started.elapsed();
        if let Ok(mut recorder) = self.layer.recorder.lock() {
            recorder.wall_time = recorder.wall_time.saturating_add(elapsed);
        }
        value
    }

    /// Snapshot of everything recorded so far
    #[must_use]
    pub fn report(&self) -> CallGraphReport {
        self.layer
            .recorder
            .lock()
            .map(|recorder| {
                CallGraphReport::new(
                    recorder.functions.values().copied().collect(),
                    recorder.wall_time,
                )
            })
            .unwrap_or_else(|_| CallGraphReport::new(Vec::new(), Duration::ZERO))
    }
}

/// Profile results ordered by cumulative time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallGraphReport {
    entries: Vec<FunctionStats>,
    wall_time: Duration,
}

impl CallGraphReport {
    fn new(mut entries: Vec<FunctionStats>, wall_time: Duration) -> Self {
        entries.sort_by(|a, b| {
            b.cumtime
                .cmp(&a.cumtime)
                .then(b.ncalls.cmp(&a.ncalls))
                .then(a.function.name.cmp(b.function.name))
        });
        Self { entries, wall_time }
    }

    /// At most `n` leading entries
    pub fn top(&self, n: usize) -> impl Iterator<Item = &FunctionStats> {
        self.entries.iter().take(n)
    }

    #[must_use]
    pub fn total_calls(&self) -> u64 {
        self.entries
            .iter()
            .fold(0_u64, |acc, e| acc.saturating_add(e.ncalls))
    }

    /// Print the `top` leading entries as a table
    ///
    /// # Errors
    ///
    /// Returns error if the output sink cannot be written
    pub fn write_top(&self, out: &mut dyn Write, top: usize) -> Result<()> {
        writeln!(
            out,
            "         {} function calls in {:.6} seconds",
            self.total_calls(),
            self.wall_time.as_secs_f64()
        )?;
        writeln!(out)?;
        writeln!(out, "   Ordered by: cumulative time")?;
        if self.entries.len() > top {
            writeln!(
                out,
                "   List reduced from {} to {top} due to restriction <{top}>",
                self.entries.len()
            )?;
        }
        writeln!(out)?;
        writeln!(
            out,
            "{:>9} {:>10} {:>10} {:>10} {:>10} location(function)",
            "ncalls", "tottime", "percall", "cumtime", "percall"
        )?;
        for entry in self.top(top) {
            writeln!(
                out,
                "{:>9} {:>10.6} {:>10.6} {:>10.6} {:>10.6} {}",
                entry.ncalls,
                entry.tottime.as_secs_f64(),
                FunctionStats::per_call(entry.tottime, entry.ncalls),
                entry.cumtime.as_secs_f64(),
                FunctionStats::per_call(entry.cumtime, entry.ncalls),
                entry.function,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::instrument;

    #[instrument(level = "debug", skip_all)]
    fn leaf() -> u64 {
        std::hint::black_box(7)
    }

    #[instrument(level = "debug", skip_all)]
    fn branch(n: u64) -> u64 {
        (0..n).map(|_| leaf()).sum()
    }

    #[instrument(level = "debug", skip_all)]
    fn countdown(n: u64) -> u64 {
        if n == 0 { 0 } else { countdown(n.saturating_sub(1)).saturating_add(1) }
    }

    fn key(name: &'static str) -> FunctionKey {
        FunctionKey {
            name,
            file: None,
            line: None,
        }
    }

    #[test]
    fn test_counts_calls_per_function() {
        let profiler = CallGraphProfiler::new();
        let total = profiler.profile(|| branch(5).saturating_add(branch(3)));
        assert_eq!(total, 56);

        let report = profiler.report();
        let calls: HashMap<&str, u64> = report
            .entries
            .iter()
            .map(|e| (e.function.name, e.ncalls))
            .collect();
        assert_eq!(calls.get("branch"), Some(&2));
        assert_eq!(calls.get("leaf"), Some(&8));
        assert_eq!(report.total_calls(), 10);
    }

    #[test]
    fn test_report_sorted_by_cumulative_time() {
        let profiler = CallGraphProfiler::new();
        let _ = profiler.profile(|| crate::workload::work_profile(5_000));

        let report = profiler.report();
        assert!(!report.entries.is_empty());
        assert!(
            report
                .entries
                .windows(2)
                .all(|w| matches!(w, [a, b] if a.cumtime >= b.cumtime))
        );
        assert_eq!(report.top(2).count(), 2);
        assert!(report.top(100).count() <= report.entries.len());
    }

    #[test]
    fn test_caller_cumtime_covers_callees() {
        let profiler = CallGraphProfiler::new();
        let _ = profiler.profile(|| branch(50));
        let report = profiler.report();
        let find = |name: &str| {
            report
                .entries
                .iter()
                .find(|e| e.function.name == name)
                .copied()
        };

        match (find("branch"), find("leaf")) {
            (Some(b), Some(l)) => {
                assert!(b.cumtime >= l.cumtime);
                assert!(b.cumtime >= b.tottime);
            }
            other => assert!(other.0.is_some() && other.1.is_some()),
        }
    }

    #[test]
    fn test_recursion_cumtime_counted_once() {
        let profiler = CallGraphProfiler::new();
        let depth = profiler.profile(|| countdown(20));
        assert_eq!(depth, 20);

        let report = profiler.report();
        let entry = report
            .entries
            .iter()
            .find(|e| e.function.name == "countdown")
            .copied();
        assert!(entry.is_some_and(|e| e.ncalls == 21 && e.cumtime <= report.wall_time));
    }

    #[test]
    fn test_spans_outside_profile_are_not_recorded() {
        let profiler = CallGraphProfiler::new();
        let _ = branch(2);
        assert!(profiler.report().entries.is_empty());
    }

    #[test]
    fn test_write_top_truncates() -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut recorder = Recorder::default();
        let t0 = Instant::now();
        let t1 = t0.checked_add(Duration::from_millis(1)).unwrap_or(t0);
        for name in ["a", "b", "c"] {
            recorder.enter(key(name), t0);
            recorder.exit(key(name), t1);
        }
        let report = CallGraphReport::new(
            recorder.functions.into_values().collect(),
            Duration::from_millis(3),
        );

        let mut out = Vec::new();
        report.write_top(&mut out, 2)?;
        let text = String::from_utf8(out)?;
        assert!(text.contains("3 function calls"));
        assert!(text.contains("List reduced from 3 to 2"));
        assert_eq!(text.lines().filter(|l| l.ends_with('}')).count(), 2);
        Ok(())
    }

    #[test]
    fn test_mismatched_exit_ignored() {
        let mut recorder = Recorder::default();
        let t0 = Instant::now();
        recorder.enter(key("outer"), t0);
        recorder.exit(key("other"), t0);
        assert_eq!(recorder.stack.len(), 1);
        assert!(recorder.functions.is_empty());
    }
}
