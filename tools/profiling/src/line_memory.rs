//! Line-by-line heap profiler
//!
//! Each profiled line records the process-wide live heap after it ran and
//! the net bytes it added. Use [`profile_line!`](crate::profile_line) so the
//! line number and source text are captured at the call site.

use std::collections::BTreeMap;
use std::io::Write;

use tracing::debug;

use crate::error::Result;
use crate::facility::{Facilities, Facility};
use crate::heap::{self, format_bytes};

/// Profile one expression: `profile_line!(profile, expr)`
///
/// Works with both [`LineProfiler`] and [`LineProfile`].
#[macro_export]
macro_rules! profile_line {
    ($profile:expr, $body:expr) => {
        $profile.line(line!(), stringify!($body), || $body)
    };
}

/// Measurements for one source line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRecord {
    pub line: u32,
    pub contents: &'static str,

    /// Live heap bytes after the line last ran
    pub mem_usage: i64,

    /// Net heap bytes added by the line, summed over occurrences
    pub increment: i64,

    pub occurrences: u64,
}

/// Active line-level profiler for one function
#[derive(Debug)]
pub struct LineProfiler {
    function: &'static str,
    entry_usage: i64,
    lines: BTreeMap<u32, LineRecord>,
}

impl LineProfiler {
    /// Acquire the line-level profiler
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::FacilityUnavailable`](crate::DemoError::FacilityUnavailable)
    /// when the `line-memory` facility is missing or disabled.
    pub fn acquire(facilities: &Facilities, function: &'static str) -> Result<Self> {
        facilities.acquire(Facility::LineMemory)?;
        debug!(function, "line profiler attached");
        Ok(Self {
            function,
            entry_usage: heap::live_bytes(),
            lines: BTreeMap::new(),
        })
    }

    /// Run one line and record its heap effect
    pub fn line<T>(&mut self, line: u32, contents: &'static str, f: impl FnOnce() -> T) -> T {
        let (value, delta) = heap::measure(f);
        let usage = heap::live_bytes();
        let record = self.lines.entry(line).or_insert(LineRecord {
            line,
            contents,
            mem_usage: usage,
            increment: 0,
            occurrences: 0,
        });
        record.mem_usage = usage;
        record.increment = record.increment.saturating_add(delta.net_bytes());
        record.occurrences = record.occurrences.saturating_add(1);
        value
    }

    /// Recorded lines in source order
    pub fn records(&self) -> impl Iterator<Item = &LineRecord> {
        self.lines.values()
    }

    /// Print the per-line table
    ///
    /// # Errors
    ///
    /// Returns error if the output sink cannot be written
    pub fn write_report(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Function: {}", self.function)?;
        writeln!(out, "Heap in use on entry: {}", format_bytes(self.entry_usage))?;
        writeln!(out)?;
        writeln!(
            out,
            "{:>7} {:>12} {:>12} {:>12}  Line Contents",
            "Line #", "Mem usage", "Increment", "Occurrences"
        )?;
        writeln!(out, "{}", "=".repeat(72))?;
        for record in self.records() {
            writeln!(
                out,
                "{:>7} {:>12} {:>12} {:>12}  {}",
                record.line,
                format_bytes(record.mem_usage),
                format_bytes(record.increment),
                record.occurrences,
                record.contents
            )?;
        }
        writeln!(out)?;
        Ok(())
    }
}

/// Line profiler that degrades to a pass-through when unavailable
///
/// With `Passthrough`, [`LineProfile::line`] just runs the closure and
/// nothing is reported.
#[derive(Debug)]
pub enum LineProfile {
    Active(LineProfiler),
    Passthrough,
}

impl LineProfile {
    /// Acquire the profiler, or fall back to a pass-through
    #[must_use]
    pub fn acquire_or_passthrough(facilities: &Facilities, function: &'static str) -> Self {
        match LineProfiler::acquire(facilities, function) {
            Ok(profiler) => Self::Active(profiler),
            Err(e) => {
                debug!(function, error = %e, "line profiler unavailable, running unprofiled");
                Self::Passthrough
            }
        }
    }

    pub fn line<T>(&mut self, line: u32, contents: &'static str, f: impl FnOnce() -> T) -> T {
        match self {
            Self::Active(profiler) => profiler.line(line, contents, f),
            Self::Passthrough => f(),
        }
    }

    /// Print the table if profiling was active
    ///
    /// # Errors
    ///
    /// Returns error if the output sink cannot be written
    pub fn write_report(&self, out: &mut dyn Write) -> Result<()> {
        match self {
            Self::Active(profiler) => profiler.write_report(out),
            Self::Passthrough => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DemoError;

    #[test]
    fn test_disabled_facility_refuses_acquire() {
        let facilities = Facilities::with_disabled([Facility::LineMemory]);
        let result = LineProfiler::acquire(&facilities, "work");
        assert!(matches!(result, Err(DemoError::FacilityUnavailable { .. })));
    }

    #[test]
    fn test_passthrough_runs_closure_without_report()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let facilities = Facilities::with_disabled([Facility::LineMemory]);
        let mut profile = LineProfile::acquire_or_passthrough(&facilities, "work");
        assert!(matches!(profile, LineProfile::Passthrough));

        let value = profile_line!(profile, 40 + 2);
        assert_eq!(value, 42);

        let mut out = Vec::new();
        profile.write_report(&mut out)?;
        assert!(out.is_empty());
        Ok(())
    }

    #[cfg(feature = "line-memory")]
    #[test]
    fn test_records_lines_in_source_order() -> std::result::Result<(), Box<dyn std::error::Error>>
    {
        let mut profiler = LineProfiler::acquire(&Facilities::default(), "work")?;
        let data: Vec<u64> = profile_line!(profiler, (0..50_000).collect());
        let total: u64 = profile_line!(profiler, data.iter().sum());
        assert_eq!(total, 1_249_975_000);

        let records: Vec<_> = profiler.records().copied().collect();
        assert_eq!(records.len(), 2);
        let first = records.first().copied();
        assert!(first.is_some_and(|r| r.contents.contains("collect") && r.occurrences == 1));
        assert!(records.windows(2).all(|w| matches!(w, [a, b] if a.line < b.line)));

        let mut out = Vec::new();
        profiler.write_report(&mut out)?;
        let text = String::from_utf8(out)?;
        assert!(text.contains("Line Contents"));
        assert!(text.contains("data.iter().sum()"));
        Ok(())
    }

    #[cfg(feature = "line-memory")]
    #[test]
    fn test_repeated_line_counts_occurrences()
    -> std::result::Result<(), Box<dyn std::error::Error>> {
        let mut profiler = LineProfiler::acquire(&Facilities::default(), "loop")?;
        let mut total = 0_u64;
        for i in 0..5_u64 {
            total = total.wrapping_add(profile_line!(profiler, i.wrapping_mul(2)));
        }
        assert_eq!(total, 20);
        assert_eq!(profiler.records().map(|r| r.occurrences).sum::<u64>(), 5);
        Ok(())
    }
}
