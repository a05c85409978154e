//! The example routines
//!
//! Each routine is independent, reads its workload sizes from the context
//! config and writes a human-readable report to the context sink.

use std::thread;

use tracing::{debug, info};

use crate::alloc_trace::AllocationTracer;
use crate::callgraph::CallGraphProfiler;
use crate::checks;
use crate::context::DemoContext;
use crate::error::{DemoError, Result};
use crate::facility::report_unavailable;
use crate::line_memory::{LineProfile, LineProfiler};
use crate::process_memory::RssProbe;
use crate::timing::{Stopwatch, format_secs};
use crate::workload;

/// Sum the configured values, failing fast on the first negative one.
///
/// With the default values this always fails at index 3; the error is
/// meant to stop the process.
///
/// # Errors
///
/// Returns [`DemoError::InvariantViolated`] for a negative value
pub fn assertion_example(ctx: &mut DemoContext<'_>) -> Result<()> {
    let values = ctx.config().assertion_values();
    debug!(count = values.len(), "checking values");
    let total = checks::sum_non_negative(values)?;
    writeln!(ctx.out(), "total is: {total}")?;
    Ok(())
}

/// Time the sum-of-squares workload on the monotonic clock.
///
/// # Errors
///
/// Returns error if the output sink cannot be written
pub fn timing_example(ctx: &mut DemoContext<'_>) -> Result<()> {
    let n = ctx.config().sum_range();
    let (sum, elapsed) = Stopwatch::time(|| workload::sum_of_squares(n));
    debug!(n, sum, ?elapsed, "timed workload");
    writeln!(ctx.out(), "Time: {} s", format_secs(elapsed))?;
    Ok(())
}

/// Profile the chunked sum-of-squares workload and print the functions
/// with the highest cumulative time.
///
/// # Errors
///
/// Returns error if the output sink cannot be written
pub fn callgraph_example(ctx: &mut DemoContext<'_>) -> Result<()> {
    let config = ctx.config();
    let profiler = CallGraphProfiler::new();
    let sum = profiler.profile(|| workload::work_profile(config.sum_range()));
    debug!(sum, "profiled workload");

    profiler
        .report()
        .write_top(ctx.out(), config.callgraph_top())
}

/// Trace allocations of the list/map workload and print the largest sites
/// and the growth since the baseline snapshot.
///
/// # Errors
///
/// Returns error if the output sink cannot be written
pub fn alloc_trace_example(ctx: &mut DemoContext<'_>) -> Result<()> {
    let config = ctx.config();
    let top = config.alloc_top();

    let mut tracer = AllocationTracer::start();
    let baseline = tracer.take_snapshot();

    let items = workload::allocate_data(
        &mut tracer,
        config.alloc_list_len(),
        config.alloc_map_len(),
    );
    debug!(items, "allocated workload");

    let after = tracer.take_snapshot();
    drop(tracer);

    let out = ctx.out();
    writeln!(out, "Top lines by bytes (snapshot 2):")?;
    for stat in after.statistics().iter().take(top) {
        writeln!(out, "{stat}")?;
    }

    writeln!(out)?;
    writeln!(out, "Differences (snapshot 2 - snapshot 1):")?;
    for diff in after.compare_to(&baseline).iter().take(top) {
        writeln!(out, "{diff}")?;
    }
    Ok(())
}

/// Line-by-line heap profile of building, doubling and summing a list.
///
/// Prints a warning and returns without running anything when the
/// line-level profiler is unavailable.
///
/// # Errors
///
/// Returns error if the output sink cannot be written
pub fn line_memory_example(ctx: &mut DemoContext<'_>) -> Result<()> {
    let mut profiler = match LineProfiler::acquire(ctx.facilities(), "line_memory_example") {
        Ok(profiler) => profiler,
        Err(e @ DemoError::FacilityUnavailable { .. }) => {
            return report_unavailable(ctx.out(), &e);
        }
        Err(e) => return Err(e),
    };

    let n = ctx.config().line_workload_len();
    let data: Vec<u64> = crate::profile_line!(profiler, (0..n).collect());
    let doubled: Vec<u64> =
        crate::profile_line!(profiler, data.iter().map(|x| x.wrapping_mul(2)).collect());
    let result: u64 = crate::profile_line!(profiler, doubled.iter().sum());

    let out = ctx.out();
    profiler.write_report(out)?;
    writeln!(out, "Result: {result}")?;
    Ok(())
}

/// Same result as [`line_memory_example`] from a single accumulating loop,
/// with no intermediate lists.
///
/// Runs unprofiled when the line-level profiler is unavailable.
///
/// # Errors
///
/// Returns error if the output sink cannot be written
pub fn line_memory_efficient_example(ctx: &mut DemoContext<'_>) -> Result<()> {
    let mut profile =
        LineProfile::acquire_or_passthrough(ctx.facilities(), "line_memory_efficient_example");

    let n = ctx.config().line_workload_len();
    let result = crate::profile_line!(profile, workload::doubled_sum_single_loop(n));

    let out = ctx.out();
    profile.write_report(out)?;
    writeln!(out, "Result (single-loop): {result}")?;
    Ok(())
}

/// Sample process RSS before allocating, after allocating and after
/// releasing a list.
///
/// Prints a warning and returns when the process inspector is unavailable.
///
/// # Errors
///
/// Returns error if:
/// - The output sink cannot be written
/// - The process inspector cannot read this process
pub fn rss_example(ctx: &mut DemoContext<'_>) -> Result<()> {
    let mut probe = match RssProbe::acquire(ctx.facilities()) {
        Ok(probe) => probe,
        Err(e @ DemoError::FacilityUnavailable { .. }) => {
            return report_unavailable(ctx.out(), &e);
        }
        Err(e) => return Err(e),
    };
    let config = ctx.config();
    let pause = config.settle_pause();

    let initial = probe.sample()?;
    writeln!(ctx.out(), "RSS initial: {:.1} MB", initial.rss_mb())?;

    let data: Vec<u64> = (0..config.rss_list_len()).collect();
    thread::sleep(pause);
    let allocated = probe.sample()?;
    writeln!(ctx.out(), "RSS after allocating: {:.1} MB", allocated.rss_mb())?;

    info!(len = data.len(), "releasing list");
    drop(data);
    thread::sleep(pause);
    let released = probe.sample()?;
    writeln!(ctx.out(), "RSS final: {:.1} MB", released.rss_mb())?;
    Ok(())
}
