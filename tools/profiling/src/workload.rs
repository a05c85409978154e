//! Artificial workloads timed and profiled by the examples

use std::collections::HashMap;

use tracing::instrument;

use crate::alloc_trace::AllocationTracer;

/// Chunk width used by the call-graph workload
pub const PROFILE_CHUNK: u64 = 1_000;

/// Sum of `i * i` over `0..n`
#[must_use]
pub fn sum_of_squares(n: u64) -> u64 {
    (0..n).fold(0_u64, |acc, i| acc.wrapping_add(i.wrapping_mul(i)))
}

/// Sum of squares split into instrumented chunks, so a call-graph
/// profiler sees a small tree of calls
#[instrument(level = "debug", skip_all, fields(n = n))]
pub fn work_profile(n: u64) -> u64 {
    chunk_starts(n)
        .map(|start| chunk_sum(start, start.saturating_add(PROFILE_CHUNK).min(n)))
        .fold(0_u64, u64::wrapping_add)
}

fn chunk_starts(n: u64) -> impl Iterator<Item = u64> {
    (0..n).step_by(usize::try_from(PROFILE_CHUNK).unwrap_or(usize::MAX))
}

#[instrument(level = "debug", skip_all)]
fn chunk_sum(start: u64, end: u64) -> u64 {
    (start..end).map(square).fold(0_u64, u64::wrapping_add)
}

#[instrument(level = "trace", skip_all)]
fn square(i: u64) -> u64 {
    i.wrapping_mul(i)
}

/// Build a list of `list_len` integers and a map of `map_len` entries,
/// attributing both allocations to their lines
pub fn allocate_data(tracer: &mut AllocationTracer, list_len: u64, map_len: u64) -> usize {
    let data: Vec<u64> = tracer.trace(|| (0..list_len).collect());
    let mapping: HashMap<u64, u64> =
        tracer.trace(|| (0..map_len).map(|i| (i, i.wrapping_mul(2))).collect());
    data.len().saturating_add(mapping.len())
}

/// Single accumulating loop computing `sum(2 * i)` over `0..n`
#[must_use]
pub fn doubled_sum_single_loop(n: u64) -> u64 {
    let mut total = 0_u64;
    for i in 0..n {
        total = total.wrapping_add(i.wrapping_mul(2));
    }
    total
}
