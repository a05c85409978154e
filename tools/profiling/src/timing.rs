//! Monotonic wall-clock timing

use std::time::{Duration, Instant};

/// Stopwatch over the monotonic clock
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    /// Take the first reading
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    /// Time elapsed since [`Stopwatch::start`]
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Run `f` and return its output with the time it took
    pub fn time<T>(f: impl FnOnce() -> T) -> (T, Duration) {
        let watch = Self::start();
        let value = f();
        (value, watch.elapsed())
    }
}

/// Seconds with microsecond precision, e.g. `0.004213`
#[must_use]
pub fn format_secs(elapsed: Duration) -> String {
    format!("{:.6}", elapsed.as_secs_f64())
}
