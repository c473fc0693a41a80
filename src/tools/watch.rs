//! Simple stopwatch for measuring elapsed time.

use std::time::Instant;

/// A lightweight stopwatch used to time requests for the access log.
pub struct Watch {
    start: Instant,
}

impl Watch {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Returns the elapsed time in (fractional) milliseconds.
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}
