//! Drift-correcting fixed-period loop timing for the output pacers.
//!
//! Each iteration measures its own wall-clock cost and sleeps only for the
//! remainder of the period.  This is best-effort pacing on a normal OS
//! thread, not hard real time: an iteration that overruns simply starts the
//! next one immediately.

use std::time::{Duration, Instant};

/// Tracks the start of the current iteration of a fixed-period loop.
#[derive(Debug)]
pub struct FramePacer {
    period: Duration,
    started: Instant,
}

impl FramePacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            started: Instant::now(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Time left in the current iteration, zero once overrun.
    pub fn remaining(&self) -> Duration {
        self.period.saturating_sub(self.started.elapsed())
    }

    /// Sleep out the rest of the current period and start the next one.
    pub fn wait_next(&mut self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
        self.started = Instant::now();
    }
}
