//! Stall escalation: fillers while a request is slow, then an apology.
//!
//! ```text
//! request issued ──▶ silent > next delay? ──▶ Filler(1) ─▶ ... ─▶ Filler(max)
//!                                                                   │
//!                                            next stall ──▶ GiveUp (state cleared)
//! ```
//!
//! The filler count is cleared only when a request completes or is given
//! up on; issuing a new request just restarts the timer.

use rand::Rng;
use tokio::time::{Duration, Instant};

use crate::config::ConversationConfig;

/// Outcome of one stall check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallStep {
    Wait,
    /// Offer a filler; carries the new filler count.
    Filler(u8),
    /// Cancel the request and apologise.
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct StallState {
    last_request_issued_at: Option<Instant>,
    filler_count: u8,
    next_filler_delay: Duration,
    max_fillers: u8,
    delay_min_secs: f64,
    delay_max_secs: f64,
}

impl StallState {
    pub fn new(config: &ConversationConfig) -> Self {
        Self {
            last_request_issued_at: None,
            filler_count: 0,
            next_filler_delay: config.initial_filler_delay(),
            max_fillers: config.max_fillers,
            delay_min_secs: config.filler_delay_min_secs,
            delay_max_secs: config.filler_delay_max_secs,
        }
    }

    /// (Re)start the timer for a freshly issued request.
    pub fn start(&mut self, now: Instant) {
        self.last_request_issued_at = Some(now);
    }

    /// Forget the current stall.  The next delay is kept.
    pub fn clear(&mut self) {
        self.last_request_issued_at = None;
        self.filler_count = 0;
    }

    pub fn filler_count(&self) -> u8 {
        self.filler_count
    }

    pub fn next_filler_delay(&self) -> Duration {
        self.next_filler_delay
    }

    pub fn is_active(&self) -> bool {
        self.last_request_issued_at.is_some()
    }

    /// Escalate if the request has been silent for longer than the current
    /// delay.
    pub fn check(&mut self, now: Instant) -> StallStep {
        let Some(since) = self.last_request_issued_at else {
            return StallStep::Wait;
        };
        if now.saturating_duration_since(since) <= self.next_filler_delay {
            return StallStep::Wait;
        }

        self.next_filler_delay = self.sample_delay();
        self.last_request_issued_at = Some(now);

        if self.filler_count < self.max_fillers {
            self.filler_count += 1;
            StallStep::Filler(self.filler_count)
        } else {
            self.clear();
            StallStep::GiveUp
        }
    }

    /// Uniform in `[min, max)` seconds.  An empty or unbounded range yields
    /// `min`.
    fn sample_delay(&self) -> Duration {
        let (min, max) = (self.delay_min_secs.max(0.0), self.delay_max_secs);
        let secs = if min < max && max.is_finite() {
            rand::thread_rng().gen_range(min..max)
        } else {
            min
        };
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
