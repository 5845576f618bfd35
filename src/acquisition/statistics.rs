//! Rolling frame-rate estimation for a transfer

use super::grabber_trait::FrameRateInfo;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Size of the rolling window of arrival times
const RECENT_WINDOW_SIZE: usize = 32;

/// Multiple of the expected interval after which the rate counts as stalled
pub const STALL_FACTOR: u32 = 4;

/// Tracks frame arrival times and derives live rate and stall state
#[derive(Debug, Clone)]
pub struct FrameRateMonitor {
    expected_interval: Duration,
    arrivals: VecDeque<Instant>,
}

impl FrameRateMonitor {
    /// Create a monitor for a trigger with the given nominal interval
    pub fn new(expected_interval: Duration) -> Self {
        Self {
            expected_interval,
            arrivals: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }

    /// Window after which a missing frame means the rate is stalled
    pub fn stall_window(&self) -> Duration {
        self.expected_interval * STALL_FACTOR
    }

    /// Record a frame arrival
    pub fn record_frame(&mut self, at: Instant) {
        self.arrivals.push_back(at);
        if self.arrivals.len() > RECENT_WINDOW_SIZE {
            self.arrivals.pop_front();
        }
    }

    /// Live rate over the window, once two frames have arrived
    pub fn live_rate(&self) -> Option<f32> {
        let first = self.arrivals.front()?;
        let last = self.arrivals.back()?;
        let span = last.duration_since(*first).as_secs_f64();
        if self.arrivals.len() < 2 || span <= 0.0 {
            return None;
        }
        Some(((self.arrivals.len() - 1) as f64 / span) as f32)
    }

    /// Whether the trigger has stalled as seen at `now`
    ///
    /// True when the last inter-frame gap, or the time since the last frame,
    /// exceeds the stall window.
    pub fn is_stalled(&self, now: Instant) -> bool {
        let window = self.stall_window();
        let mut recent = self.arrivals.iter().rev();
        let Some(last) = recent.next() else {
            return false;
        };

        if now.saturating_duration_since(*last) > window {
            return true;
        }

        recent
            .next()
            .map(|prev| last.duration_since(*prev) > window)
            .unwrap_or(false)
    }

    /// Statistics snapshot at `now`
    pub fn snapshot(&self, now: Instant) -> FrameRateInfo {
        let live_rate = self.live_rate();
        FrameRateInfo {
            live_rate_available: live_rate.is_some(),
            live_rate: live_rate.unwrap_or(0.0),
            stalled: self.is_stalled(now),
        }
    }
}
