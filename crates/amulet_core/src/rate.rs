use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

/// Length of the trailing window used once warm-up is over.
pub const RATE_WINDOW_SECS: i64 = 60;

/// Per-second throughput over a trailing 60 second window.
///
/// During the first minute the rate is the plain average since start, so the
/// figure is not dragged down by a half-empty window.
#[derive(Debug, Clone, PartialEq)]
pub struct RateEstimator {
    started_at: DateTime<Utc>,
    window: VecDeque<DateTime<Utc>>,
    events_seen: u64,
    rate: f64,
}

impl RateEstimator {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            window: VecDeque::new(),
            events_seen: 0,
            rate: 0.0,
        }
    }

    /// Records one event at `now` and recomputes the rate.
    pub fn on_event(&mut self, now: DateTime<Utc>) {
        self.window.push_back(now);
        self.events_seen += 1;

        let elapsed = now - self.started_at;
        if elapsed < Duration::seconds(RATE_WINDOW_SECS) {
            let secs = elapsed.num_milliseconds() as f64 / 1000.0;
            self.rate = if secs > 0.0 {
                self.events_seen as f64 / secs
            } else {
                0.0
            };
        } else {
            let cutoff = now - Duration::seconds(RATE_WINDOW_SECS);
            while self.window.front().is_some_and(|t| *t <= cutoff) {
                self.window.pop_front();
            }
            self.rate = self.window.len() as f64 / RATE_WINDOW_SECS as f64;
        }
    }

    pub fn current_rate(&self) -> f64 {
        self.rate
    }

    pub fn events_seen(&self) -> u64 {
        self.events_seen
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Timestamps currently held in the window, oldest first.
    pub fn window(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.window.iter()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }
}
