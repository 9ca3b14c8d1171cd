//! Windowed visit-rate estimation.
//!
//! Engines report cumulative visit counts. [`RateEstimator`] turns successive
//! samples into a per-second rate measured against an origin sample that is
//! advanced once per window, so the estimate stays smooth but still follows
//! changes in search speed. Samples taken within the premature period after a
//! reset are ignored because the first reports after a new search are noisy.

use std::time::{Duration, Instant};

/// Length of the smoothing window.
pub const RATE_WINDOW: Duration = Duration::from_secs(3);

/// Period after a reset during which samples are discarded.
pub const RATE_PREMATURE: Duration = Duration::from_millis(500);

/// Smoothed derivative of a monotonically increasing counter.
#[derive(Debug, Clone)]
pub struct RateEstimator {
    window: Duration,
    premature: Duration,
    origin: Instant,
    origin_count: Option<f64>,
    next_origin: Option<(Instant, f64)>,
}

impl RateEstimator {
    /// Creates an estimator with custom window and premature periods.
    #[must_use]
    pub fn new(window: Duration, premature: Duration) -> Self {
        Self::starting_at(window, premature, Instant::now())
    }

    /// Creates an estimator whose origin is the supplied instant.
    #[must_use]
    pub fn starting_at(window: Duration, premature: Duration, now: Instant) -> Self {
        Self {
            window,
            premature,
            origin: now,
            origin_count: None,
            next_origin: None,
        }
    }

    /// Forgets every sample; the next window starts now.
    pub fn reset(&mut self) {
        self.reset_at(Instant::now());
    }

    /// Forgets every sample; the next window starts at `now`.
    pub fn reset_at(&mut self, now: Instant) {
        self.origin = now;
        self.origin_count = None;
        self.next_origin = None;
    }

    /// Records `count` and returns the current rate per second, if known.
    pub fn per_sec(&mut self, count: f64) -> Option<f64> {
        self.per_sec_at(Instant::now(), count)
    }

    /// Records `count` observed at `now` and returns the rate per second.
    ///
    /// Returns `None` until a first sample has been accepted after the
    /// premature period, and whenever the elapsed time is too small to yield
    /// a finite rate.
    pub fn per_sec_at(&mut self, now: Instant, count: f64) -> Option<f64> {
        let Some(origin_count) = self.origin_count else {
            if now.saturating_duration_since(self.origin) >= self.premature {
                self.origin = now;
                self.origin_count = Some(count);
                self.next_origin = Some((now, count));
            }
            return None;
        };

        let (mut base_time, mut base_count) = (self.origin, origin_count);
        if let Some((next_time, next_count)) = self.next_origin {
            if now.saturating_duration_since(next_time) >= self.window {
                (base_time, base_count) = (next_time, next_count);
                self.origin = next_time;
                self.origin_count = Some(next_count);
                self.next_origin = Some((now, count));
            }
        }

        let elapsed = now.saturating_duration_since(base_time).as_secs_f64();
        let rate = (count - base_count) / elapsed;
        rate.is_finite().then_some(rate)
    }
}

impl Default for RateEstimator {
    fn default() -> Self {
        Self::new(RATE_WINDOW, RATE_PREMATURE)
    }
}
