//! Error-flood detection.
//!
//! A sliding window over error timestamps. When the count inside the window
//! reaches the threshold, the detector signals the start of a flood episode
//! exactly once; it re-arms only after the window drains back below the
//! threshold.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window rate detector for error floods.
#[derive(Debug)]
pub struct FloodDetector {
    threshold: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
    in_flood: bool,
}

impl FloodDetector {
    /// Create a detector tripping at `threshold` errors within `window`.
    #[must_use]
    pub fn new(threshold: usize, window: Duration) -> Self {
        Self {
            threshold,
            window,
            timestamps: VecDeque::new(),
            in_flood: false,
        }
    }

    /// Record one error at `now`. Returns `true` exactly once per flood
    /// episode, at the moment the threshold is crossed.
    pub fn record(&mut self, now: Instant) -> bool {
        self.timestamps.push_back(now);
        self.prune(now);

        if self.timestamps.len() >= self.threshold {
            if !self.in_flood {
                self.in_flood = true;
                return true;
            }
        } else {
            self.in_flood = false;
        }
        false
    }

    /// Whether a flood episode is currently active as of `now`. Read-only;
    /// the latch itself re-arms on the next [`FloodDetector::record`].
    #[must_use]
    pub fn active(&self, now: Instant) -> bool {
        self.in_flood && self.recent(now) >= self.threshold
    }

    /// Recorded errors still inside the window as of `now`, without pruning.
    fn recent(&self, now: Instant) -> usize {
        self.timestamps
            .iter()
            .filter(|t| now.duration_since(**t) <= self.window)
            .count()
    }

    /// Recorded errors not yet pruned. Pruning happens on `record`.
    #[must_use]
    pub fn window_len(&self) -> usize {
        self.timestamps.len()
    }

    fn prune(&mut self, now: Instant) {
        while let Some(front) = self.timestamps.front() {
            if now.duration_since(*front) > self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_once_per_episode() {
        let mut flood = FloodDetector::new(10, Duration::from_secs(60));
        let now = Instant::now();
        let mut signals = 0;
        for _ in 0..15 {
            if flood.record(now) {
                signals += 1;
            }
        }
        assert_eq!(signals, 1, "exactly one emergency signal per episode");
        assert!(flood.active(now));
    }

    #[test]
    fn test_below_threshold_never_signals() {
        let mut flood = FloodDetector::new(10, Duration::from_secs(60));
        let now = Instant::now();
        for _ in 0..9 {
            assert!(!flood.record(now));
        }
        assert!(!flood.active(now));
    }

    #[test]
    fn test_active_query_has_no_side_effects() {
        let mut flood = FloodDetector::new(2, Duration::from_millis(10));
        let base = Instant::now();
        flood.record(base);
        flood.record(base);

        let flood = flood; // read-only from here on
        assert!(flood.active(base));
        assert!(flood.active(base), "repeated queries agree");
        assert!(!flood.active(base + Duration::from_millis(50)));
        assert_eq!(flood.window_len(), 2, "query never prunes");
    }

    #[test]
    fn test_rearms_after_window_drains() {
        let mut flood = FloodDetector::new(3, Duration::from_millis(10));
        let base = Instant::now();
        assert!(!flood.record(base));
        assert!(!flood.record(base));
        assert!(flood.record(base), "threshold crossed");

        // Window drains; the old timestamps age out.
        let later = base + Duration::from_millis(50);
        assert!(!flood.active(later));

        // A fresh burst signals again.
        assert!(!flood.record(later));
        assert!(!flood.record(later));
        assert!(flood.record(later), "new episode after re-arm");
    }
}
