//! Progress report throttling for historic scans.

use std::time::{Duration, Instant};

use crate::config::defaults::PROGRESS_REPORT_INTERVAL;

/// Lets at most one report through per interval, but never swallows the
/// first or the last file.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(PROGRESS_REPORT_INTERVAL)
    }
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// `index` is zero-based; returns whether file `index` of `total` should
    /// be reported at `now`.
    pub fn should_report(&mut self, now: Instant, index: usize, total: usize) -> bool {
        let boundary = index == 0 || index + 1 >= total;
        let due = self
            .last
            .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if boundary || due {
            self.last = Some(now);
            true
        } else {
            false
        }
    }
}
