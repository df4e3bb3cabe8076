// relaunch-core/src/governor.rs
//! Circuit breaker against restart storms.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

use relaunch_common::config::RestartPolicy;

/// Sliding window over the most recent restart timestamps.
///
/// The breaker trips only when the window is full and *every* gap between
/// consecutive restarts in it is at most `quick_window`; one slow restart in the
/// window is enough to keep it closed.
#[derive(Debug, Clone)]
pub struct RestartGovernor {
    records: VecDeque<SystemTime>,
    max_samples: usize,
    quick_window: Duration,
}

impl RestartGovernor {
    pub fn new(policy: RestartPolicy) -> Self {
        let max_samples = policy.max_samples.max(1);
        Self {
            records: VecDeque::with_capacity(max_samples + 1),
            max_samples,
            quick_window: policy.quick_window,
        }
    }

    /// Appends `now`, evicting the oldest record once the window is over capacity.
    pub fn record_restart(&mut self, now: SystemTime) {
        self.records.push_back(now);
        while self.records.len() > self.max_samples {
            self.records.pop_front();
        }
    }

    pub fn is_excessive(&self) -> bool {
        if self.records.len() < self.max_samples {
            return false;
        }
        self.records
            .iter()
            .zip(self.records.iter().skip(1))
            // A clock that went backwards counts as a quick restart.
            .all(|(earlier, later)| {
                later.duration_since(*earlier).unwrap_or(Duration::ZERO) <= self.quick_window
            })
    }

    /// Recorded restarts, oldest first.
    pub fn restarts(&self) -> impl Iterator<Item = &SystemTime> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Timestamps rendered as RFC 3339 for log messages.
    pub fn describe(&self) -> String {
        self.records
            .iter()
            .map(|t| humantime::format_rfc3339_millis(*t).to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for RestartGovernor {
    fn default() -> Self {
        Self::new(RestartPolicy::default())
    }
}
