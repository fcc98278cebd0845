use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};

/// Returned by window queries that have nothing to report.
pub const UNKNOWN: i64 = -1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sample {
    pub value: i64,
    pub timestamp: DateTime<Utc>,
}

/// Fixed-duration buffer of timestamped samples.
///
/// Samples are kept ordered by timestamp (equal timestamps keep arrival
/// order). Every retained sample is at most `duration` older than the newest
/// one; anything older is dropped on write.
#[derive(Clone, Debug)]
pub struct RollingWindow {
    duration: TimeDelta,
    samples: VecDeque<Sample>,
}

impl RollingWindow {
    pub fn new(duration: TimeDelta) -> Self {
        Self {
            duration,
            samples: VecDeque::new(),
        }
    }

    pub fn add(&mut self, value: i64, now: DateTime<Utc>) {
        let position = self.samples.partition_point(|s| s.timestamp <= now);
        self.samples.insert(
            position,
            Sample {
                value,
                timestamp: now,
            },
        );
        self.purge();
    }

    fn purge(&mut self) {
        let Some(newest) = self.samples.back().map(|s| s.timestamp) else {
            return;
        };
        let Some(horizon) = newest.checked_sub_signed(self.duration) else {
            // the window reaches back past the earliest representable time
            return;
        };
        while self
            .samples
            .front()
            .is_some_and(|sample| sample.timestamp < horizon)
        {
            self.samples.pop_front();
        }
    }

    pub fn latest(&self) -> i64 {
        self.samples.back().map_or(UNKNOWN, |s| s.value)
    }

    /// Value of the sample right before the latest one.
    pub fn previous(&self) -> i64 {
        self.samples
            .len()
            .checked_sub(2)
            .and_then(|idx| self.samples.get(idx))
            .map_or(UNKNOWN, |s| s.value)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration(&self) -> TimeDelta {
        self.duration
    }
}
