use chrono::{DateTime, TimeDelta, Utc};
use log::info;

use crate::rolling_window::{RollingWindow, UNKNOWN};

/// Seconds without a report after which the signal is assumed to be zero.
pub const STALE_AFTER_SECS: i64 = 120;

/// Minimum change between two consecutive readings that fires the trigger.
pub const TRIGGER_DIFF: i64 = 30;

/// Downstream control action. Receives the transport handle and reports
/// whether it acted (`true`) or decided to skip (`false`).
pub type TriggerAction<M> = Box<dyn FnMut(&M) -> bool + Send>;

/// Tracks the solar input power reported by the hub and fires the trigger
/// action whenever two consecutive readings differ by at least
/// [`TRIGGER_DIFF`].
///
/// Staleness is only checked when a new reading arrives: if the previous one
/// is older than [`STALE_AFTER_SECS`], a reading of `0` is applied first, as
/// if the hub had reported it, followed by the real one. Both are separate
/// updates and each evaluates the trigger on its own.
pub struct SignalMonitor<M> {
    window: RollingWindow,
    last_update: Option<DateTime<Utc>>,
    current: i64,
    last_trigger_value: Option<i64>,
    trigger: TriggerAction<M>,
}

impl<M> SignalMonitor<M> {
    pub fn new(window: TimeDelta, trigger: TriggerAction<M>) -> Self {
        Self {
            window: RollingWindow::new(window),
            last_update: None,
            current: UNKNOWN,
            last_trigger_value: None,
            trigger,
        }
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.last_update
            .is_some_and(|last| now - last > TimeDelta::seconds(STALE_AFTER_SECS))
    }

    pub fn record(&mut self, value: i64, now: DateTime<Utc>, transport: &M) {
        if self.is_stale(now) {
            info!(
                "No solarInputPower update for more than {STALE_AFTER_SECS}s (last {}), injecting 0",
                self.current
            );
            self.apply(0, now, transport);
        }
        self.apply(value, now, transport);
    }

    fn apply(&mut self, value: i64, now: DateTime<Utc>, transport: &M) {
        self.window.add(value, now);
        self.current = self.window.latest();
        self.last_update = Some(now);

        if self.window.len() < 2 {
            return;
        }
        let previous = self.window.previous();
        let current = self.current;
        if (previous - current).abs() >= TRIGGER_DIFF {
            let executed = (self.trigger)(transport);
            info!(
                "Ace triggers limit function: {previous} -> {current}: {}",
                if executed { "executed" } else { "skipped" }
            );
            self.last_trigger_value = Some(current);
        }
    }

    /// Latest reading, or [`UNKNOWN`] before the first one.
    pub fn current(&self) -> i64 {
        self.current
    }

    pub fn previous(&self) -> i64 {
        self.window.previous()
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.last_update
    }

    pub fn last_trigger_value(&self) -> Option<i64> {
        self.last_trigger_value
    }
}
