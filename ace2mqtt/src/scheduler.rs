use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, TimeDelta, Utc};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use log::{debug, error, warn};

use crate::clock::Clock;

/// Real time between two looks at the clock while waiting for the next firing.
pub const DEFAULT_RESOLUTION: Duration = Duration::from_millis(250);

struct Running {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs an action on a fixed interval on its own thread.
///
/// The action runs once synchronously in [`start`](Self::start) and then
/// whenever `interval` has passed on the injected clock since the previous
/// firing. Errors returned by the action are logged and do not stop the
/// timer. [`stop`](Self::stop) (or dropping the scheduler) cancels it and
/// joins the thread.
pub struct PeriodicScheduler {
    name: String,
    interval: TimeDelta,
    resolution: Duration,
    clock: Arc<dyn Clock>,
    running: Option<Running>,
}

impl PeriodicScheduler {
    pub fn new(name: impl Into<String>, interval: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            interval,
            resolution: DEFAULT_RESOLUTION,
            clock,
            running: None,
        }
    }

    pub fn with_resolution(mut self, resolution: Duration) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> TimeDelta {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn start<F>(&mut self, mut action: F) -> anyhow::Result<()>
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        if self.is_running() {
            warn!("{}: already running, restarting", self.name);
            self.stop();
        }

        fire(&self.name, &mut action);

        let (stop, stopped) = bounded::<()>(1);
        let name = self.name.clone();
        let interval = self.interval;
        let resolution = self.resolution;
        let clock = self.clock.clone();
        let mut next_due = due_after(clock.now(), interval);

        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                loop {
                    let wait = (next_due - clock.now())
                        .to_std()
                        .unwrap_or(Duration::ZERO)
                        .min(resolution);
                    match stopped.recv_timeout(wait) {
                        Err(RecvTimeoutError::Timeout) => {}
                        // stop requested or scheduler dropped
                        _ => break,
                    }
                    if clock.now() >= next_due {
                        fire(&name, &mut action);
                        next_due = due_after(clock.now(), interval);
                    }
                }
                debug!("{name}: stopped");
            })
            .with_context(|| format!("could not spawn timer thread {}", self.name))?;

        self.running = Some(Running { stop, handle });
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(Running { stop, handle }) = self.running.take() {
            // a full channel already carries a stop request
            let _ = stop.try_send(());
            drop(stop);
            if handle.join().is_err() {
                error!("{}: timer thread panicked", self.name);
            }
        }
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

// An interval past the end of the calendar never comes due.
fn due_after(now: DateTime<Utc>, interval: TimeDelta) -> DateTime<Utc> {
    now.checked_add_signed(interval)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn fire<F>(name: &str, action: &mut F)
where
    F: FnMut() -> anyhow::Result<()>,
{
    if let Err(e) = action() {
        error!("{name}: periodic action failed: {e:#}");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    use super::*;
    use crate::clock::ManualClock;

    fn wait_for(counter: &AtomicUsize, expected: usize) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if counter.load(Ordering::SeqCst) >= expected {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    fn scheduler(clock: &Arc<ManualClock>) -> PeriodicScheduler {
        PeriodicScheduler::new("test", TimeDelta::seconds(60), clock.clone())
            .with_resolution(Duration::from_millis(5))
    }

    #[test]
    fn nothing_runs_before_start() {
        let clock = Arc::new(ManualClock::default());
        let scheduler = scheduler(&clock);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn fires_immediately_and_then_on_interval() {
        let clock = Arc::new(ManualClock::default());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let mut scheduler = scheduler(&clock);
        scheduler
            .start(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);

        clock.advance(TimeDelta::seconds(30));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), 1);

        clock.advance(TimeDelta::seconds(30));
        assert!(wait_for(&count, 2));

        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[test]
    fn failing_action_keeps_the_timer_alive() {
        let clock = Arc::new(ManualClock::default());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let mut scheduler = scheduler(&clock);
        scheduler
            .start(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("broker unreachable")
            })
            .unwrap();

        clock.advance(TimeDelta::seconds(60));
        assert!(wait_for(&count, 2));
        clock.advance(TimeDelta::seconds(60));
        assert!(wait_for(&count, 3));
    }

    #[test]
    fn huge_interval_fires_only_at_start() {
        let clock = Arc::new(ManualClock::default());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let mut scheduler = PeriodicScheduler::new("test", TimeDelta::MAX, clock.clone())
            .with_resolution(Duration::from_millis(5));
        scheduler
            .start(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        clock.advance(TimeDelta::days(365 * 1000));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_running());
        scheduler.stop();
    }

    #[test]
    fn stopped_timer_does_not_fire() {
        let clock = Arc::new(ManualClock::default());
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let mut scheduler = scheduler(&clock);
        scheduler
            .start(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        scheduler.stop();
        scheduler.stop();

        clock.advance(TimeDelta::seconds(600));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
