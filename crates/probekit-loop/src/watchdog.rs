//! Deadline watchdog built on a repeating [`Timer`].

use std::cell::Cell;
use std::ops::ControlFlow;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::message_loop::LoopHandle;
use crate::timer::Timer;

struct WatchdogState {
    start: Instant,
    deadline: Duration,
    expired: Cell<bool>,
}

/// Aborts a stalled run once a deadline has passed.
///
/// Every firing re-measures elapsed time from the externally recorded
/// `start` instead of counting ticks, so delayed or early timer delivery
/// cannot shorten or stretch the deadline. The expiry action runs at most
/// once no matter how many firings observe the deadline as crossed.
pub struct Watchdog {
    timer: Option<Timer>,
    state: Rc<WatchdogState>,
}

impl Watchdog {
    /// Arm a watchdog checking every `interval` whether `deadline` has
    /// elapsed since `start`.
    pub fn arm<F>(
        handle: &LoopHandle,
        start: Instant,
        deadline: Duration,
        interval: Duration,
        on_expire: F,
    ) -> Self
    where
        F: FnOnce() + 'static,
    {
        let state = Rc::new(WatchdogState {
            start,
            deadline,
            expired: Cell::new(false),
        });

        let check = state.clone();
        let mut on_expire = Some(on_expire);
        let timer = Timer::new(handle, interval, move || {
            let elapsed = check.start.elapsed();
            if elapsed < check.deadline {
                trace!(elapsed_ms = elapsed.as_millis() as u64, "Watchdog check");
                return ControlFlow::Continue(());
            }

            if let Some(on_expire) = on_expire.take() {
                check.expired.set(true);
                warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    deadline_ms = check.deadline.as_millis() as u64,
                    "Watchdog deadline exceeded"
                );
                on_expire();
            }
            ControlFlow::Break(())
        });

        debug!(
            deadline_ms = deadline.as_millis() as u64,
            interval_ms = interval.as_millis() as u64,
            "Watchdog armed"
        );

        Self {
            timer: Some(timer),
            state,
        }
    }

    /// Disarm the watchdog. Returns `true` if this call did the disarming.
    pub fn cancel(&mut self) -> bool {
        match self.timer.take() {
            Some(timer) => {
                debug!(elapsed_ms = self.elapsed().as_millis() as u64, "Watchdog cancelled");
                drop(timer);
                true
            }
            None => false,
        }
    }

    /// Whether the watchdog can still fire.
    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().map(Timer::is_active).unwrap_or(false)
    }

    /// Whether the deadline was observed as crossed.
    pub fn expired(&self) -> bool {
        self.state.expired.get()
    }

    pub fn elapsed(&self) -> Duration {
        self.state.start.elapsed()
    }

    pub fn deadline(&self) -> Duration {
        self.state.deadline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_once_after_deadline() {
        let handle = LoopHandle::new().unwrap();
        let hits = Rc::new(Cell::new(0));
        let start = Instant::now();
        let deadline = Duration::from_millis(60);
        let interval = Duration::from_millis(10);

        let count = hits.clone();
        let h = handle.clone();
        let watchdog = Watchdog::arm(&handle, start, deadline, interval, move || {
            count.set(count.get() + 1);
            h.stop();
        });

        handle.run().unwrap();
        let elapsed = start.elapsed();

        assert_eq!(hits.get(), 1);
        assert!(watchdog.expired());
        assert!(!watchdog.is_armed());
        assert!(elapsed >= deadline, "expired early after {elapsed:?}");
    }

    #[test]
    fn test_cancel_is_idempotent_and_prevents_expiry() {
        let handle = LoopHandle::new().unwrap();
        let hits = Rc::new(Cell::new(0));

        let count = hits.clone();
        let mut watchdog = Watchdog::arm(
            &handle,
            Instant::now(),
            Duration::from_millis(5),
            Duration::from_millis(1),
            move || count.set(count.get() + 1),
        );
        assert!(watchdog.is_armed());
        assert!(watchdog.cancel());
        assert!(!watchdog.cancel());

        let h = handle.clone();
        let _stop = Timer::new(&handle, Duration::from_millis(30), move || {
            h.stop();
            ControlFlow::Break(())
        });
        handle.run().unwrap();

        assert_eq!(hits.get(), 0);
        assert!(!watchdog.expired());
    }

    #[test]
    fn test_start_in_the_past_counts_toward_deadline() {
        let handle = LoopHandle::new().unwrap();
        let start = Instant::now() - Duration::from_millis(500);

        let h = handle.clone();
        let watchdog = Watchdog::arm(
            &handle,
            start,
            Duration::from_millis(100),
            Duration::from_millis(5),
            move || h.stop(),
        );
        handle.run().unwrap();

        assert!(watchdog.expired());
        assert!(watchdog.elapsed() >= watchdog.deadline());
    }
}
