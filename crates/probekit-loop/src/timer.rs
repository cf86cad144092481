//! Repeating timers bound to a message loop.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::rc::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::message_loop::{LoopHandle, Shared};

/// Shortest interval a timer may use.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

type TimerCallback = Box<dyn FnMut() -> ControlFlow<()>>;

/// Unique identifier for a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct TimerEntry {
    interval: Duration,
    next_due: Instant,
    /// `None` while the callback is executing.
    callback: Option<TimerCallback>,
}

/// Live timers of one loop.
#[derive(Default)]
pub(crate) struct TimerTable {
    entries: HashMap<TimerId, TimerEntry>,
}

impl TimerTable {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Timers due at `now`, earliest first.
    pub(crate) fn due(&self, now: Instant) -> Vec<TimerId> {
        let mut due: Vec<(Instant, TimerId)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.callback.is_some() && entry.next_due <= now)
            .map(|(id, entry)| (entry.next_due, *id))
            .collect();
        due.sort();
        due.into_iter().map(|(_, id)| id).collect()
    }

    pub(crate) fn next_due(&self) -> Option<Instant> {
        self.entries
            .values()
            .filter(|entry| entry.callback.is_some())
            .map(|entry| entry.next_due)
            .min()
    }

    pub(crate) fn take_callback(&mut self, id: TimerId) -> Option<TimerCallback> {
        self.entries.get_mut(&id).and_then(|entry| entry.callback.take())
    }

    /// Put a callback back after it ran, or hand it back for disposal.
    ///
    /// The next due time is measured from `now`, so late firings coalesce
    /// instead of replaying missed ticks.
    pub(crate) fn finish_firing(
        &mut self,
        id: TimerId,
        callback: TimerCallback,
        flow: ControlFlow<()>,
        now: Instant,
    ) -> Option<TimerCallback> {
        match (self.entries.get_mut(&id), flow) {
            (Some(entry), ControlFlow::Continue(())) => {
                entry.next_due = now + entry.interval;
                entry.callback = Some(callback);
                None
            }
            (Some(_), ControlFlow::Break(())) => {
                trace!(timer = id.raw(), "Timer finished");
                self.entries.remove(&id);
                Some(callback)
            }
            // Cancelled from inside its own callback.
            (None, _) => Some(callback),
        }
    }

    fn remove(&mut self, id: TimerId) -> Option<TimerEntry> {
        self.entries.remove(&id)
    }
}

/// A repeating timer.
///
/// The callback runs on the loop thread roughly every `interval` and keeps
/// firing while it returns [`ControlFlow::Continue`]. Dropping the timer
/// cancels it; once `drop` (or [`cancel`](Timer::cancel)) returns the
/// callback is never invoked again. Timers are not `Send`, so cancellation
/// always happens on the loop thread and cannot race a firing.
pub struct Timer {
    id: TimerId,
    shared: Weak<Shared>,
}

impl Timer {
    /// Register a repeating timer on `handle`'s loop.
    pub fn new<F>(handle: &LoopHandle, interval: Duration, callback: F) -> Self
    where
        F: FnMut() -> ControlFlow<()> + 'static,
    {
        let id = TimerId::new();
        let interval = interval.max(MIN_INTERVAL);

        handle.shared.timers.borrow_mut().entries.insert(
            id,
            TimerEntry {
                interval,
                next_due: Instant::now() + interval,
                callback: Some(Box::new(callback)),
            },
        );

        debug!(timer = id.raw(), interval_ms = interval.as_millis() as u64, "Timer created");

        Self {
            id,
            shared: std::rc::Rc::downgrade(&handle.shared),
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Whether the timer will fire again.
    pub fn is_active(&self) -> bool {
        self.shared
            .upgrade()
            .map(|shared| shared.timers.borrow().entries.contains_key(&self.id))
            .unwrap_or(false)
    }

    /// Cancel the timer. Equivalent to dropping it.
    pub fn cancel(self) {}
}

impl Drop for Timer {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let removed = shared.timers.borrow_mut().remove(self.id);
        if removed.is_some() {
            debug!(timer = self.id.raw(), "Timer cancelled");
        }
        // Dropped outside the borrow: the callback may own other timers.
        drop(removed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn test_timer_ids_are_unique() {
        assert_ne!(TimerId::new(), TimerId::new());
    }

    #[test]
    fn test_timer_repeats_until_break() {
        let handle = LoopHandle::new().unwrap();
        let fired = Rc::new(Cell::new(0));

        let count = fired.clone();
        let h = handle.clone();
        let timer = Timer::new(&handle, Duration::from_millis(2), move || {
            count.set(count.get() + 1);
            if count.get() == 3 {
                h.stop();
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        handle.run().unwrap();
        assert_eq!(fired.get(), 3);
        assert!(!timer.is_active());
        assert_eq!(handle.timer_count(), 0);
    }

    #[test]
    fn test_dropped_timer_never_fires() {
        let handle = LoopHandle::new().unwrap();
        let fired = Rc::new(Cell::new(false));

        let flag = fired.clone();
        let timer = Timer::new(&handle, Duration::from_millis(1), move || {
            flag.set(true);
            ControlFlow::Continue(())
        });
        drop(timer);
        assert_eq!(handle.timer_count(), 0);

        let h = handle.clone();
        let _stop = Timer::new(&handle, Duration::from_millis(20), move || {
            h.stop();
            ControlFlow::Break(())
        });
        handle.run().unwrap();
        assert!(!fired.get());
    }

    #[test]
    fn test_timer_cancelled_from_its_own_callback() {
        let handle = LoopHandle::new().unwrap();
        let slot: Rc<RefCell<Option<Timer>>> = Rc::new(RefCell::new(None));
        let fired = Rc::new(Cell::new(0));

        let own = slot.clone();
        let count = fired.clone();
        let timer = Timer::new(&handle, Duration::from_millis(1), move || {
            count.set(count.get() + 1);
            own.borrow_mut().take();
            ControlFlow::Continue(())
        });
        *slot.borrow_mut() = Some(timer);

        let h = handle.clone();
        let _stop = Timer::new(&handle, Duration::from_millis(30), move || {
            h.stop();
            ControlFlow::Break(())
        });
        handle.run().unwrap();

        assert_eq!(fired.get(), 1);
        assert_eq!(handle.timer_count(), 0);
    }

    #[test]
    fn test_late_firings_coalesce() {
        let handle = LoopHandle::new().unwrap();
        let fired = Rc::new(Cell::new(0));

        let count = fired.clone();
        let _timer = Timer::new(&handle, Duration::from_millis(5), move || {
            count.set(count.get() + 1);
            ControlFlow::Continue(())
        });

        // Keep the loop busy well past several intervals before it can fire.
        let h = handle.clone();
        handle.post(move || {
            std::thread::sleep(Duration::from_millis(40));
            let stopper = h.clone();
            h.post(move || stopper.stop());
        });
        handle.run().unwrap();

        assert!(fired.get() <= 1, "fired {} times", fired.get());
    }

    #[test]
    fn test_timer_outliving_loop_is_inert() {
        let handle = LoopHandle::new().unwrap();
        let timer = Timer::new(&handle, Duration::from_millis(1), || ControlFlow::Continue(()));
        drop(handle);
        assert!(!timer.is_active());
    }
}
