//! The watchdog-protected window harness.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use probekit_loop::{LoopHandle, LoopProxy, Watchdog};
use probekit_value::Value;
use tracing::{debug, info, warn};

use crate::{HarnessConfig, HarnessError, HarnessResult, HostWindow, ViewHandle};

static NEXT_HARNESS_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Live harnesses of this thread, by id. Remote signals resolve here.
    static HARNESSES: RefCell<HashMap<u64, Weak<Inner>>> = RefCell::new(HashMap::new());
}

/// Where a harness is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Created,
    Running,
    Completed,
    TimedOut,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::TimedOut)
    }
}

enum Finish {
    Completed(Option<Value>),
    TimedOut,
}

struct RunState {
    phase: Phase,
    watchdog: Option<Watchdog>,
    closing: bool,
    captured: Option<Value>,
}

struct Inner {
    id: u64,
    handle: LoopHandle,
    window: Rc<dyn HostWindow>,
    state: RefCell<RunState>,
}

impl Inner {
    fn finish(&self, finish: Finish) {
        {
            let mut state = self.state.borrow_mut();
            if state.phase.is_terminal() {
                debug!(harness = self.id, phase = ?state.phase, "Late finish signal absorbed");
                return;
            }
            match finish {
                Finish::Completed(value) => {
                    state.phase = Phase::Completed;
                    state.captured = value;
                }
                Finish::TimedOut => state.phase = Phase::TimedOut,
            }
            info!(harness = self.id, phase = ?state.phase, "Harness finished");
        }
        self.close();
    }

    /// Cancel the watchdog, ask the window to close, stop the loop. Runs its
    /// steps at most once.
    fn close(&self) {
        let watchdog = {
            let mut state = self.state.borrow_mut();
            if state.closing {
                debug!(harness = self.id, "Close already in progress");
                return;
            }
            state.closing = true;
            state.watchdog.take()
        };

        if let Some(mut watchdog) = watchdog {
            watchdog.cancel();
        }
        info!(harness = self.id, "Closing window");
        self.window.request_close();
        self.handle.stop();
    }

    fn window_closed(&self) {
        debug!(harness = self.id, "Window closed");
        self.handle.stop();
    }
}

/// Cheap handle for signalling a harness from callbacks.
///
/// Signals are posted to the loop, never applied in place, so they are safe
/// to send from inside renderer callbacks. A signaller that outlives its
/// harness does nothing.
#[derive(Clone)]
pub struct Signaller {
    id: u64,
    inner: Weak<Inner>,
}

impl Signaller {
    /// Finish the run without a captured value.
    pub fn signal_close(&self) {
        self.post(Finish::Completed(None));
    }

    /// Finish the run, capturing `value`.
    pub fn complete(&self, value: Value) {
        self.post(Finish::Completed(Some(value)));
    }

    /// Finish the run as timed out.
    pub fn signal_timeout(&self) {
        self.post(Finish::TimedOut);
    }

    fn post(&self, finish: Finish) {
        let Some(inner) = self.inner.upgrade() else {
            debug!(harness = self.id, "Signal for a dropped harness ignored");
            return;
        };
        let target = self.inner.clone();
        inner.handle.post(move || {
            if let Some(inner) = target.upgrade() {
                inner.finish(finish);
            }
        });
    }
}

/// `Send` counterpart of [`Signaller`] for threads other than the loop's.
///
/// Each signal is posted through the loop's [`LoopProxy`] and resolved to
/// its harness on the loop thread. Posting fails once the loop is gone; a
/// signal for a harness that has been dropped is ignored.
#[derive(Clone)]
pub struct RemoteSignaller {
    id: u64,
    proxy: LoopProxy,
}

impl RemoteSignaller {
    pub fn signal_close(&self) -> Result<(), HarnessError> {
        self.post(Finish::Completed(None))
    }

    pub fn complete(&self, value: Value) -> Result<(), HarnessError> {
        self.post(Finish::Completed(Some(value)))
    }

    pub fn signal_timeout(&self) -> Result<(), HarnessError> {
        self.post(Finish::TimedOut)
    }

    fn post(&self, finish: Finish) -> Result<(), HarnessError> {
        let id = self.id;
        self.proxy.post(move |_| {
            let target = HARNESSES.with(|live| live.borrow().get(&id).and_then(Weak::upgrade));
            match target {
                Some(inner) => inner.finish(finish),
                None => debug!(harness = id, "Remote signal for a dropped harness ignored"),
            }
        })?;
        Ok(())
    }
}

impl std::fmt::Debug for RemoteSignaller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSignaller").field("id", &self.id).finish()
    }
}

/// Runs one scenario in a host window under a watchdog.
///
/// The harness owns the window and its captured state for its whole
/// lifetime. Completion and timeout both funnel into the same posted
/// teardown; whichever is dispatched first decides the result.
pub struct GuiHarness {
    inner: Rc<Inner>,
    config: HarnessConfig,
}

impl GuiHarness {
    pub fn new(handle: &LoopHandle, window: impl HostWindow + 'static, config: HarnessConfig) -> Self {
        Self::from_rc(handle, Rc::new(window), config)
    }

    pub fn from_rc(handle: &LoopHandle, window: Rc<dyn HostWindow>, config: HarnessConfig) -> Self {
        let id = NEXT_HARNESS_ID.fetch_add(1, Ordering::Relaxed);
        let inner = Rc::new(Inner {
            id,
            handle: handle.clone(),
            window,
            state: RefCell::new(RunState {
                phase: Phase::Created,
                watchdog: None,
                closing: false,
                captured: None,
            }),
        });

        HARNESSES.with(|live| live.borrow_mut().insert(id, Rc::downgrade(&inner)));

        let weak = Rc::downgrade(&inner);
        inner.window.on_closed(Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.window_closed();
            }
        }));

        info!(harness = id, timeout_ms = config.timeout_ms, "GuiHarness created");
        Self { inner, config }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn handle(&self) -> &LoopHandle {
        &self.inner.handle
    }

    pub fn window(&self) -> &Rc<dyn HostWindow> {
        &self.inner.window
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.borrow().phase
    }

    pub fn timed_out(&self) -> bool {
        self.phase() == Phase::TimedOut
    }

    pub fn signaller(&self) -> Signaller {
        Signaller {
            id: self.inner.id,
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Signaller usable from other threads, e.g. a renderer callback that
    /// arrives off the loop thread.
    pub fn remote_signaller(&self) -> RemoteSignaller {
        RemoteSignaller {
            id: self.inner.id,
            proxy: self.inner.handle.proxy(),
        }
    }

    /// Request a normal finish. Safe to call from any loop callback, any
    /// number of times.
    pub fn signal_close(&self) {
        self.signaller().signal_close();
    }

    pub fn signal_timeout(&self) {
        self.signaller().signal_timeout();
    }

    /// Show `view` in the window and run the loop until the scenario
    /// finishes or the watchdog fires. A harness runs once.
    pub fn run(&self, view: ViewHandle) -> Result<HarnessResult, HarnessError> {
        let inner = &self.inner;
        if inner.state.borrow().phase != Phase::Created {
            return Err(HarnessError::AlreadyRun);
        }

        inner.window.set_content(view)?;
        if let Some(events) = inner.window.native_events() {
            inner.handle.attach_native(events);
        }

        let start = Instant::now();
        let signaller = self.signaller();
        let watchdog = Watchdog::arm(
            &inner.handle,
            start,
            self.config.timeout(),
            self.config.watchdog_interval(),
            move || signaller.signal_timeout(),
        );
        {
            let mut state = inner.state.borrow_mut();
            state.watchdog = Some(watchdog);
            state.phase = Phase::Running;
        }

        info!(
            harness = inner.id,
            timeout_ms = self.config.timeout_ms,
            interval_ms = self.config.watchdog_interval_ms,
            "Running message loop"
        );
        let outcome = inner.handle.run();

        // One last pump lets the window finish a close requested by the
        // final iteration.
        if let Some(mut events) = inner.handle.detach_native() {
            events.pump(&inner.handle);
        }

        let (phase, captured, leftover) = {
            let mut state = inner.state.borrow_mut();
            if state.phase == Phase::Running {
                warn!(harness = inner.id, "Window closed before the scenario finished");
                state.phase = Phase::Completed;
            }
            (state.phase, state.captured.take(), state.watchdog.take())
        };
        drop(leftover);
        outcome?;

        let result = match phase {
            Phase::TimedOut => HarnessResult::TimedOut,
            _ => HarnessResult::Completed(captured),
        };
        info!(
            harness = inner.id,
            elapsed_ms = start.elapsed().as_millis() as u64,
            completed = result.did_not_time_out(),
            "Harness run finished"
        );
        Ok(result)
    }
}

impl Drop for GuiHarness {
    fn drop(&mut self) {
        let watchdog = self.inner.state.borrow_mut().watchdog.take();
        drop(watchdog);
        let id = self.inner.id;
        // Thread-local storage may already be gone during thread exit.
        let _ = HARNESSES.try_with(|live| live.borrow_mut().remove(&id));
        debug!(harness = self.inner.id, "GuiHarness dropped");
    }
}
