//! The message loop itself: posting, native pumping and the run phase.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::{Duration, Instant};

use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::timer::TimerTable;
use crate::LoopError;

type LocalTask = Box<dyn FnOnce(&LoopHandle)>;
type RemoteTask = Box<dyn FnOnce(&LoopHandle) + Send>;

/// Source of native UI events serviced by the loop.
///
/// The loop calls [`pump`](NativeEvents::pump) once per iteration, before
/// timers and posted work. Implementations must not block.
pub trait NativeEvents {
    /// Dispatch the native events that are ready. Returns how many ran.
    fn pump(&mut self, handle: &LoopHandle) -> usize;

    /// Longest the loop may sleep before pumping again.
    ///
    /// `None` means native events never need polling (the source only
    /// produces work in response to loop activity).
    fn max_wait(&self) -> Option<Duration> {
        None
    }
}

pub(crate) struct Shared {
    queue: RefCell<VecDeque<LocalTask>>,
    pub(crate) timers: RefCell<TimerTable>,
    native: RefCell<Option<Box<dyn NativeEvents>>>,
    native_generation: Cell<u64>,
    running: Cell<bool>,
    stop_requested: Cell<bool>,
    remote_tx: mpsc::UnboundedSender<RemoteTask>,
    remote_rx: RefCell<mpsc::UnboundedReceiver<RemoteTask>>,
    runtime: Runtime,
}

/// Handle to the message loop of the current thread.
///
/// Cloning is cheap and every clone refers to the same loop. The handle is
/// neither `Send` nor `Sync`; use [`LoopProxy`] to post from other threads.
///
/// Work posted while no run phase is active is kept and executes during the
/// next [`run`](LoopHandle::run). Calling `stop` outside a run phase has no
/// effect on a later run.
#[derive(Clone)]
pub struct LoopHandle {
    pub(crate) shared: Rc<Shared>,
}

/// Thread-safe poster for a [`LoopHandle`].
///
/// Posting after every `LoopHandle` (and therefore the loop) has been
/// dropped fails with [`LoopError::Closed`].
#[derive(Clone)]
pub struct LoopProxy {
    tx: mpsc::UnboundedSender<RemoteTask>,
}

struct RunGuard<'a>(&'a Shared);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.running.set(false);
        self.0.stop_requested.set(false);
    }
}

impl LoopHandle {
    /// Create a new loop for the calling thread.
    pub fn new() -> Result<Self, LoopError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let (remote_tx, remote_rx) = mpsc::unbounded_channel();

        debug!("Message loop created");

        Ok(Self {
            shared: Rc::new(Shared {
                queue: RefCell::new(VecDeque::new()),
                timers: RefCell::new(TimerTable::default()),
                native: RefCell::new(None),
                native_generation: Cell::new(0),
                running: Cell::new(false),
                stop_requested: Cell::new(false),
                remote_tx,
                remote_rx: RefCell::new(remote_rx),
                runtime,
            }),
        })
    }

    /// Create a proxy that can post from any thread.
    pub fn proxy(&self) -> LoopProxy {
        LoopProxy {
            tx: self.shared.remote_tx.clone(),
        }
    }

    /// Queue `work` to run on this loop after the current callback returns.
    ///
    /// Items run in the order they were posted.
    pub fn post<F>(&self, work: F)
    where
        F: FnOnce() + 'static,
    {
        let mut queue = self.shared.queue.borrow_mut();
        queue.push_back(Box::new(move |_: &LoopHandle| work()));
        trace!(pending = queue.len(), "Work posted");
    }

    /// Request the active run phase to return.
    ///
    /// Idempotent. The iteration in progress completes first, including the
    /// posted items that were already queued when it started.
    pub fn stop(&self) {
        if !self.shared.running.get() {
            debug!("Stop requested while loop is not running");
            return;
        }
        if !self.shared.stop_requested.replace(true) {
            debug!("Message loop stop requested");
        }
    }

    /// Whether a run phase is active.
    pub fn is_running(&self) -> bool {
        self.shared.running.get()
    }

    /// Number of posted items waiting to run (local posts only).
    pub fn pending(&self) -> usize {
        self.shared.queue.borrow().len()
    }

    /// Number of live timers.
    pub fn timer_count(&self) -> usize {
        self.shared.timers.borrow().len()
    }

    /// Install the native event source, replacing any previous one.
    pub fn attach_native(&self, events: Box<dyn NativeEvents>) {
        let previous = self.shared.native.replace(Some(events));
        self.shared
            .native_generation
            .set(self.shared.native_generation.get() + 1);
        if previous.is_some() {
            debug!("Replaced native event source");
        }
        drop(previous);
    }

    /// Remove the native event source.
    pub fn detach_native(&self) -> Option<Box<dyn NativeEvents>> {
        self.shared
            .native_generation
            .set(self.shared.native_generation.get() + 1);
        self.shared.native.borrow_mut().take()
    }

    /// Block the calling thread dispatching work until [`stop`](Self::stop).
    ///
    /// Each iteration pumps native events, fires due timers, then runs the
    /// posted items that were queued when the iteration began. Items posted
    /// by those callbacks run in the next iteration.
    pub fn run(&self) -> Result<(), LoopError> {
        if self.shared.running.replace(true) {
            warn!("Nested run() rejected");
            return Err(LoopError::AlreadyRunning);
        }
        let _guard = RunGuard(&self.shared);
        self.shared.stop_requested.set(false);

        info!(pending = self.pending(), timers = self.timer_count(), "Message loop running");

        let mut iterations: u64 = 0;
        loop {
            iterations += 1;
            self.drain_remote();
            self.pump_native();
            self.fire_due_timers();
            self.dispatch_posted();

            if self.shared.stop_requested.get() {
                break;
            }

            let wait = self.next_wait();
            self.wait_for_work(wait);
        }

        info!(iterations, leftover = self.pending(), "Message loop stopped");
        Ok(())
    }

    fn drain_remote(&self) {
        let mut rx = self.shared.remote_rx.borrow_mut();
        let mut queue = self.shared.queue.borrow_mut();
        while let Ok(task) = rx.try_recv() {
            queue.push_back(local(task));
        }
    }

    fn pump_native(&self) {
        let generation = self.shared.native_generation.get();
        let taken = self.shared.native.borrow_mut().take();
        let Some(mut native) = taken else {
            return;
        };

        let dispatched = native.pump(self);
        if dispatched > 0 {
            trace!(dispatched, "Native events pumped");
        }

        // A source attached or detached from inside its own pump wins.
        if self.shared.native_generation.get() == generation {
            *self.shared.native.borrow_mut() = Some(native);
        }
    }

    fn fire_due_timers(&self) {
        let due = self.shared.timers.borrow().due(Instant::now());
        for id in due {
            let callback = self.shared.timers.borrow_mut().take_callback(id);
            let Some(mut callback) = callback else {
                continue;
            };

            let flow = callback();

            let leftover = self
                .shared
                .timers
                .borrow_mut()
                .finish_firing(id, callback, flow, Instant::now());
            // Dropped outside the borrow: a callback may own other timers.
            drop(leftover);
        }
    }

    fn dispatch_posted(&self) {
        let count = self.shared.queue.borrow().len();
        for _ in 0..count {
            let task = self.shared.queue.borrow_mut().pop_front();
            match task {
                Some(task) => task(self),
                None => break,
            }
        }
    }

    fn next_wait(&self) -> Option<Duration> {
        if !self.shared.queue.borrow().is_empty() {
            return Some(Duration::ZERO);
        }

        let now = Instant::now();
        let timer_wait = self
            .shared
            .timers
            .borrow()
            .next_due()
            .map(|due| due.saturating_duration_since(now));
        let native_wait = self
            .shared
            .native
            .borrow()
            .as_ref()
            .and_then(|native| native.max_wait());

        match (timer_wait, native_wait) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn wait_for_work(&self, wait: Option<Duration>) {
        if wait == Some(Duration::ZERO) {
            return;
        }

        let mut rx = self.shared.remote_rx.borrow_mut();
        let received = self.shared.runtime.block_on(async {
            match wait {
                Some(wait) => tokio::time::timeout(wait, rx.recv()).await.ok().flatten(),
                None => rx.recv().await,
            }
        });

        if let Some(task) = received {
            self.shared.queue.borrow_mut().push_back(local(task));
        }
    }
}

fn local(task: RemoteTask) -> LocalTask {
    task
}

impl LoopProxy {
    /// Post `work` to the loop from any thread.
    ///
    /// `work` runs on the loop thread with that loop's handle, so it can
    /// stop the loop or post further local work there.
    pub fn post<F>(&self, work: F) -> Result<(), LoopError>
    where
        F: FnOnce(&LoopHandle) + Send + 'static,
    {
        self.tx.send(Box::new(work)).map_err(|_| LoopError::Closed)
    }

    /// Whether the loop this proxy points at has been torn down.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
