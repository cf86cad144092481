//! Deterministic in-process window and renderer.
//!
//! [`HeadlessWindow`] queues its lifecycle events and delivers them when the
//! loop pumps it, the way a native window delivers them through its event
//! queue. [`HeadlessSurface`] navigates through the same [`Interceptor`] a
//! real renderer uses and runs Rust closures registered per path in place of
//! page script.

mod bmp;
mod script;

pub use bmp::{decode_bmp, DecodeError, ImageData};
pub use script::{FetchResponse, ScriptContext, ScriptError};

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use probekit_bridge::BindingRegistry;
use probekit_loop::{LoopHandle, NativeEvents};
use probekit_net::{Interceptor, ResponseStatus, VirtualOrigin};
use tracing::{debug, info, warn};

use crate::{HarnessError, HostWindow, NativeView, Surface, SurfaceOptions, ViewHandle};

enum WindowEvent {
    ContentAttached,
    Closed,
}

#[derive(Default)]
struct WindowShared {
    content: RefCell<Option<ViewHandle>>,
    events: RefCell<VecDeque<WindowEvent>>,
    closed: Cell<bool>,
    close_pending: Cell<bool>,
    close_requests: Cell<usize>,
    listener: RefCell<Option<Box<dyn FnMut()>>>,
}

/// A window with no pixels. Clones share the same window.
#[derive(Clone, Default)]
pub struct HeadlessWindow {
    shared: Rc<WindowShared>,
}

impl HeadlessWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times a close was requested, including absorbed repeats.
    pub fn close_requests(&self) -> usize {
        self.shared.close_requests.get()
    }

    pub fn content(&self) -> Option<ViewHandle> {
        self.shared.content.borrow().clone()
    }
}

impl HostWindow for HeadlessWindow {
    fn set_content(&self, view: ViewHandle) -> Result<(), HarnessError> {
        if self.shared.closed.get() {
            return Err(HarnessError::Window("window is closed".into()));
        }
        let previous = self.shared.content.replace(Some(view));
        if let Some(previous) = previous {
            previous.detached();
        }
        self.shared
            .events
            .borrow_mut()
            .push_back(WindowEvent::ContentAttached);
        Ok(())
    }

    fn request_close(&self) {
        let shared = &self.shared;
        shared.close_requests.set(shared.close_requests.get() + 1);
        if shared.closed.get() || shared.close_pending.replace(true) {
            debug!(requests = shared.close_requests.get(), "Repeated close request ignored");
            return;
        }
        shared.events.borrow_mut().push_back(WindowEvent::Closed);
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }

    fn on_closed(&self, listener: Box<dyn FnMut()>) {
        *self.shared.listener.borrow_mut() = Some(listener);
    }

    fn native_events(&self) -> Option<Box<dyn NativeEvents>> {
        Some(Box::new(HeadlessEvents {
            shared: self.shared.clone(),
        }))
    }
}

struct HeadlessEvents {
    shared: Rc<WindowShared>,
}

impl HeadlessEvents {
    fn closed(&self) {
        self.shared.closed.set(true);
        let content = self.shared.content.borrow_mut().take();
        if let Some(view) = content {
            view.detached();
        }

        let listener = self.shared.listener.borrow_mut().take();
        if let Some(mut listener) = listener {
            listener();
            let mut slot = self.shared.listener.borrow_mut();
            if slot.is_none() {
                *slot = Some(listener);
            }
        }
        debug!("Headless window closed");
    }
}

impl NativeEvents for HeadlessEvents {
    fn pump(&mut self, _handle: &LoopHandle) -> usize {
        let mut dispatched = 0;
        loop {
            let event = self.shared.events.borrow_mut().pop_front();
            let Some(event) = event else {
                break;
            };
            dispatched += 1;

            match event {
                WindowEvent::ContentAttached => {
                    let view = self.shared.content.borrow().clone();
                    if let Some(view) = view {
                        if let Err(error) = view.attached() {
                            warn!(%error, "View failed to attach");
                        }
                    }
                }
                WindowEvent::Closed => self.closed(),
            }
        }
        dispatched
    }

    fn max_wait(&self) -> Option<Duration> {
        (!self.shared.events.borrow().is_empty()).then_some(Duration::ZERO)
    }
}

type Script = Rc<dyn Fn(&ScriptContext<'_>) -> Result<(), ScriptError>>;

/// The document a surface last navigated to.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: String,
    pub status: ResponseStatus,
    pub media_type: Option<String>,
}

struct Engine {
    interceptor: Interceptor,
    origin: VirtualOrigin,
    bindings: BindingRegistry,
    scripts: RefCell<HashMap<String, Script>>,
    evaluated_modules: RefCell<HashSet<String>>,
    document: RefCell<Option<Document>>,
    uncaught: RefCell<Vec<ScriptError>>,
    console: RefCell<Vec<String>>,
    debug: bool,
}

impl Engine {
    fn script(&self, path: &str) -> Option<Script> {
        self.scripts.borrow().get(path).cloned()
    }

    fn navigate(&self, path: &str) -> Document {
        let interception = self.interceptor.intercept(path);
        let status = interception.status(self.interceptor.policy());
        let document = Document {
            path: path.to_owned(),
            status,
            media_type: interception.resource().map(|r| r.essence()),
        };
        info!(%path, status = ?document.status, "Navigated");

        self.evaluated_modules.borrow_mut().clear();
        *self.document.borrow_mut() = Some(document.clone());

        let is_page = interception.resource().map(|r| r.is_html()).unwrap_or(false);
        if is_page {
            if let Some(script) = self.script(path) {
                let context = ScriptContext::new(self, path);
                if let Err(error) = script(&context) {
                    warn!(%path, %error, "Uncaught script error");
                    self.uncaught.borrow_mut().push(error);
                }
            }
        }
        document
    }

    fn evaluate_module(&self, path: &str) -> Result<(), ScriptError> {
        if !self.evaluated_modules.borrow_mut().insert(path.to_owned()) {
            return Ok(());
        }
        match self.script(path) {
            Some(script) => script(&ScriptContext::new(self, path)),
            None => Ok(()),
        }
    }
}

impl NativeView for Engine {
    fn attached(&self) -> Result<(), HarnessError> {
        self.navigate("/");
        Ok(())
    }

    fn detached(&self) {
        debug!("Headless surface detached");
    }
}

/// A rendering surface that runs registered closures instead of page script.
///
/// On attach it loads `/`. When a page or module is served, the closure
/// registered for its path runs with a [`ScriptContext`].
#[derive(Clone)]
pub struct HeadlessSurface {
    engine: Rc<Engine>,
}

impl HeadlessSurface {
    pub fn new(options: SurfaceOptions) -> Self {
        let interceptor =
            Interceptor::from_rc(options.resources).with_policy(options.failure_policy);
        Self {
            engine: Rc::new(Engine {
                interceptor,
                origin: options.origin,
                bindings: BindingRegistry::new(),
                scripts: RefCell::new(HashMap::new()),
                evaluated_modules: RefCell::new(HashSet::new()),
                document: RefCell::new(None),
                uncaught: RefCell::new(Vec::new()),
                console: RefCell::new(Vec::new()),
                debug: options.debug,
            }),
        }
    }

    /// Run `script` whenever the page or module at `path` is evaluated.
    pub fn register_script<F>(&self, path: impl Into<String>, script: F)
    where
        F: Fn(&ScriptContext<'_>) -> Result<(), ScriptError> + 'static,
    {
        self.engine
            .scripts
            .borrow_mut()
            .insert(path.into(), Rc::new(script));
    }

    /// Load `path` as the top-level document.
    pub fn navigate(&self, path: &str) -> Document {
        self.engine.navigate(path)
    }

    pub fn document(&self) -> Option<Document> {
        self.engine.document.borrow().clone()
    }

    pub fn requested_paths(&self) -> Vec<String> {
        self.engine.interceptor.requested_paths()
    }

    /// Errors thrown by page scripts and not caught.
    pub fn uncaught_errors(&self) -> Vec<ScriptError> {
        self.engine.uncaught.borrow().clone()
    }

    pub fn console(&self) -> Vec<String> {
        self.engine.console.borrow().clone()
    }
}

impl Surface for HeadlessSurface {
    fn view_handle(&self) -> ViewHandle {
        ViewHandle::new(self.engine.clone())
    }

    fn bindings(&self) -> &BindingRegistry {
        &self.engine.bindings
    }
}
