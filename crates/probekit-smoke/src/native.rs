//! Real webview surface: a `wry` webview inside a `tao` window.
//!
//! The process owns one `tao` event loop ([`NativeHost`]); each run opens a
//! fresh window on it. The harness loop pumps that event loop through
//! `run_return`, so native events, timers and posted work interleave on the
//! one UI thread.

use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use probekit_bridge::{reply_script, shim_script, BindingRegistry, BridgeCall};
use probekit_harness::{
    GuiHarness, HarnessConfig, HarnessError, HostWindow, NativeView, Surface, SurfaceOptions,
    ViewHandle, WebViewHarness,
};
use probekit_loop::{LoopHandle, NativeEvents};
use probekit_net::{FailurePolicy, Interception, Interceptor, VirtualOrigin};
use tao::dpi::LogicalSize;
use tao::event::{Event, WindowEvent};
use tao::event_loop::{ControlFlow, EventLoop};
use tao::platform::run_return::EventLoopExtRunReturn;
use tao::window::{Window, WindowBuilder};
use tracing::{debug, info, warn};
use wry::dpi::LogicalPosition;
use wry::http::header::CONTENT_TYPE;
use wry::http::{Request, Response, StatusCode};
use wry::{Rect, WebView, WebViewBuilder};

use crate::{Scenario, ScenarioReport, SmokeError};

/// Custom protocol the virtual origin is served on.
pub const SCHEME: &str = "probe";

const POLL_INTERVAL: Duration = Duration::from_millis(8);

/// Base URL the webview uses for [`SCHEME`].
pub fn origin() -> VirtualOrigin {
    if cfg!(any(target_os = "windows", target_os = "android")) {
        VirtualOrigin::new("http://probe.localhost/").unwrap_or_default()
    } else {
        VirtualOrigin::default()
    }
}

/// The failure policy a webview can express. A custom protocol handler
/// always answers, so a network error becomes `502 Bad Gateway`.
pub fn effective_policy(policy: FailurePolicy) -> FailurePolicy {
    FailurePolicy::Status(failure_status(policy))
}

fn failure_status(policy: FailurePolicy) -> u16 {
    match policy {
        FailurePolicy::Status(code) => code,
        FailurePolicy::NetworkError => StatusCode::BAD_GATEWAY.as_u16(),
    }
}

/// Owner of the process-wide `tao` event loop.
pub struct NativeHost {
    event_loop: Rc<RefCell<EventLoop<()>>>,
}

impl NativeHost {
    pub fn new() -> Self {
        Self {
            event_loop: Rc::new(RefCell::new(EventLoop::new())),
        }
    }

    pub fn create_window(&self, title: &str) -> Result<NativeWindow, HarnessError> {
        let window = WindowBuilder::new()
            .with_title(title)
            .with_inner_size(LogicalSize::new(800.0, 600.0))
            .build(&*self.event_loop.borrow())
            .map_err(|e| HarnessError::Window(e.to_string()))?;
        info!(%title, "Native window created");

        Ok(NativeWindow {
            shared: Rc::new(WindowShared {
                event_loop: self.event_loop.clone(),
                window: RefCell::new(Some(window)),
                content: RefCell::new(None),
                attach_pending: Cell::new(false),
                close_pending: Cell::new(false),
                closed: Cell::new(false),
                listener: RefCell::new(None),
            }),
        })
    }
}

impl Default for NativeHost {
    fn default() -> Self {
        Self::new()
    }
}

struct WindowShared {
    event_loop: Rc<RefCell<EventLoop<()>>>,
    window: RefCell<Option<Window>>,
    content: RefCell<Option<ViewHandle>>,
    attach_pending: Cell<bool>,
    close_pending: Cell<bool>,
    closed: Cell<bool>,
    listener: RefCell<Option<Box<dyn FnMut()>>>,
}

impl WindowShared {
    fn close(&self) {
        self.closed.set(true);
        let content = self.content.borrow_mut().take();
        if let Some(view) = content {
            view.detached();
        }
        let window = self.window.borrow_mut().take();
        drop(window);
        info!("Native window closed");

        let listener = self.listener.borrow_mut().take();
        if let Some(mut listener) = listener {
            listener();
            let mut slot = self.listener.borrow_mut();
            if slot.is_none() {
                *slot = Some(listener);
            }
        }
    }
}

/// A `tao` window. Clones share the same window.
#[derive(Clone)]
pub struct NativeWindow {
    shared: Rc<WindowShared>,
}

impl HostWindow for NativeWindow {
    fn set_content(&self, view: ViewHandle) -> Result<(), HarnessError> {
        if self.shared.closed.get() {
            return Err(HarnessError::Window("window is closed".into()));
        }
        let previous = self.shared.content.replace(Some(view));
        if let Some(previous) = previous {
            previous.detached();
        }
        self.shared.attach_pending.set(true);
        Ok(())
    }

    fn request_close(&self) {
        if self.shared.closed.get() || self.shared.close_pending.replace(true) {
            debug!("Repeated close request ignored");
        }
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }

    fn on_closed(&self, listener: Box<dyn FnMut()>) {
        *self.shared.listener.borrow_mut() = Some(listener);
    }

    fn native_events(&self) -> Option<Box<dyn NativeEvents>> {
        Some(Box::new(WindowEvents {
            shared: self.shared.clone(),
        }))
    }
}

struct WindowEvents {
    shared: Rc<WindowShared>,
}

impl NativeEvents for WindowEvents {
    fn pump(&mut self, _handle: &LoopHandle) -> usize {
        let shared = &self.shared;
        let mut dispatched = 0;

        if shared.attach_pending.replace(false) {
            dispatched += 1;
            let view = shared.content.borrow().clone();
            if let Some(view) = view {
                if let Err(error) = view.attached() {
                    warn!(%error, "View failed to attach");
                }
            }
        }

        if !shared.closed.get() {
            let mut user_closed = false;
            shared
                .event_loop
                .borrow_mut()
                .run_return(|event, _, control_flow| {
                    *control_flow = ControlFlow::Poll;
                    match event {
                        Event::WindowEvent {
                            event: WindowEvent::CloseRequested,
                            ..
                        } => user_closed = true,
                        Event::MainEventsCleared => *control_flow = ControlFlow::Exit,
                        _ => {}
                    }
                    dispatched += 1;
                });
            if user_closed {
                info!("Window closed by user");
                shared.close_pending.set(true);
            }
        }

        if shared.close_pending.get() && !shared.closed.get() {
            dispatched += 1;
            shared.close();
        }
        dispatched
    }

    fn max_wait(&self) -> Option<Duration> {
        let busy = self.shared.attach_pending.get()
            || (self.shared.close_pending.get() && !self.shared.closed.get());
        Some(if busy { Duration::ZERO } else { POLL_INTERVAL })
    }
}

struct WryView {
    window: NativeWindow,
    interceptor: Interceptor,
    origin: VirtualOrigin,
    bindings: BindingRegistry,
    handle: LoopHandle,
    webview: Rc<RefCell<Option<WebView>>>,
}

fn respond(interceptor: &Interceptor, path: &str) -> Response<Cow<'static, [u8]>> {
    let interception = interceptor.intercept(path);
    let code = match &interception {
        Interception::Served(_) => StatusCode::OK.as_u16(),
        Interception::NotFound => StatusCode::NOT_FOUND.as_u16(),
        Interception::Failed(_) => failure_status(interceptor.policy()),
    };

    let mut builder = Response::builder().status(code);
    let body = match interception {
        Interception::Served(resource) => {
            builder = builder.header(CONTENT_TYPE, resource.media_type());
            resource.bytes().to_vec()
        }
        _ => Vec::new(),
    };
    builder.body(Cow::Owned(body)).unwrap_or_else(|error| {
        warn!(%path, %error, "Could not build response");
        Response::new(Cow::Borrowed(&[][..]))
    })
}

impl NativeView for WryView {
    fn attached(&self) -> Result<(), HarnessError> {
        let window = self.window.shared.window.borrow();
        let window = window
            .as_ref()
            .ok_or_else(|| HarnessError::Window("window is closed".into()))?;

        let interceptor = self.interceptor.clone();
        let bindings = self.bindings.clone();
        let handle = self.handle.clone();
        let slot = Rc::downgrade(&self.webview);

        let size = window.inner_size().to_logical::<f64>(window.scale_factor());
        let webview = WebViewBuilder::new()
            .with_custom_protocol(SCHEME.into(), move |_id, request: Request<Vec<u8>>| {
                respond(&interceptor, request.uri().path())
            })
            .with_ipc_handler(move |request: Request<String>| {
                let call = match BridgeCall::from_json(request.body()) {
                    Ok(call) => call,
                    Err(error) => {
                        warn!(%error, "Malformed bridge message");
                        return;
                    }
                };
                let script = reply_script(&bindings.dispatch(&call));
                let slot = slot.clone();
                handle.post(move || {
                    let Some(slot) = slot.upgrade() else {
                        return;
                    };
                    if let Some(webview) = slot.borrow().as_ref() {
                        if let Err(error) = webview.evaluate_script(&script) {
                            warn!(%error, "Could not deliver bridge reply");
                        }
                    }
                });
            })
            .with_initialization_script(&shim_script(&self.bindings.names()))
            .with_url(self.origin.base().as_str())
            .with_bounds(Rect {
                position: LogicalPosition::new(0.0, 0.0).into(),
                size: wry::dpi::LogicalSize::new(size.width, size.height).into(),
            })
            .build_as_child(window)
            .map_err(|e| HarnessError::Surface(e.to_string()))?;

        info!(url = self.origin.base().as_str(), "Webview created");
        *self.webview.borrow_mut() = Some(webview);
        Ok(())
    }

    fn detached(&self) {
        let webview = self.webview.borrow_mut().take();
        drop(webview);
        debug!("Webview destroyed");
    }
}

/// A `wry` webview serving its pages from a resource handler.
pub struct WrySurface {
    view: Rc<WryView>,
}

impl WrySurface {
    pub fn new(handle: &LoopHandle, window: &NativeWindow, options: SurfaceOptions) -> Self {
        let interceptor =
            Interceptor::from_rc(options.resources).with_policy(options.failure_policy);
        Self {
            view: Rc::new(WryView {
                window: window.clone(),
                interceptor,
                origin: options.origin,
                bindings: BindingRegistry::new(),
                handle: handle.clone(),
                webview: Rc::new(RefCell::new(None)),
            }),
        }
    }

    pub fn requested_paths(&self) -> Vec<String> {
        self.view.interceptor.requested_paths()
    }
}

impl Surface for WrySurface {
    fn view_handle(&self) -> ViewHandle {
        ViewHandle::new(self.view.clone())
    }

    fn bindings(&self) -> &BindingRegistry {
        &self.view.bindings
    }
}

/// Run one scenario in a real webview.
pub fn run_native(
    host: &NativeHost,
    scenario: Scenario,
    config: &HarnessConfig,
) -> Result<ScenarioReport, SmokeError> {
    let policy = effective_policy(config.failure_policy);
    let handle = LoopHandle::new().map_err(HarnessError::from)?;
    let window = host.create_window(&format!("probekit: {}", scenario.name()))?;
    let gui = GuiHarness::new(&handle, window.clone(), config.clone());

    let options = SurfaceOptions::from_rc(scenario.resources(gui.signaller()))
        .with_failure_policy(policy)
        .with_origin(origin())
        .with_debug(config.debug);
    let surface = WrySurface::new(&handle, &window, options);

    let harness = WebViewHarness::new(gui, surface);
    let start = Instant::now();
    let result = harness.run()?;

    Ok(ScenarioReport::new(
        scenario,
        policy,
        result,
        harness.surface().requested_paths(),
        start.elapsed(),
    ))
}
