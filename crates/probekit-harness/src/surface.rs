//! Seams between the harness and a concrete windowing/rendering stack.

use std::fmt;
use std::rc::Rc;

use probekit_bridge::BindingRegistry;
use probekit_loop::NativeEvents;
use probekit_net::{FailurePolicy, ResourceHandler, VirtualOrigin};
use probekit_value::Value;

use crate::HarnessError;

/// A native view that can be placed inside a [`HostWindow`].
pub trait NativeView {
    /// Called by the window once the view is attached and visible.
    fn attached(&self) -> Result<(), HarnessError>;

    /// Called by the window when it destroys the view.
    fn detached(&self) {}
}

/// Opaque, shareable reference to a surface's native view.
#[derive(Clone)]
pub struct ViewHandle(Rc<dyn NativeView>);

impl ViewHandle {
    pub fn new(view: Rc<dyn NativeView>) -> Self {
        Self(view)
    }

    pub fn attached(&self) -> Result<(), HarnessError> {
        self.0.attached()
    }

    pub fn detached(&self) {
        self.0.detached()
    }
}

impl fmt::Debug for ViewHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ViewHandle")
            .field(&Rc::as_ptr(&self.0).cast::<()>())
            .finish()
    }
}

/// A top-level window hosting one view.
///
/// All methods are called on the loop thread.
pub trait HostWindow {
    /// Make `view` the window's content.
    fn set_content(&self, view: ViewHandle) -> Result<(), HarnessError>;

    /// Ask the window to close. Closing happens asynchronously; calling this
    /// again while a close is pending or done has no further effect.
    fn request_close(&self);

    fn is_closed(&self) -> bool;

    /// Register the listener run once the window has actually closed.
    fn on_closed(&self, listener: Box<dyn FnMut()>);

    /// The native event source the loop should pump while this window is up.
    fn native_events(&self) -> Option<Box<dyn NativeEvents>> {
        None
    }
}

/// An embedded rendering surface: loads pages from a resource handler and
/// exposes named native functions to its scripts.
pub trait Surface {
    fn view_handle(&self) -> ViewHandle;

    fn bindings(&self) -> &BindingRegistry;

    /// Expose `handler` to page script as `name`. Rebinding replaces.
    fn bind<F>(&self, name: &str, handler: F)
    where
        F: Fn(&[Value]) -> Value + 'static,
        Self: Sized,
    {
        self.bindings().bind(name, handler);
    }
}

/// Construction options shared by every surface implementation.
#[derive(Clone)]
pub struct SurfaceOptions {
    pub resources: Rc<dyn ResourceHandler>,
    pub failure_policy: FailurePolicy,
    pub origin: VirtualOrigin,
    /// Enables developer tooling where the renderer has any.
    pub debug: bool,
}

impl SurfaceOptions {
    pub fn new(resources: impl ResourceHandler + 'static) -> Self {
        Self::from_rc(Rc::new(resources))
    }

    pub fn from_rc(resources: Rc<dyn ResourceHandler>) -> Self {
        Self {
            resources,
            failure_policy: FailurePolicy::default(),
            origin: VirtualOrigin::default(),
            debug: false,
        }
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_origin(mut self, origin: VirtualOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl fmt::Debug for SurfaceOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceOptions")
            .field("failure_policy", &self.failure_policy)
            .field("origin", &self.origin.base().as_str())
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}
