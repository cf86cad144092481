//! Named native functions callable from script.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use probekit_value::Value;
use tracing::{debug, trace};

use crate::wire::{BridgeCall, BridgeReply};
use crate::BridgeError;

type Handler = Rc<dyn Fn(&[Value]) -> Result<Value, BridgeError>>;

/// The set of functions a surface exposes to its page.
///
/// Clones share the same table. Each name owns exactly one handler; binding
/// a name again replaces the previous handler without error, which lets a
/// harness re-install its completion hook between runs.
#[derive(Clone, Default)]
pub struct BindingRegistry {
    handlers: Rc<RefCell<HashMap<String, Handler>>>,
    calls: Rc<Cell<u64>>,
}

impl BindingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to an infallible handler.
    pub fn bind<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        self.bind_fallible(name, move |args| Ok(handler(args)));
    }

    /// Bind `name` to a handler whose error is raised in script.
    pub fn bind_fallible<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) -> Result<Value, BridgeError> + 'static,
    {
        let name = name.into();
        let replaced = self
            .handlers
            .borrow_mut()
            .insert(name.clone(), Rc::new(handler));
        if replaced.is_some() {
            debug!(%name, "Binding replaced");
        } else {
            debug!(%name, "Binding added");
        }
    }

    /// Remove a binding. Returns whether it existed.
    pub fn unbind(&self, name: &str) -> bool {
        self.handlers.borrow_mut().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.borrow().contains_key(name)
    }

    /// Bound names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.handlers.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Total invocations so far, including failed ones.
    pub fn call_count(&self) -> u64 {
        self.calls.get()
    }

    /// Call the handler bound to `name`.
    ///
    /// The handler is looked up and released before it runs, so it may
    /// bind or unbind names itself.
    pub fn invoke(&self, name: &str, args: &[Value]) -> Result<Value, BridgeError> {
        self.calls.set(self.calls.get() + 1);

        let handler = self.handlers.borrow().get(name).cloned();
        let Some(handler) = handler else {
            debug!(%name, "Call to unbound function");
            return Err(BridgeError::UnknownFunction(name.to_owned()));
        };

        trace!(%name, argc = args.len(), "Bridge call");
        handler(args)
    }

    /// Run a decoded wire call and build its reply.
    pub fn dispatch(&self, call: &BridgeCall) -> BridgeReply {
        match self.invoke(&call.name, &call.args) {
            Ok(value) => BridgeReply::success(call.id, value),
            Err(error) => BridgeReply::failure(call.id, error.to_string()),
        }
    }
}

impl std::fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("names", &self.names())
            .field("calls", &self.calls.get())
            .finish()
    }
}
