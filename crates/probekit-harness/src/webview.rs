//! Harness specialisation for web surfaces.

use std::cell::RefCell;

use probekit_value::Value;
use tracing::debug;

use crate::{GuiHarness, HarnessError, HarnessResult, Surface};

/// A [`GuiHarness`] plus a surface whose page reports completion by calling
/// `signalTestFinished(value)`.
///
/// The first argument of the first call is captured (`null` when called with
/// no arguments); later calls are absorbed.
pub struct WebViewHarness<S: Surface> {
    gui: GuiHarness,
    surface: S,
    captured: RefCell<Option<Value>>,
}

impl<S: Surface> WebViewHarness<S> {
    pub const COMPLETION_FUNCTION: &'static str = "signalTestFinished";

    pub fn new(gui: GuiHarness, surface: S) -> Self {
        let signaller = gui.signaller();
        surface.bind(Self::COMPLETION_FUNCTION, move |args| {
            let value = args.first().cloned().unwrap_or(Value::Null);
            debug!(value = %value.to_json(), "Completion function called");
            signaller.complete(value);
            Value::Null
        });
        Self {
            gui,
            surface,
            captured: RefCell::new(None),
        }
    }

    pub fn gui(&self) -> &GuiHarness {
        &self.gui
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    /// Run the page until it signals completion or the watchdog fires.
    pub fn run(&self) -> Result<HarnessResult, HarnessError> {
        let result = self.gui.run(self.surface.view_handle())?;
        *self.captured.borrow_mut() = result.captured().cloned();
        Ok(result)
    }

    /// The value captured by the last completed run.
    pub fn captured(&self) -> Option<Value> {
        self.captured.borrow().clone()
    }
}
