//! # ProbeKit Harness
//!
//! Runs one test scenario against an embedded rendering surface inside a
//! host window, on the cooperative loop from `probekit-loop`.
//!
//! ## Lifecycle
//!
//! `Created → Running → {Completed | TimedOut}`. A run ends when page
//! script calls the completion function (or native code signals close), or
//! when the watchdog deadline passes. Either path posts the same teardown:
//! cancel the watchdog, request the window to close, stop the loop. The
//! teardown is idempotent, so a completion and a timeout landing in the same
//! tick resolve to whichever was posted first.
//!
//! ## Ownership
//!
//! Window, surface and captured state live on the loop thread. Posted work
//! items hold weak references to the harness, so an item that outlives its
//! harness does nothing instead of touching freed state.

mod config;
mod gui;
pub mod headless;
mod surface;
mod webview;

pub use config::{HarnessConfig, INTERVAL_ENV, TIMEOUT_ENV};
pub use gui::{GuiHarness, Phase, RemoteSignaller, Signaller};
pub use surface::{HostWindow, NativeView, Surface, SurfaceOptions, ViewHandle};
pub use webview::WebViewHarness;

pub use probekit_loop::{LoopHandle, LoopProxy};
pub use probekit_value::Value;

use probekit_loop::LoopError;
use serde::Serialize;
use thiserror::Error;

/// Errors that abort a harness run.
///
/// Timeouts are not errors: they are a [`HarnessResult`].
#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Loop error: {0}")]
    Loop(#[from] LoopError),

    #[error("Harness has already been run")]
    AlreadyRun,

    #[error("Window error: {0}")]
    Window(String),

    #[error("Surface error: {0}")]
    Surface(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid configuration JSON: {0}")]
    ConfigJson(#[from] serde_json::Error),
}

/// Terminal outcome of one run.
#[derive(Debug, Clone, PartialEq)]
pub enum HarnessResult {
    /// The run finished before the deadline, with the value script passed
    /// to the completion function, if any.
    Completed(Option<Value>),
    /// The watchdog deadline passed first.
    TimedOut,
}

impl HarnessResult {
    pub fn did_not_time_out(&self) -> bool {
        matches!(self, HarnessResult::Completed(_))
    }

    pub fn captured(&self) -> Option<&Value> {
        match self {
            HarnessResult::Completed(value) => value.as_ref(),
            HarnessResult::TimedOut => None,
        }
    }

    pub fn into_outcome(self) -> HarnessOutcome {
        match self {
            HarnessResult::Completed(value) => HarnessOutcome {
                completed: true,
                value,
            },
            HarnessResult::TimedOut => HarnessOutcome {
                completed: false,
                value: None,
            },
        }
    }
}

/// Flattened outcome for reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HarnessOutcome {
    /// `false` when the run timed out.
    pub completed: bool,
    pub value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_accessors() {
        let done = HarnessResult::Completed(Some(Value::from(1)));
        assert!(done.did_not_time_out());
        assert_eq!(done.captured(), Some(&Value::from(1)));

        assert!(!HarnessResult::TimedOut.did_not_time_out());
        assert_eq!(HarnessResult::TimedOut.captured(), None);
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = HarnessResult::Completed(Some(Value::object([("ok", Value::from(true))])))
            .into_outcome();
        assert_eq!(
            serde_json::to_string(&outcome).unwrap(),
            r#"{"completed":true,"value":{"ok":true}}"#
        );
        assert_eq!(
            serde_json::to_string(&HarnessResult::TimedOut.into_outcome()).unwrap(),
            r#"{"completed":false,"value":null}"#
        );
    }
}
