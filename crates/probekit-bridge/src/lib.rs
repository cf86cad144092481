//! # ProbeKit Bridge
//!
//! Exposes named native functions to page script.
//!
//! The engine marshals script arguments into [`Value`]s, calls the bound
//! handler synchronously on the UI thread and marshals the returned value
//! back. Handlers should keep their own work short: anything that changes
//! loop or window state belongs in a posted work item.
//!
//! Engines that only offer a string message channel (an IPC `postMessage`)
//! use the [`BridgeCall`]/[`BridgeReply`] wire format together with the page
//! script produced by [`shim_script`].

mod registry;
mod wire;

pub use registry::BindingRegistry;
pub use wire::{define_script, reply_script, shim_script, BridgeCall, BridgeReply};

pub use probekit_value::Value;

use thiserror::Error;

/// Errors crossing the bridge.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BridgeError {
    #[error("No native function bound as '{0}'")]
    UnknownFunction(String),

    #[error("{0}")]
    Handler(String),

    #[error("Malformed bridge message: {0}")]
    Decode(String),
}
