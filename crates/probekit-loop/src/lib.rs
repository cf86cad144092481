//! # ProbeKit Loop
//!
//! The cooperative message loop every harness run executes on.
//!
//! ## Design Goals
//!
//! 1. **One thread**: UI events, timers and posted work are serialized by
//!    dispatch order; nothing in this crate spawns threads.
//! 2. **Deferral over re-entry**: work that must happen "later" is posted,
//!    never run by nesting a second `run()`.
//! 3. **Safe cancellation**: dropping a [`Timer`] or cancelling a
//!    [`Watchdog`] guarantees its callback is not invoked again.

mod message_loop;
mod timer;
mod watchdog;

pub use message_loop::{LoopHandle, LoopProxy, NativeEvents};
pub use timer::{Timer, TimerId};
pub use watchdog::Watchdog;

use thiserror::Error;

/// Errors reported by the message loop.
#[derive(Error, Debug)]
pub enum LoopError {
    #[error("Message loop is already running on this thread")]
    AlreadyRunning,

    #[error("Message loop has been torn down")]
    Closed,

    #[error("Failed to start loop runtime: {0}")]
    Runtime(#[from] std::io::Error),
}
