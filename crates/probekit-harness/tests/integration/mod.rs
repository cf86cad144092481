//! Integration tests for the ProbeKit harness.
//!
//! - `lifecycle`: run phases, close idempotence, external window close
//! - `watchdog`: timeout window, cancellation on completion
//! - `bridge`: completion values and bound functions

mod bridge;
mod lifecycle;
mod watchdog;
