//! Test support utilities for harness integration tests
//!
//! - TestRun: harness, headless window and surface wired together
//! - Assertions: result and timing checks

mod assertions;
mod test_run;

pub use assertions::*;
pub use test_run::{fast_config, init_tracing, TestRun};
