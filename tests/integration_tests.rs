//! Integration tests for the tapesquash engine
//!
//! Capture runs are driven block by block from the test thread; no audio
//! device is involved.
//!
//! Test categories:
//! - Capture: bit-exact container output, cancellation, ring hand-off
//! - Admission: limit modes and reduced selections over real patterns
//! - Workflow: analyse, capture, commit, undo through the engine
//!
//! Run with:
//! ```bash
//! cargo test -p tapesquash --test integration_tests
//! ```

mod helpers;
mod integration;
