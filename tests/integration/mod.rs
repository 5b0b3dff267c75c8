//! Integration test modules for tapesquash
//!
//! - capture: session output on disk
//! - admission: resource selection against patterns
//! - workflow: end-to-end squash through `SquashEngine`

pub mod admission;
pub mod capture;
pub mod workflow;
