//! Execution engine for djdeploy
//!
//! The engine orchestrates:
//! 1. Diffing - Compute current vs desired state
//! 2. Executing - Confirm, converge each application in order, summarize

pub mod differ;
pub mod executor;

pub use executor::{ExecuteOptions, execute};
