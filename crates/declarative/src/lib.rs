//! # Declarative
//!
//! A framework for declarative resource convergence.
//!
//! This crate provides the core abstractions for declaring desired state,
//! detecting current state, and converging systems to match the desired state.
//!
//! ## Core Concepts
//!
//! - **Resource**: Something with state that can be managed (a deployed app, a file)
//! - **ResourceState**: The current or desired state of a resource
//! - **ExecutionPlan**: An ordered list of resources
//! - **Executor**: Applies resources one at a time and reports what changed
//! - **DeploymentState**: Values one resource publishes for its siblings
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{ExecuteOptions, ExecutionPlan, execute_simple};
//!
//! let mut plan = ExecutionPlan::new();
//! plan.add_resource(Box::new(my_resource));
//!
//! let summary = execute_simple(plan, ExecuteOptions::default(), &runner)?;
//! println!("{} changed", summary.total_changes());
//! ```
//!
//! ## Collaborator Traits
//!
//! The crate uses traits for dependency injection:
//!
//! - [`CommandRunner`]: Runs subprocesses
//! - [`ProgressCallback`]: Receives progress updates
//! - [`ConfirmCallback`]: Handles user confirmations
//!
//! This allows the crate to be used without hard dependencies on
//! specific UI frameworks or process runners, and lets tests record
//! commands instead of running them.

pub mod context;
pub mod diff;
pub mod executor;
pub mod planner;
pub mod resource;
pub mod state;
pub mod types;

// Re-export main types at crate root
pub use context::{
    ApplyContext, AutoConfirm, AutoDecline, CommandError, CommandRunner, CommandSpec,
    ConfirmCallback, NoProgress, ProgressCallback,
};
pub use diff::{DiffSummary, ResourceDiff, compute_diffs};
pub use executor::{execute, execute_simple};
pub use planner::{ExecutionPlan, matches_target};
pub use resource::{BoxedResource, Resource};
pub use state::{DeploymentState, Publish, StateError, StateRegistry};
pub use types::{ApplyResult, CommandOutput, ExecuteOptions, ExecuteSummary, ResourceState};
