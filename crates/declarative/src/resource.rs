//! Resource trait for declarative state management
//!
//! A Resource represents something that can be in a certain state,
//! and can be changed to reach a desired state.

use crate::context::ApplyContext;
use crate::types::{ApplyResult, ResourceState};
use anyhow::Result;
use std::fmt;

/// Core trait for declarative resources
///
/// Every resource in the system implements this trait, which provides:
/// - Identity (id, description, type)
/// - State detection (current vs desired)
/// - State convergence (apply)
///
/// # Example
///
/// ```ignore
/// use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
///
/// #[derive(Debug)]
/// struct FileResource {
///     path: String,
///     content: String,
/// }
///
/// impl Resource for FileResource {
///     fn id(&self) -> String {
///         self.path.clone()
///     }
///
///     fn description(&self) -> String {
///         format!("Ensure file exists at {}", self.path)
///     }
///
///     fn resource_type(&self) -> &'static str {
///         "file"
///     }
///
///     fn current_state(&self) -> Result<ResourceState> {
///         if std::path::Path::new(&self.path).exists() {
///             Ok(ResourceState::Present { details: None })
///         } else {
///             Ok(ResourceState::Absent)
///         }
///     }
///
///     fn desired_state(&self) -> ResourceState {
///         ResourceState::Present { details: None }
///     }
///
///     fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
///         if ctx.dry_run {
///             return Ok(ApplyResult::Skipped { reason: "Dry run".into() });
///         }
///         std::fs::write(&self.path, &self.content)?;
///         Ok(ApplyResult::Created)
///     }
/// }
/// ```
pub trait Resource: fmt::Debug {
    /// Unique identifier for this resource
    ///
    /// This should be stable and uniquely identify the resource
    /// within its type, e.g. the application directory of a deployment.
    fn id(&self) -> String;

    /// Human-readable description of what this resource does
    fn description(&self) -> String;

    /// Resource type category, used for grouping and filtering
    fn resource_type(&self) -> &'static str;

    /// Detect the current state of this resource
    fn current_state(&self) -> Result<ResourceState>;

    /// Get the desired state for this resource
    fn desired_state(&self) -> ResourceState;

    /// Check if the resource needs changes to reach desired state
    ///
    /// Default implementation compares current and desired states.
    /// Resources with actions that cannot be observed ahead of time
    /// (commands that must run on every convergence) override this.
    fn needs_apply(&self) -> Result<bool> {
        let current = self.current_state()?;
        let desired = self.desired_state();
        Ok(current != desired)
    }

    /// Apply changes to reach the desired state
    ///
    /// This method should:
    /// 1. Respect ctx.dry_run (no external side effects)
    /// 2. Make the necessary changes
    /// 3. Return NoChange when nothing was mutated
    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult>;
}

/// A boxed resource for type-erased storage
pub type BoxedResource = Box<dyn Resource>;
