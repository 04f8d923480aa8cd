//! Diff computation for resources

use crate::resource::Resource;
use crate::types::ResourceState;
use anyhow::Result;

/// A diff between current and desired state of a resource
#[derive(Debug, Clone)]
pub struct ResourceDiff {
    /// Unique identifier of the resource
    pub resource_id: String,
    /// Type of the resource
    pub resource_type: String,
    /// Human-readable description
    pub description: String,
    /// Current state
    pub current: ResourceState,
    /// Desired state
    pub desired: ResourceState,
}

impl ResourceDiff {
    /// Create a diff from a resource, returning None if no changes needed
    pub fn from_resource(resource: &dyn Resource) -> Result<Option<Self>> {
        if !resource.needs_apply()? {
            return Ok(None);
        }

        Ok(Some(Self {
            resource_id: resource.id(),
            resource_type: resource.resource_type().to_string(),
            description: resource.description(),
            current: resource.current_state()?,
            desired: resource.desired_state(),
        }))
    }

    /// Check if this diff represents an addition
    pub fn is_addition(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Absent, ResourceState::Present { .. })
        )
    }

    /// Check if this diff represents a removal
    pub fn is_removal(&self) -> bool {
        matches!(
            (&self.current, &self.desired),
            (ResourceState::Present { .. }, ResourceState::Absent)
        )
    }
}

/// Compute diffs for a list of resources
///
/// Returns only resources that need to be applied. A resource whose state
/// cannot be read is reported as a diff from `Unknown`.
pub fn compute_diffs(resources: &[Box<dyn Resource>]) -> Vec<ResourceDiff> {
    resources
        .iter()
        .filter_map(|r| match ResourceDiff::from_resource(r.as_ref()) {
            Ok(diff) => diff,
            Err(e) => {
                log::warn!("Could not read state of {}: {e:#}", r.id());
                Some(ResourceDiff {
                    resource_id: r.id(),
                    resource_type: r.resource_type().to_string(),
                    description: r.description(),
                    current: ResourceState::Unknown,
                    desired: r.desired_state(),
                })
            }
        })
        .collect()
}

/// Diff summary statistics
#[derive(Debug, Clone, Default)]
pub struct DiffSummary {
    /// Number of resources to add
    pub additions: usize,
    /// Number of resources to remove
    pub removals: usize,
    /// Number of resources to modify
    pub modifications: usize,
}

impl DiffSummary {
    /// Create a summary from a list of diffs
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ApplyContext;
    use crate::types::ApplyResult;

    #[derive(Debug)]
    struct Fixed {
        current: ResourceState,
        always: bool,
    }

    impl Resource for Fixed {
        fn id(&self) -> String {
            "fixed".into()
        }
        fn description(&self) -> String {
            "Fixed resource".into()
        }
        fn resource_type(&self) -> &'static str {
            "test"
        }
        fn current_state(&self) -> Result<ResourceState> {
            Ok(self.current.clone())
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }
        fn needs_apply(&self) -> Result<bool> {
            Ok(self.always || self.current != self.desired_state())
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::NoChange)
        }
    }

    #[test]
    fn test_compute_diffs_skips_converged() {
        let resources: Vec<Box<dyn Resource>> = vec![
            Box::new(Fixed {
                current: ResourceState::Present { details: None },
                always: false,
            }),
            Box::new(Fixed {
                current: ResourceState::Absent,
                always: false,
            }),
        ];
        let diffs = compute_diffs(&resources);
        assert_eq!(diffs.len(), 1);
        assert!(diffs[0].is_addition());
    }

    #[test]
    fn test_needs_apply_override_forces_diff() {
        let resources: Vec<Box<dyn Resource>> = vec![Box::new(Fixed {
            current: ResourceState::Present { details: None },
            always: true,
        })];
        let summary = DiffSummary::from_diffs(&compute_diffs(&resources));
        assert_eq!(summary.modifications, 1);
    }
}
