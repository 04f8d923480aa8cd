//! Execution planner - builds resource execution plans

use crate::resource::{BoxedResource, Resource};

/// An ordered list of resources to converge
///
/// Resources run in insertion order, so a resource that publishes shared
/// state must be added before the resources that read it.
#[derive(Default)]
pub struct ExecutionPlan {
    pub resources: Vec<BoxedResource>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a resource to the plan
    pub fn add_resource(&mut self, resource: BoxedResource) {
        self.resources.push(resource);
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.resources.len()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Check whether a resource matches a target pattern
///
/// Target format: "type", "type:name" or ":name". Resource ids are
/// usually paths, so the name part matches as a substring of the id.
pub fn matches_target(resource: &dyn Resource, target: &str) -> bool {
    let (resource_type, name) = parse_target(target);
    matches_filter(resource, resource_type.as_deref(), name.as_deref())
}

/// Parse a target string like "type:name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once(':') {
        None => (Some(target.to_string()), None),
        Some(("", name)) => (None, Some(name.to_string())),
        Some((kind, name)) => (Some(kind.to_string()), Some(name.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(
    resource: &dyn Resource,
    resource_type: Option<&str>,
    name: Option<&str>,
) -> bool {
    if let Some(rt) = resource_type
        && resource.resource_type() != rt
    {
        return false;
    }

    if let Some(n) = name
        && !resource.id().contains(n)
    {
        return false;
    }

    true
}
