//! Execution engine - applies resources in order against one shared state

use crate::context::{ApplyContext, CommandRunner, ConfirmCallback, ProgressCallback};
use crate::diff::compute_diffs;
use crate::planner::ExecutionPlan;
use crate::resource::Resource;
use crate::state::StateRegistry;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::Result;

/// Execute a plan with the given options and callbacks
///
/// Resources are applied one at a time, in plan order, against a single
/// [`StateRegistry`] that lives exactly as long as this call. A failing
/// resource is recorded in the summary and the remaining resources still
/// run; each resource decides for itself how far it got.
///
/// # Arguments
/// * `plan` - The execution plan to run
/// * `opts` - Execution options
/// * `runner` - Process runner handed to every resource
/// * `progress` - Progress callback
/// * `confirm` - Confirmation callback
///
/// # Returns
/// Summary of execution results
pub fn execute<P, C>(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    runner: &dyn CommandRunner,
    progress: &mut P,
    confirm: &mut C,
) -> Result<ExecuteSummary>
where
    P: ProgressCallback,
    C: ConfirmCallback,
{
    let pending = compute_diffs(&plan.resources).len();

    if pending == 0 {
        log::info!("All {} resources already converged", plan.total_resources());
        return Ok(ExecuteSummary::default());
    }

    // Confirm before proceeding (unless dry_run)
    if !opts.dry_run && !confirm.confirm("Apply changes?")? {
        return Ok(ExecuteSummary {
            skipped: pending,
            ..Default::default()
        });
    }

    let mut state = StateRegistry::new();
    let mut summary = ExecuteSummary::default();

    progress.on_run_start(plan.total_resources());
    for resource in &plan.resources {
        progress.on_resource_start(&resource.id(), &resource.description());
        let result = apply_resource(resource.as_ref(), &opts, runner, &mut state);
        progress.on_resource_complete(&resource.id(), &result);
        summary.add_result(&result);
    }
    progress.on_run_complete();

    Ok(summary)
}

/// Apply a single resource, folding errors into the result
fn apply_resource(
    resource: &dyn Resource,
    opts: &ExecuteOptions,
    runner: &dyn CommandRunner,
    state: &mut StateRegistry,
) -> ApplyResult {
    let mut ctx = ApplyContext::new(runner, state).dry_run(opts.dry_run);

    match resource.apply(&mut ctx) {
        Ok(result) => {
            if result.is_change() {
                log::info!("{} changed", resource.id());
            }
            result
        }
        Err(e) => {
            log::error!("{} failed: {e:#}", resource.id());
            ApplyResult::Failed {
                error: format!("{e:#}"),
            }
        }
    }
}

/// Simple execution without callbacks
///
/// For basic use cases where you don't need progress or confirmation.
pub fn execute_simple(
    plan: ExecutionPlan,
    opts: ExecuteOptions,
    runner: &dyn CommandRunner,
) -> Result<ExecuteSummary> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(plan, opts, runner, &mut NoProgress, &mut AutoConfirm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{AutoConfirm, AutoDecline, CommandSpec, NoProgress};
    use crate::types::{CommandOutput, ResourceState};
    use std::path::PathBuf;

    /// Runner that never spawns anything
    struct NullRunner;

    impl CommandRunner for NullRunner {
        fn run(&self, _cmd: &CommandSpec) -> Result<CommandOutput> {
            Ok(CommandOutput::ok())
        }
    }

    /// Publishes an app module for its path
    #[derive(Debug)]
    struct Publisher {
        path: PathBuf,
        module: String,
    }

    impl Resource for Publisher {
        fn id(&self) -> String {
            format!("publisher:{}", self.path.display())
        }
        fn description(&self) -> String {
            "Publish app module".into()
        }
        fn resource_type(&self) -> &'static str {
            "test"
        }
        fn current_state(&self) -> Result<ResourceState> {
            Ok(ResourceState::Absent)
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }
        fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
            ctx.state
                .scope(&self.path)
                .publish_app_module(self.module.clone())?;
            Ok(ApplyResult::Modified)
        }
    }

    /// Reads the app module published by a sibling
    #[derive(Debug)]
    struct Consumer {
        path: PathBuf,
    }

    impl Resource for Consumer {
        fn id(&self) -> String {
            format!("consumer:{}", self.path.display())
        }
        fn description(&self) -> String {
            "Serve app module".into()
        }
        fn resource_type(&self) -> &'static str {
            "test"
        }
        fn current_state(&self) -> Result<ResourceState> {
            Ok(ResourceState::Absent)
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }
        fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
            match ctx.state.get(&self.path).and_then(|s| s.app_module()) {
                Some(_) => Ok(ApplyResult::Created),
                None => anyhow::bail!("no app module published"),
            }
        }
    }

    #[derive(Debug)]
    struct Converged;

    impl Resource for Converged {
        fn id(&self) -> String {
            "converged".into()
        }
        fn description(&self) -> String {
            "Already converged".into()
        }
        fn resource_type(&self) -> &'static str {
            "test"
        }
        fn current_state(&self) -> Result<ResourceState> {
            Ok(ResourceState::Present { details: None })
        }
        fn desired_state(&self) -> ResourceState {
            ResourceState::Present { details: None }
        }
        fn apply(&self, _ctx: &mut ApplyContext) -> Result<ApplyResult> {
            Ok(ApplyResult::NoChange)
        }
    }

    #[test]
    fn test_execute_empty_plan() {
        let result = execute_simple(ExecutionPlan::new(), ExecuteOptions::default(), &NullRunner)
            .unwrap();
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_execute_no_changes() {
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(Converged));
        let result = execute_simple(plan, ExecuteOptions::default(), &NullRunner).unwrap();
        // No diff means no execution
        assert_eq!(result.total(), 0);
    }

    #[test]
    fn test_siblings_share_state() {
        let path = PathBuf::from("/srv/app");
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(Publisher {
            path: path.clone(),
            module: "mysite.wsgi".into(),
        }));
        plan.add_resource(Box::new(Consumer { path }));

        let result = execute_simple(plan, ExecuteOptions::default(), &NullRunner).unwrap();
        assert_eq!(result.modified, 1);
        assert_eq!(result.created, 1);
        assert!(result.is_success());
    }

    #[test]
    fn test_failure_is_recorded_and_run_continues() {
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(Consumer {
            path: PathBuf::from("/srv/missing"),
        }));
        plan.add_resource(Box::new(Publisher {
            path: PathBuf::from("/srv/other"),
            module: "other.wsgi".into(),
        }));

        let result = execute_simple(plan, ExecuteOptions::default(), &NullRunner).unwrap();
        assert_eq!(result.failed, 1);
        assert_eq!(result.modified, 1);
    }

    #[test]
    fn test_declined_confirmation_skips_everything() {
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(Publisher {
            path: PathBuf::from("/srv/app"),
            module: "mysite.wsgi".into(),
        }));

        let result = execute(
            plan,
            ExecuteOptions::default(),
            &NullRunner,
            &mut NoProgress,
            &mut AutoDecline,
        )
        .unwrap();
        assert_eq!(result.skipped, 1);
        assert_eq!(result.total_changes(), 0);

        // Dry runs never ask
        let mut plan = ExecutionPlan::new();
        plan.add_resource(Box::new(Converged));
        let opts = ExecuteOptions { dry_run: true };
        let result = execute(plan, opts, &NullRunner, &mut NoProgress, &mut AutoConfirm).unwrap();
        assert_eq!(result.total(), 0);
    }
}
