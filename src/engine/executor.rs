//! Execution engine - djdeploy executor with UI integration

use anyhow::Result;
use colored::Colorize;
use declarative::{
    AutoConfirm, CommandRunner, ConfirmCallback, ExecuteSummary, ExecutionPlan, compute_diffs,
};

use super::differ::display_diff;
use crate::progress::DeployProgress;
use crate::ui;

/// Options for execution (includes `yes` for confirmation skip)
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Skip confirmation prompts
    pub yes: bool,
}

/// Asks on the terminal
struct DialoguerConfirm;

impl ConfirmCallback for DialoguerConfirm {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        use dialoguer::Confirm;

        let confirmed = Confirm::new()
            .with_prompt(prompt)
            .default(true)
            .interact()?;

        Ok(confirmed)
    }
}

/// Execute the plan with djdeploy's UI integration
pub fn execute(
    plan: ExecutionPlan,
    opts: &ExecuteOptions,
    runner: &dyn CommandRunner,
) -> Result<ExecuteSummary> {
    let diffs = compute_diffs(&plan.resources);
    display_diff(&diffs);

    if diffs.is_empty() {
        return Ok(ExecuteSummary::default());
    }

    let inner = declarative::ExecuteOptions {
        dry_run: opts.dry_run,
    };
    let mut progress = DeployProgress::new();

    let summary = if opts.yes {
        declarative::execute(plan, inner, runner, &mut progress, &mut AutoConfirm)?
    } else {
        declarative::execute(plan, inner, runner, &mut progress, &mut DialoguerConfirm)?
    };

    if opts.dry_run {
        println!();
        ui::info("Dry run - no changes made");
        return Ok(summary);
    }

    print_summary(&summary);
    Ok(summary)
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.total() == summary.skipped && summary.failed == 0 {
        println!("  {} Aborted", "✗".red());
        return;
    }

    if summary.is_success() {
        println!("  {} Deployment converged", "✓".green().bold());
    } else {
        println!("  {} Deployment finished with errors", "⚠".yellow().bold());
    }

    if summary.total_changes() > 0 {
        println!("    • {} applications changed", summary.total_changes());
    }
    if summary.no_change > 0 {
        println!("    • {} applications unchanged", summary.no_change);
    }
    if summary.skipped > 0 {
        println!("    • {} applications skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "applications".red());
    }
}
