//! `djdeploy apply` - converge every declared application

use anyhow::{Result, bail};

use crate::Context;
use crate::cli::ApplyArgs;
use crate::config::Manifest;
use crate::django::Journal;
use crate::engine::{self, ExecuteOptions};
use crate::runner::SystemRunner;
use crate::state::DeploymentRecords;
use crate::ui;

pub fn run(ctx: &Context, args: ApplyArgs) -> Result<()> {
    let manifest = Manifest::load(&ctx.manifest)?;
    let journal = Journal::new();
    let plan = manifest.into_plan(args.target.as_deref(), &journal);

    if plan.is_empty() {
        ui::warn("No applications match");
        return Ok(());
    }

    if !ctx.quiet {
        ui::header(&format!("Deploying {} applications", plan.total_resources()));
    }

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        yes: args.yes,
    };
    let summary = engine::execute(plan, &opts, &SystemRunner)?;

    if !args.dry_run {
        let entries = journal.entries();
        if !entries.is_empty() {
            let mut records = DeploymentRecords::load()?;
            records.record_all(&entries);
            records.save()?;
            if !ctx.quiet {
                ui::success(&format!("Recorded {} deployments", entries.len()));
            }
        }
    }

    if !summary.is_success() {
        bail!("{} applications failed to deploy", summary.failed);
    }
    Ok(())
}
