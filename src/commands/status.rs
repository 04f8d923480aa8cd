//! `djdeploy status` - resolved attributes and last deployments

use anyhow::Result;
use colored::Colorize;
use declarative::Resource;

use crate::Context;
use crate::cli::TargetArgs;
use crate::config::Manifest;
use crate::django::{DjangoDeployment, ResolvedDjango};
use crate::state::{DeploymentRecord, DeploymentRecords};
use crate::ui;

pub fn run(ctx: &Context, args: TargetArgs) -> Result<()> {
    let deployments = Manifest::load(&ctx.manifest)?.deployments(args.target.as_deref());
    let records = DeploymentRecords::load()?;

    ui::header("Django applications");

    if deployments.is_empty() {
        ui::dim("No applications declared");
        return Ok(());
    }

    for deployment in &deployments {
        show(deployment, records.get(deployment.app().path()));
    }
    Ok(())
}

fn show(deployment: &DjangoDeployment, record: Option<&DeploymentRecord>) {
    ui::section(&deployment.id());

    match deployment.resolved() {
        Ok(resolved) => show_resolved(resolved),
        Err(e) => ui::error(&format!("{e:#}")),
    }

    match record {
        Some(record) => {
            let when = record.last_deployed.format("%Y-%m-%d %H:%M:%S UTC").to_string();
            ui::kv("last deployed", &when);
            let steps = if record.steps.is_empty() {
                "-".to_string()
            } else {
                record.steps.join(", ")
            };
            ui::kv("steps", &steps);
            if record.changed {
                ui::kv("changed", &"yes".green().to_string());
            }
        }
        None => ui::kv("last deployed", &"never".yellow().to_string()),
    }
}

fn show_resolved(resolved: &ResolvedDjango) {
    ui::kv("settings", &ui::or_dash(resolved.settings_module.as_deref()));
    ui::kv("wsgi", &ui::or_dash(resolved.wsgi_module.as_deref()));
    if let Some(manage) = &resolved.manage_path {
        ui::kv("manage.py", &ui::truncate_path(&manage.display().to_string(), 60));
    }
    let local = resolved
        .local_settings
        .as_ref()
        .map(|l| ui::truncate_path(&l.path.display().to_string(), 60));
    ui::kv("local settings", &ui::or_dash(local.as_deref()));
    if let Some(db) = &resolved.database {
        let engine = db.engine.as_deref().unwrap_or("(no engine)");
        let name = db.name.as_deref().unwrap_or("-");
        ui::kv("database", &format!("{engine} {name}"));
    }
}
