//! `djdeploy plan` - preview what apply would do

use anyhow::{Result, bail};
use declarative::Resource;

use crate::Context;
use crate::cli::TargetArgs;
use crate::config::Manifest;
use crate::django::settings;
use crate::django::{ResolvedDjango, Step};
use crate::engine::differ;
use crate::ui;

pub fn run(ctx: &Context, args: TargetArgs) -> Result<()> {
    let deployments = Manifest::load(&ctx.manifest)?.deployments(args.target.as_deref());

    if deployments.is_empty() {
        ui::warn("No applications match");
        return Ok(());
    }

    ui::header("Deployment plan");

    let mut unresolved = 0;
    for deployment in &deployments {
        ui::section(&deployment.id());
        match deployment.resolved() {
            Ok(resolved) => show_plan(resolved)?,
            Err(e) => {
                unresolved += 1;
                ui::error(&format!("{e:#}"));
            }
        }
    }

    if unresolved > 0 {
        bail!("{unresolved} applications could not be resolved");
    }
    Ok(())
}

fn show_plan(resolved: &ResolvedDjango) -> Result<()> {
    if resolved.runs_commands() {
        ui::kv("commands", &planned_commands(resolved).join(", "));
    } else {
        ui::kv("commands", "none");
    }

    let Some(local) = &resolved.local_settings else {
        ui::dim("local settings disabled");
        return Ok(());
    };

    ui::kv("local settings", &local.path.display().to_string());
    match settings::read_current(&local.path)? {
        None => {
            ui::dim("(new file)");
            differ::display_content_diff("", &local.content);
        }
        Some(current) => {
            differ::display_content_diff(&current, &local.content);
        }
    }
    Ok(())
}

fn planned_commands(resolved: &ResolvedDjango) -> Vec<&'static str> {
    [
        (Step::SyncDb, resolved.syncdb),
        (Step::Migrate, resolved.migrate),
        (Step::CollectStatic, resolved.collectstatic),
    ]
    .into_iter()
    .filter(|(_, enabled)| *enabled)
    .filter_map(|(step, _)| step.command())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn resolved(migrate: bool) -> ResolvedDjango {
        ResolvedDjango {
            path: PathBuf::from("/srv/shop"),
            settings_module: None,
            wsgi_module: None,
            manage_path: None,
            database: None,
            local_settings: None,
            collectstatic: true,
            migrate,
            syncdb: false,
            python: "python".into(),
            environment: BTreeMap::new(),
        }
    }

    #[test]
    fn test_planned_commands_keep_order() {
        assert_eq!(planned_commands(&resolved(true)), ["migrate", "collectstatic"]);
        assert_eq!(planned_commands(&resolved(false)), ["collectstatic"]);
    }
}
