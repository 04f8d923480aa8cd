//! Deployment provider
//!
//! Converges one resolved application in a single linear pass:
//!
//! ```text
//! SetState -> SyncDb? -> Migrate? -> CollectStatic? -> WriteConfig
//! ```
//!
//! `SetState` always runs first because the management commands read the
//! environment it publishes. A failing command stops the pass; steps that
//! already ran are not rolled back.

use declarative::{CommandError, CommandRunner, CommandSpec, DeploymentState, Publish};
use std::fmt;

use super::resolver::{MANAGE_FILE, ResolvedDjango};
use super::settings;
use crate::error::{DeployError, Result};

pub const SETTINGS_ENV: &str = "DJANGO_SETTINGS_MODULE";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Flag that keeps management commands from prompting
pub const NOINPUT: &str = "--noinput";

/// A step of the deployment state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    SetState,
    SyncDb,
    Migrate,
    CollectStatic,
    WriteConfig,
}

impl Step {
    /// The `manage.py` subcommand this step runs
    pub fn command(self) -> Option<&'static str> {
        match self {
            Self::SyncDb => Some("syncdb"),
            Self::Migrate => Some("migrate"),
            Self::CollectStatic => Some("collectstatic"),
            Self::SetState | Self::WriteConfig => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SetState => "set-state",
            Self::SyncDb => "syncdb",
            Self::Migrate => "migrate",
            Self::CollectStatic => "collectstatic",
            Self::WriteConfig => "write-config",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// A file on disk was written
    Changed,
    /// A management command ran or state was published
    Ran,
    /// Nothing to do
    Unchanged,
    /// Dry run: the step would write a file
    Pending,
    Skipped { reason: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: Step,
    pub outcome: StepOutcome,
}

/// What one convergence pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvergeReport {
    pub steps: Vec<StepReport>,
}

impl ConvergeReport {
    /// The "notify on change" signal
    ///
    /// A written file counts, and so does any management command that ran:
    /// migrations and collected static files mutate the deployment too.
    pub fn changed(&self) -> bool {
        self.steps.iter().any(|report| match report.outcome {
            StepOutcome::Changed => true,
            StepOutcome::Ran => report.step.command().is_some(),
            _ => false,
        })
    }

    /// Whether a dry run found work to do
    pub fn pending(&self) -> bool {
        self.steps
            .iter()
            .any(|report| report.outcome == StepOutcome::Pending)
    }

    /// Steps that actually did something
    pub fn active_steps(&self) -> impl Iterator<Item = Step> + '_ {
        self.steps
            .iter()
            .filter(|report| matches!(report.outcome, StepOutcome::Changed | StepOutcome::Ran))
            .map(|report| report.step)
    }

    fn record(&mut self, step: Step, outcome: StepOutcome) {
        log::debug!("{step}: {outcome:?}");
        self.steps.push(StepReport { step, outcome });
    }
}

/// Run the deployment state machine for one application.
///
/// `state` is the shared deployment state for `resolved.path`. With
/// `dry_run`, state is still published but no command runs and no file is
/// written.
pub fn converge(
    resolved: &ResolvedDjango,
    state: &mut DeploymentState,
    runner: &dyn CommandRunner,
    dry_run: bool,
) -> Result<ConvergeReport> {
    let mut report = ConvergeReport::default();

    let outcome = set_state(resolved, state)?;
    report.record(Step::SetState, outcome);

    for step in [Step::SyncDb, Step::Migrate, Step::CollectStatic] {
        let enabled = match step {
            Step::SyncDb => resolved.syncdb,
            Step::Migrate => resolved.migrate,
            _ => resolved.collectstatic,
        };
        if !enabled {
            continue;
        }
        if dry_run {
            report.record(step, StepOutcome::Skipped { reason: "dry run" });
            continue;
        }
        run_management_command(resolved, state, runner, step)?;
        report.record(step, StepOutcome::Ran);
    }

    let outcome = write_config(resolved, dry_run)?;
    report.record(Step::WriteConfig, outcome);

    Ok(report)
}

fn set_state(resolved: &ResolvedDjango, state: &mut DeploymentState) -> Result<StepOutcome> {
    let mut published = Vec::new();

    for (key, value) in &resolved.environment {
        published.push(state.publish_env(key, value)?);
    }
    if let Some(module) = &resolved.settings_module {
        published.push(state.publish_env(SETTINGS_ENV, module)?);
    }
    if let Some(url) = resolved.database.as_ref().and_then(|db| db.url.as_ref()) {
        published.push(state.publish_env(DATABASE_URL_ENV, url)?);
    }
    if let Some(module) = &resolved.wsgi_module {
        published.push(state.publish_app_module(module)?);
    }

    Ok(if published.contains(&Publish::Inserted) {
        StepOutcome::Ran
    } else {
        StepOutcome::Unchanged
    })
}

fn run_management_command(
    resolved: &ResolvedDjango,
    state: &DeploymentState,
    runner: &dyn CommandRunner,
    step: Step,
) -> Result<()> {
    let Some(command) = step.command() else {
        return Ok(());
    };
    let manage_path = resolved
        .manage_path
        .as_ref()
        .ok_or_else(|| DeployError::FileNotFound {
            filename: MANAGE_FILE.to_string(),
            root: resolved.path.clone(),
        })?;

    let spec = CommandSpec::new(&resolved.python)
        .arg(manage_path.to_string_lossy())
        .args([command, NOINPUT])
        .envs(state.environment())
        .current_dir(&resolved.path);

    log::info!("{}: running {spec}", resolved.path.display());
    runner.run_checked(&spec).map_err(|e| match e.downcast::<CommandError>() {
        Ok(failure) => DeployError::SubprocessFailure(failure),
        Err(e) => DeployError::Spawn {
            command: spec.to_string(),
            reason: format!("{e:#}"),
        },
    })?;
    Ok(())
}

fn write_config(resolved: &ResolvedDjango, dry_run: bool) -> Result<StepOutcome> {
    let Some(local) = &resolved.local_settings else {
        return Ok(StepOutcome::Skipped {
            reason: "local settings disabled",
        });
    };

    if dry_run {
        let current = settings::read_current(&local.path)?;
        return Ok(if current.as_deref() == Some(local.content.as_str()) {
            StepOutcome::Unchanged
        } else {
            StepOutcome::Pending
        });
    }

    Ok(if settings::write_if_changed(&local.path, &local.content)? {
        StepOutcome::Changed
    } else {
        StepOutcome::Unchanged
    })
}
