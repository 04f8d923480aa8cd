//! The Django deployment resource

use anyhow::Result;
use declarative::{ApplyContext, ApplyResult, Resource, ResourceState};
use serde::Deserialize;
use std::cell::{OnceCell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::database::DatabaseSpec;
use super::provider::{self, ConvergeReport};
use super::resolver::{ResolvedDjango, Resolver, Setting};
use super::settings;

fn default_true() -> bool {
    true
}

fn default_python() -> String {
    "python".to_string()
}

/// A Django application declared for deployment, identified by its path
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DjangoApp {
    path: PathBuf,

    #[serde(default = "default_true")]
    pub collectstatic: bool,
    #[serde(default)]
    pub migrate: bool,
    #[serde(default)]
    pub syncdb: bool,

    /// Connection URL or an explicit record
    #[serde(default)]
    pub database: Option<DatabaseSpec>,

    #[serde(default)]
    pub settings_module: Setting<String>,
    #[serde(default)]
    pub wsgi_module: Setting<String>,
    #[serde(default)]
    pub manage_path: Option<PathBuf>,
    #[serde(default)]
    pub local_settings_path: Setting<PathBuf>,
    #[serde(default)]
    pub local_settings_template: Option<PathBuf>,

    /// Interpreter that runs `manage.py`
    #[serde(default = "default_python")]
    pub python: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    /// Extra variables for management commands
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl DjangoApp {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            collectstatic: true,
            migrate: false,
            syncdb: false,
            database: None,
            settings_module: Setting::Unset,
            wsgi_module: Setting::Unset,
            manage_path: None,
            local_settings_path: Setting::Unset,
            local_settings_template: None,
            python: default_python(),
            debug: false,
            secret_key: None,
            allowed_hosts: Vec::new(),
            environment: BTreeMap::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the path while a declaration is being loaded
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn runs_commands(&self) -> bool {
        self.syncdb || self.migrate || self.collectstatic
    }
}

/// One finished deployment
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub resolved: ResolvedDjango,
    pub report: ConvergeReport,
}

/// Collects the reports of every deployment in a run
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<JournalEntry>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, entry: JournalEntry) {
        self.0.borrow_mut().push(entry);
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.0.borrow().clone()
    }
}

/// Converges a [`DjangoApp`]
///
/// Attributes are resolved on first use and frozen for the rest of the run.
pub struct DjangoDeployment {
    app: DjangoApp,
    resolved: OnceCell<ResolvedDjango>,
    journal: Option<Journal>,
}

impl fmt::Debug for DjangoDeployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DjangoDeployment")
            .field("path", &self.app.path)
            .field("resolved", &self.resolved.get().is_some())
            .finish_non_exhaustive()
    }
}

impl DjangoDeployment {
    pub fn new(app: DjangoApp) -> Self {
        Self {
            app,
            resolved: OnceCell::new(),
            journal: None,
        }
    }

    /// Record each convergence report in `journal`
    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn app(&self) -> &DjangoApp {
        &self.app
    }

    /// Resolve every attribute, once
    pub fn resolved(&self) -> Result<&ResolvedDjango> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved);
        }
        let resolved = Resolver::new(&self.app).resolve()?;
        Ok(self.resolved.get_or_init(|| resolved))
    }

    fn local_settings_path(&self) -> Option<&Path> {
        let resolved = self.resolved().ok()?;
        resolved.local_settings.as_ref().map(|l| l.path.as_path())
    }
}

impl Resource for DjangoDeployment {
    fn id(&self) -> String {
        self.app.path.display().to_string()
    }

    fn description(&self) -> String {
        let mut steps = Vec::new();
        if self.app.syncdb {
            steps.push("syncdb");
        }
        if self.app.migrate {
            steps.push("migrate");
        }
        if self.app.collectstatic {
            steps.push("collectstatic");
        }
        if steps.is_empty() {
            format!("Deploy {}", self.app.path.display())
        } else {
            format!("Deploy {} ({})", self.app.path.display(), steps.join(", "))
        }
    }

    fn resource_type(&self) -> &'static str {
        "django"
    }

    fn current_state(&self) -> Result<ResourceState> {
        let resolved = self.resolved()?;
        let Some(local) = &resolved.local_settings else {
            return Ok(self.desired_state());
        };

        Ok(match settings::read_current(&local.path)? {
            None => ResourceState::Absent,
            Some(content) if content == local.content => self.desired_state(),
            Some(_) => ResourceState::Modified {
                from: "outdated local settings".to_string(),
                to: local.path.display().to_string(),
            },
        })
    }

    fn desired_state(&self) -> ResourceState {
        ResourceState::Present {
            details: self.local_settings_path().map(|p| p.display().to_string()),
        }
    }

    /// Management commands run on every convergence
    fn needs_apply(&self) -> Result<bool> {
        if self.app.runs_commands() {
            return Ok(true);
        }
        Ok(self.current_state()? != self.desired_state())
    }

    fn apply(&self, ctx: &mut ApplyContext) -> Result<ApplyResult> {
        let resolved = self.resolved()?;
        let state = ctx.state.scope(&resolved.path);
        let report = provider::converge(resolved, state, ctx.runner, ctx.dry_run)?;

        let result = if ctx.dry_run {
            let reason = if report.pending() {
                "Dry run, local settings would change"
            } else {
                "Dry run"
            };
            ApplyResult::Skipped {
                reason: reason.to_string(),
            }
        } else if report.changed() {
            ApplyResult::Modified
        } else {
            ApplyResult::NoChange
        };

        if let Some(journal) = &self.journal {
            journal.record(JournalEntry {
                resolved: resolved.clone(),
                report,
            });
        }
        Ok(result)
    }
}
