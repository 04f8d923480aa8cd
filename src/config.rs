//! The deployment manifest
//!
//! ```toml
//! [[app]]
//! path = "/srv/shop"
//! migrate = true
//! database = "postgres://shop:secret@db/shop"
//!
//! [[app]]
//! path = "/srv/blog"
//! wsgi_module = false
//! database = { engine = "sqlite", name = "blog.sqlite3" }
//! ```
//!
//! A relative sqlite `name` in a database table is joined onto the app
//! directory (`/srv/blog/blog.sqlite3` above). In a `sqlite:///` URL it
//! resolves against the app path as a URI reference, so
//! `sqlite:///blog.sqlite3` would be `/srv/blog.sqlite3`.

use anyhow::{Context, Result, bail};
use declarative::{ExecutionPlan, matches_target};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use crate::django::{DjangoApp, DjangoDeployment, Journal};
use crate::paths;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub app: Vec<DjangoApp>,
}

impl Manifest {
    /// Load a manifest file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read manifest {}", path.display()))?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(std::env::current_dir, |p| Ok(p.to_path_buf()))
            .context("Could not determine the manifest directory")?;

        let manifest = Self::parse(&content, &base)
            .with_context(|| format!("Invalid manifest {}", path.display()))?;
        log::debug!(
            "Loaded {} applications from {}",
            manifest.app.len(),
            path.display()
        );
        Ok(manifest)
    }

    /// Parse manifest content; relative app paths are anchored at `base`
    pub fn parse(content: &str, base: &Path) -> Result<Self> {
        let mut manifest: Self = toml::from_str(content)?;

        manifest.app = manifest
            .app
            .into_iter()
            .map(|app| {
                let path = paths::resolve_against(base, app.path());
                app.with_path(path)
            })
            .collect();

        let mut seen = BTreeSet::new();
        for app in &manifest.app {
            if !seen.insert(app.path().to_path_buf()) {
                bail!("{} is declared more than once", app.path().display());
            }
        }

        Ok(manifest)
    }

    /// One deployment per application, optionally narrowed to a target
    pub fn deployments(self, target: Option<&str>) -> Vec<DjangoDeployment> {
        self.app
            .into_iter()
            .map(DjangoDeployment::new)
            .filter(|d| target.is_none_or(|t| matches_target(d, t)))
            .collect()
    }

    /// Build an execution plan that records each deployment in `journal`
    pub fn into_plan(self, target: Option<&str>, journal: &Journal) -> ExecutionPlan {
        let mut plan = ExecutionPlan::new();
        for deployment in self.deployments(target) {
            plan.add_resource(Box::new(deployment.with_journal(journal.clone())));
        }
        plan
    }
}
