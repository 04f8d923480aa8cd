//! Deployment records
//!
//! After a real `apply`, each deployed application gets an entry in
//! `deployments.toml` under the state directory. `djdeploy status` reads it
//! back. Convergence never consults these records.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::django::{JournalEntry, Step};
use crate::paths;

const RECORDS_FILE: &str = "deployments.toml";

/// The last deployment of one application
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct DeploymentRecord {
    pub last_deployed: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings_module: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wsgi_module: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_settings: Option<PathBuf>,

    /// Steps that ran or wrote something
    #[serde(default)]
    pub steps: Vec<String>,

    /// Whether a file was written
    #[serde(default)]
    pub changed: bool,
}

impl DeploymentRecord {
    pub fn from_entry(entry: &JournalEntry, at: DateTime<Utc>) -> Self {
        let resolved = &entry.resolved;
        Self {
            last_deployed: at,
            settings_module: resolved.settings_module.clone(),
            wsgi_module: resolved.wsgi_module.clone(),
            local_settings: resolved.local_settings.as_ref().map(|l| l.path.clone()),
            steps: entry
                .report
                .active_steps()
                .filter(|step| *step != Step::SetState)
                .map(|step| step.to_string())
                .collect(),
            changed: entry.report.changed(),
        }
    }
}

/// All deployment records, keyed by application path
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DeploymentRecords {
    #[serde(default)]
    pub deployments: BTreeMap<String, DeploymentRecord>,
}

impl DeploymentRecords {
    /// Path of the records file inside `dir`
    pub fn file_in(dir: &Path) -> PathBuf {
        dir.join(RECORDS_FILE)
    }

    /// Load records from the default state directory
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::file_in(&paths::state_dir()?))
    }

    /// Save records to the default state directory
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::file_in(&paths::state_dir()?))
    }

    /// Load records from disk, or return default if the file doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("Records file does not exist, starting empty");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read records file: {}", path.display()))?;
        let records = toml::from_str(&content)
            .with_context(|| format!("Failed to parse records file: {}", path.display()))?;

        log::debug!("Loaded records from {}", path.display());
        Ok(records)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize records to TOML")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write records file: {}", path.display()))?;

        log::debug!("Saved records to {}", path.display());
        Ok(())
    }

    /// Record every entry of a finished run
    pub fn record_all(&mut self, entries: &[JournalEntry]) {
        let now = Utc::now();
        for entry in entries {
            self.deployments.insert(
                entry.resolved.path.display().to_string(),
                DeploymentRecord::from_entry(entry, now),
            );
        }
    }

    pub fn get(&self, path: &Path) -> Option<&DeploymentRecord> {
        self.deployments.get(&path.display().to_string())
    }
}
