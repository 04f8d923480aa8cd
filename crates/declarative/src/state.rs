//! Shared deployment state
//!
//! Resources acting on the same application path coordinate through a
//! [`DeploymentState`]: one resource publishes environment variables and the
//! application module, later resources read them. Every key is write-once
//! for the lifetime of a run. Publishing the same value again is a no-op so
//! that a resource can be converged twice in one run.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised when publishing into shared state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A key was already published with a different value
    #[error("{key} for {scope} is already set to {existing:?}, refusing to overwrite with {new:?}")]
    Conflict {
        scope: String,
        key: String,
        existing: String,
        new: String,
    },
}

/// Whether a publish call changed the state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Publish {
    /// The key was not set before
    Inserted,
    /// The key already held this exact value
    Unchanged,
}

/// State shared between resources that act on one application path
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentState {
    path: PathBuf,
    environment: BTreeMap<String, String>,
    app_module: Option<String>,
}

impl DeploymentState {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Application path this state belongs to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Published environment variables
    pub fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Look up a single published environment variable
    pub fn env(&self, key: &str) -> Option<&str> {
        self.environment.get(key).map(String::as_str)
    }

    /// The module an application server should load, if published
    pub fn app_module(&self) -> Option<&str> {
        self.app_module.as_deref()
    }

    /// Publish an environment variable
    pub fn publish_env(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Publish, StateError> {
        let key = key.into();
        let value = value.into();
        if let Some(existing) = self.environment.get(&key) {
            if *existing == value {
                return Ok(Publish::Unchanged);
            }
            return Err(StateError::Conflict {
                scope: self.path.display().to_string(),
                key,
                existing: existing.clone(),
                new: value,
            });
        }
        log::debug!("{}: {}={}", self.path.display(), key, value);
        self.environment.insert(key, value);
        Ok(Publish::Inserted)
    }

    /// Publish the application module
    pub fn publish_app_module(&mut self, module: impl Into<String>) -> Result<Publish, StateError> {
        let module = module.into();
        match &self.app_module {
            Some(existing) if *existing == module => Ok(Publish::Unchanged),
            Some(existing) => Err(StateError::Conflict {
                scope: self.path.display().to_string(),
                key: "app_module".to_string(),
                existing: existing.clone(),
                new: module,
            }),
            None => {
                log::debug!("{}: app module {}", self.path.display(), module);
                self.app_module = Some(module);
                Ok(Publish::Inserted)
            }
        }
    }
}

/// All deployment states for one convergence run, keyed by application path
#[derive(Debug, Default)]
pub struct StateRegistry {
    states: BTreeMap<PathBuf, DeploymentState>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the state for a path, creating it on first use
    pub fn scope(&mut self, path: &Path) -> &mut DeploymentState {
        self.states
            .entry(path.to_path_buf())
            .or_insert_with(|| DeploymentState::new(path))
    }

    /// Read-only view of a path's state, if any resource created it
    pub fn get(&self, path: &Path) -> Option<&DeploymentState> {
        self.states.get(path)
    }
}
