//! Local settings rendering
//!
//! A deployment writes a `local_settings.py` next to the project's settings
//! module. It star-imports the real settings and overrides what the
//! deployment knows about: the database, `DEBUG`, `ALLOWED_HOSTS` and
//! `SECRET_KEY`.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::database::DatabaseConfig;
use crate::error::{DeployError, Result};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

/// Header written at the top of every generated file
pub const GENERATED_HEADER: &str = "# Generated by djdeploy. Local changes will be overwritten.";

/// Variables available to a local settings template.
///
/// Every value is already a Python expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSettingsContext {
    pub settings_module: String,
    /// `{"default": {...}}`, `None` when no database is configured
    pub databases: Option<String>,
    pub debug: String,
    /// List literal, `None` when no hosts were declared
    pub allowed_hosts: Option<String>,
    /// String literal, `None` when no key was declared
    pub secret_key: Option<String>,
}

impl LocalSettingsContext {
    pub fn new(
        settings_module: &str,
        database: Option<&DatabaseConfig>,
        debug: bool,
        allowed_hosts: &[String],
        secret_key: Option<&str>,
    ) -> Result<Self> {
        let databases = database
            .map(|db| python_literal(&BTreeMap::from([("default", db)])))
            .transpose()?;
        let allowed_hosts = if allowed_hosts.is_empty() {
            None
        } else {
            Some(python_literal(&allowed_hosts)?)
        };

        Ok(Self {
            settings_module: settings_module.to_string(),
            databases,
            debug: if debug { "True" } else { "False" }.to_string(),
            allowed_hosts,
            secret_key: secret_key.map(python_literal).transpose()?,
        })
    }

    /// Template variables by name
    ///
    /// Optional values fall back to what Django would use if the line were
    /// missing, so custom templates can reference them unconditionally.
    pub fn variables(&self) -> BTreeMap<&'static str, String> {
        BTreeMap::from([
            ("settings_module", self.settings_module.clone()),
            (
                "databases",
                self.databases.clone().unwrap_or_else(|| "{}".to_string()),
            ),
            ("debug", self.debug.clone()),
            (
                "allowed_hosts",
                self.allowed_hosts.clone().unwrap_or_else(|| "[]".to_string()),
            ),
            (
                "secret_key",
                self.secret_key.clone().unwrap_or_else(|| "None".to_string()),
            ),
        ])
    }
}

/// Templating collaborator: turns a context into file content
pub trait SettingsRenderer: std::fmt::Debug {
    fn render(&self, ctx: &LocalSettingsContext) -> Result<String>;
}

/// Built-in local settings layout
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTemplate;

impl SettingsRenderer for BuiltinTemplate {
    fn render(&self, ctx: &LocalSettingsContext) -> Result<String> {
        let mut out = String::new();
        out.push_str(GENERATED_HEADER);
        out.push('\n');
        out.push_str(&format!("from {} import *  # noqa\n\n", ctx.settings_module));
        out.push_str(&format!("DEBUG = {}\n", ctx.debug));
        if let Some(hosts) = &ctx.allowed_hosts {
            out.push_str(&format!("ALLOWED_HOSTS = {hosts}\n"));
        }
        if let Some(databases) = &ctx.databases {
            out.push_str(&format!("DATABASES = {databases}\n"));
        }
        if let Some(key) = &ctx.secret_key {
            out.push_str(&format!("SECRET_KEY = {key}\n"));
        }
        Ok(out)
    }
}

/// A user-supplied template with `{{ name }}` placeholders
#[derive(Debug, Clone)]
pub struct FileTemplate {
    path: PathBuf,
    source: String,
}

impl FileTemplate {
    /// Read the template once; rendering never touches the disk again
    pub fn load(path: &Path) -> Result<Self> {
        let source = fs::read_to_string(path).map_err(|e| DeployError::io(path, e))?;
        Ok(Self::from_source(path, source))
    }

    pub fn from_source(path: impl Into<PathBuf>, source: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            source: source.into(),
        }
    }
}

impl SettingsRenderer for FileTemplate {
    fn render(&self, ctx: &LocalSettingsContext) -> Result<String> {
        let vars = ctx.variables();
        let mut out = String::with_capacity(self.source.len());
        let mut last = 0;

        for caps in PLACEHOLDER.captures_iter(&self.source) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let value = vars
                .get(name.as_str())
                .ok_or_else(|| DeployError::Template {
                    template: self.path.clone(),
                    name: name.as_str().to_string(),
                })?;
            out.push_str(&self.source[last..whole.start()]);
            out.push_str(value);
            last = whole.end();
        }
        out.push_str(&self.source[last..]);
        Ok(out)
    }
}

/// Read the current content of a generated file, `None` if it does not exist
pub fn read_current(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DeployError::io(path, e)),
    }
}

/// Write `content` to `path` unless it already holds exactly that content.
///
/// Returns whether the file was written.
pub fn write_if_changed(path: &Path, content: &str) -> Result<bool> {
    if read_current(path)?.as_deref() == Some(content) {
        log::debug!("{} is up to date", path.display());
        return Ok(false);
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| DeployError::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| DeployError::io(path, e))?;
    log::info!("Wrote {}", path.display());
    Ok(true)
}

/// JSON literals of strings, lists and string maps are valid Python
fn python_literal<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}
