//! Database connection strings
//!
//! Turns a URL such as `postgres://user:pw@db:5432/shop` into the record
//! Django expects under `DATABASES['default']`. The record can also be built
//! from individual fields, in which case it goes through the same engine
//! and path normalisation.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use url::Url;

use crate::error::{DeployError, Result};

/// Scheme aliases, everything else becomes `django.db.backends.<scheme>`
const ENGINE_ALIASES: &[(&str, &str)] = &[
    ("postgres", "django.db.backends.postgresql_psycopg2"),
    ("postgresql", "django.db.backends.postgresql_psycopg2"),
    ("pgsql", "django.db.backends.postgresql_psycopg2"),
    ("postgis", "django.contrib.gis.db.backends.postgis"),
    ("mysql2", "django.db.backends.mysql"),
    ("mysqlgis", "django.contrib.gis.db.backends.mysql"),
    ("spatialite", "django.contrib.gis.db.backends.spatialite"),
    ("sqlite", "django.db.backends.sqlite3"),
];

/// Engines whose NAME is a file on disk
const FILE_ENGINE_MARKER: &str = "sqlite";

/// Placeholder scheme used to parse URLs that have none
const SCHEMELESS: &str = "djdeploy-schemeless";

/// The resolved `DATABASES['default']` record.
///
/// Every field is optional and is left out of the serialized form when
/// absent, never written as null.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub struct DatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub options: BTreeMap<String, String>,
}

impl DatabaseConfig {
    /// Django refuses a database without an engine
    pub fn is_complete(&self) -> bool {
        self.engine.is_some()
    }

    /// Whether NAME refers to a file on disk
    pub fn is_file_based(&self) -> bool {
        self.engine
            .as_deref()
            .is_some_and(|e| e.contains(FILE_ENGINE_MARKER))
    }
}

/// Database declared as individual fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseFields {
    /// Base URL; explicit fields below override its parts
    pub url: Option<String>,
    /// Engine module or scheme alias (`postgres`, `sqlite`, ...)
    pub engine: Option<String>,
    /// Database name, or a file path for sqlite
    ///
    /// A relative sqlite path is joined onto the application directory, so
    /// `name = "db.sqlite3"` for `/srv/app` is `/srv/app/db.sqlite3`. The
    /// URL form resolves like a URI reference instead: `sqlite:///db.sqlite3`
    /// is `/srv/db.sqlite3`.
    pub name: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// How a deployment declares its database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DatabaseSpec {
    Url(String),
    Fields(DatabaseFields),
}

impl DatabaseSpec {
    /// Resolve into the canonical record for an application at `app_path`
    pub fn resolve(&self, app_path: &Path) -> Result<DatabaseConfig> {
        match self {
            Self::Url(url) => parse(url, app_path),
            Self::Fields(fields) => from_fields(fields, app_path),
        }
    }
}

/// Parse a database URL into a Django database record.
///
/// Relative sqlite names resolve against `app_path` the way a relative URI
/// reference resolves against a base, so `sqlite:///db.sqlite3` for an app
/// at `/srv/app` lands at `/srv/db.sqlite3`.
pub fn parse(url: &str, app_path: &Path) -> Result<DatabaseConfig> {
    let parsed = parse_uri(url)?;
    let scheme = match parsed.scheme() {
        SCHEMELESS => "",
        other => other,
    };

    let mut config = DatabaseConfig {
        url: Some(url.to_string()),
        ..Default::default()
    };

    if !scheme.is_empty() {
        config.engine = Some(engine_for(scheme));
    }

    let path = parsed.path();
    let raw_name = path.strip_prefix('/').unwrap_or(path);
    if !raw_name.is_empty() {
        config.name = Some(if config.is_file_based() {
            absolute_name(raw_name, app_path, url)?
        } else {
            decode(raw_name)
        });
    }

    config.user = non_empty(decode(parsed.username()));
    config.password = parsed.password().map(decode).and_then(non_empty);
    config.host = parsed.host_str().map(decode).and_then(non_empty);
    config.port = parsed.port().map(|p| p.to_string());

    log::debug!(
        "Parsed database URL: engine={:?} name={:?} host={:?}",
        config.engine,
        config.name,
        config.host
    );
    Ok(config)
}

/// Map a URL scheme or engine alias to a Django engine module
pub fn engine_for(scheme: &str) -> String {
    ENGINE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == scheme)
        .map(|(_, engine)| (*engine).to_string())
        .unwrap_or_else(|| format!("django.db.backends.{scheme}"))
}

fn from_fields(fields: &DatabaseFields, app_path: &Path) -> Result<DatabaseConfig> {
    let mut config = match &fields.url {
        Some(url) => parse(url, app_path)?,
        None => DatabaseConfig::default(),
    };

    if let Some(engine) = fields.engine.as_deref().and_then(|e| non_empty(e.to_string())) {
        // Full module paths pass through, bare names go through the aliases
        config.engine = Some(if engine.contains('.') {
            engine
        } else {
            engine_for(&engine)
        });
    }
    if let Some(name) = fields.name.clone().and_then(non_empty) {
        config.name = Some(name);
    }
    if let Some(user) = fields.user.clone().and_then(non_empty) {
        config.user = Some(user);
    }
    if let Some(password) = fields.password.clone().and_then(non_empty) {
        config.password = Some(password);
    }
    if let Some(host) = fields.host.clone().and_then(non_empty) {
        config.host = Some(host);
    }
    if let Some(port) = fields.port {
        config.port = Some(port.to_string());
    }
    config.options.extend(fields.options.clone());

    if config.is_file_based()
        && let Some(name) = config.name.take()
    {
        let base = std::path::absolute(app_path).map_err(|e| DeployError::io(app_path, e))?;
        config.name = Some(base.join(name).to_string_lossy().into_owned());
    }

    Ok(config)
}

fn parse_uri(url: &str) -> Result<Url> {
    let invalid = |e: url::ParseError| DeployError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    };

    match Url::parse(url) {
        Ok(parsed) => Ok(parsed),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(&format!("{SCHEMELESS}:///")).map_err(invalid)?;
            Url::options()
                .base_url(Some(&base))
                .parse(url)
                .map_err(invalid)
        }
        Err(e) => Err(invalid(e)),
    }
}

/// Resolve a still percent-encoded file name against the application path
fn absolute_name(raw_name: &str, app_path: &Path, url: &str) -> Result<String> {
    let invalid = |reason: String| DeployError::InvalidUrl {
        url: url.to_string(),
        reason,
    };

    let app_path = std::path::absolute(app_path).map_err(|e| DeployError::io(app_path, e))?;
    let base = Url::from_file_path(&app_path)
        .map_err(|()| invalid(format!("{} is not a usable base path", app_path.display())))?;
    let joined = base.join(raw_name).map_err(|e| invalid(e.to_string()))?;
    let path = joined
        .to_file_path()
        .map_err(|()| invalid(format!("{joined} is not a file path")))?;
    Ok(path.to_string_lossy().into_owned())
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() { None } else { Some(s) }
}
