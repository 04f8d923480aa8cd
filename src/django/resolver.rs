//! Attribute resolution
//!
//! A [`DjangoApp`] declaration leaves most attributes unset. Resolution runs
//! in two phases: the declaration holds everything given explicitly, then
//! [`Resolver`] computes the remaining defaults in dependency order and
//! freezes them into a [`ResolvedDjango`]. Each attribute is computed at
//! most once; reading it again returns the memoized value.
//!
//! Dependency edges:
//!
//! ```text
//! manage_path        settings_module        wsgi_module      database
//!                          |
//!                   local_settings_path
//!                          |
//!                   local_settings (content)  <- database
//! ```

use serde::{Deserialize, Deserializer};
use std::cell::OnceCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::database::DatabaseConfig;
use super::locator;
use super::resource::DjangoApp;
use super::settings::{BuiltinTemplate, FileTemplate, LocalSettingsContext, SettingsRenderer};
use crate::error::{DeployError, Result};

pub const SETTINGS_FILE: &str = "settings.py";
pub const WSGI_FILE: &str = "wsgi.py";
pub const MANAGE_FILE: &str = "manage.py";
pub const LOCAL_SETTINGS_FILE: &str = "local_settings.py";

/// An attribute that can be inferred, switched off, or given explicitly
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Setting<T> {
    /// Infer from the filesystem
    #[default]
    Unset,
    /// Explicitly `false`: the feature is off
    Disabled,
    Value(T),
}

impl<T> Setting<T> {
    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Setting<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw<T> {
            Flag(bool),
            Value(T),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Flag(false) => Self::Disabled,
            Raw::Flag(true) => Self::Unset,
            Raw::Value(v) => Self::Value(v),
        })
    }
}

/// Seam for filesystem lookups
pub trait FileLocator {
    fn find(&self, base_dir: &Path, filename: &str) -> Result<PathBuf>;
}

/// Walks the application tree
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkLocator;

impl FileLocator for WalkLocator {
    fn find(&self, base_dir: &Path, filename: &str) -> Result<PathBuf> {
        locator::find(base_dir, filename)
    }
}

/// The generated local settings file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSettings {
    pub path: PathBuf,
    pub content: String,
}

/// A deployment with every attribute decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDjango {
    pub path: PathBuf,
    /// `None` when settings are disabled
    pub settings_module: Option<String>,
    /// `None` when WSGI is disabled
    pub wsgi_module: Option<String>,
    /// Only resolved when a management command will run
    pub manage_path: Option<PathBuf>,
    pub database: Option<DatabaseConfig>,
    /// `None` when local settings are disabled
    pub local_settings: Option<LocalSettings>,
    pub collectstatic: bool,
    pub migrate: bool,
    pub syncdb: bool,
    pub python: String,
    pub environment: BTreeMap<String, String>,
}

impl ResolvedDjango {
    /// Whether any management command is enabled
    pub fn runs_commands(&self) -> bool {
        self.syncdb || self.migrate || self.collectstatic
    }
}

/// Lazily computes the unset attributes of one declaration
pub struct Resolver<'a, L: FileLocator = WalkLocator> {
    app: &'a DjangoApp,
    locator: L,
    settings_module: OnceCell<Option<String>>,
    wsgi_module: OnceCell<Option<String>>,
    manage_path: OnceCell<PathBuf>,
    local_settings_path: OnceCell<Option<PathBuf>>,
    database: OnceCell<Option<DatabaseConfig>>,
}

impl<'a> Resolver<'a> {
    pub fn new(app: &'a DjangoApp) -> Self {
        Self::with_locator(app, WalkLocator)
    }
}

impl<'a, L: FileLocator> Resolver<'a, L> {
    pub fn with_locator(app: &'a DjangoApp, locator: L) -> Self {
        Self {
            app,
            locator,
            settings_module: OnceCell::new(),
            wsgi_module: OnceCell::new(),
            manage_path: OnceCell::new(),
            local_settings_path: OnceCell::new(),
            database: OnceCell::new(),
        }
    }

    /// Dotted settings module, `None` when disabled
    pub fn settings_module(&self) -> Result<Option<&str>> {
        memo(&self.settings_module, || {
            self.module_setting(&self.app.settings_module, SETTINGS_FILE)
        })
        .map(Option::as_deref)
    }

    /// Dotted WSGI module, `None` when disabled
    pub fn wsgi_module(&self) -> Result<Option<&str>> {
        memo(&self.wsgi_module, || {
            self.module_setting(&self.app.wsgi_module, WSGI_FILE)
        })
        .map(Option::as_deref)
    }

    /// Absolute path of `manage.py`
    pub fn manage_path(&self) -> Result<&Path> {
        memo(&self.manage_path, || match &self.app.manage_path {
            Some(path) => Ok(self.absolute(path)),
            None => self.locator.find(self.app.path(), MANAGE_FILE),
        })
        .map(PathBuf::as_path)
    }

    /// Where local settings are written, `None` when disabled
    pub fn local_settings_path(&self) -> Result<Option<&Path>> {
        memo(&self.local_settings_path, || {
            // Settings-dependent features are never half-enabled
            if self.app.settings_module.is_disabled() {
                return Ok(None);
            }
            match &self.app.local_settings_path {
                Setting::Disabled => Ok(None),
                Setting::Value(path) => Ok(Some(self.absolute(path))),
                Setting::Unset => {
                    let Some(module) = self.settings_module()? else {
                        return Ok(None);
                    };
                    let settings_file = module_to_path(self.app.path(), module);
                    let dir = settings_file.parent().unwrap_or(self.app.path());
                    Ok(Some(dir.join(LOCAL_SETTINGS_FILE)))
                }
            }
        })
        .map(Option::as_deref)
    }

    /// The database record, `None` when no database is declared
    pub fn database(&self) -> Result<Option<&DatabaseConfig>> {
        memo(&self.database, || {
            let database = self
                .app
                .database
                .as_ref()
                .map(|spec| spec.resolve(self.app.path()))
                .transpose()?;
            if let Some(db) = &database
                && !db.is_complete()
            {
                log::warn!("Database for {} has no ENGINE", self.app.path().display());
            }
            Ok(database)
        })
        .map(Option::as_ref)
    }

    /// Render the local settings content, `None` when disabled
    pub fn local_settings(&self) -> Result<Option<LocalSettings>> {
        let (Some(path), Some(module)) = (self.local_settings_path()?, self.settings_module()?)
        else {
            return Ok(None);
        };

        let ctx = LocalSettingsContext::new(
            module,
            self.database()?,
            self.app.debug,
            &self.app.allowed_hosts,
            self.app.secret_key.as_deref(),
        )?;
        let content = match &self.app.local_settings_template {
            Some(template) => FileTemplate::load(&self.absolute(template))?.render(&ctx)?,
            None => BuiltinTemplate.render(&ctx)?,
        };

        Ok(Some(LocalSettings {
            path: path.to_path_buf(),
            content,
        }))
    }

    /// Compute every attribute and freeze the result
    pub fn resolve(&self) -> Result<ResolvedDjango> {
        let app = self.app;
        let manage_path = if app.runs_commands() {
            Some(self.manage_path()?.to_path_buf())
        } else {
            None
        };

        let resolved = ResolvedDjango {
            path: app.path().to_path_buf(),
            settings_module: self.settings_module()?.map(str::to_string),
            wsgi_module: self.wsgi_module()?.map(str::to_string),
            manage_path,
            database: self.database()?.cloned(),
            local_settings: self.local_settings()?,
            collectstatic: app.collectstatic,
            migrate: app.migrate,
            syncdb: app.syncdb,
            python: app.python.clone(),
            environment: app.environment.clone(),
        };

        log::info!(
            "Resolved {}: settings={:?} wsgi={:?} local_settings={:?}",
            resolved.path.display(),
            resolved.settings_module,
            resolved.wsgi_module,
            resolved.local_settings.as_ref().map(|l| &l.path)
        );
        Ok(resolved)
    }

    fn module_setting(&self, setting: &Setting<String>, filename: &str) -> Result<Option<String>> {
        match setting {
            Setting::Disabled => Ok(None),
            Setting::Value(module) => Ok(Some(module.clone())),
            Setting::Unset => {
                let file = self.locator.find(self.app.path(), filename)?;
                let module = path_to_module(self.app.path(), &file)?;
                log::debug!("Inferred {module} from {}", file.display());
                Ok(Some(module))
            }
        }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.app.path().join(path)
        }
    }
}

/// Get a memoized value, computing it on first access
fn memo<T>(cell: &OnceCell<T>, compute: impl FnOnce() -> Result<T>) -> Result<&T> {
    if let Some(value) = cell.get() {
        return Ok(value);
    }
    let value = compute()?;
    Ok(cell.get_or_init(|| value))
}

/// `/srv/app/mysite/settings.py` under `/srv/app` -> `mysite.settings`
pub fn path_to_module(root: &Path, file: &Path) -> Result<String> {
    let not_a_module = || DeployError::NotAModule {
        path: file.to_path_buf(),
        root: root.to_path_buf(),
    };

    let relative = file.strip_prefix(root).map_err(|_| not_a_module())?;
    let relative = relative.with_extension("");
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str().ok_or_else(not_a_module))
        .collect::<Result<Vec<_>>>()?;

    if parts.is_empty() {
        return Err(not_a_module());
    }
    Ok(parts.join("."))
}

/// `mysite.settings` under `/srv/app` -> `/srv/app/mysite/settings.py`
pub fn module_to_path(root: &Path, module: &str) -> PathBuf {
    let mut path = module
        .split('.')
        .fold(root.to_path_buf(), |path, part| path.join(part));
    path.set_extension("py");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::django::database::DatabaseSpec;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    /// Counts lookups and delegates to the real walker
    #[derive(Default)]
    struct CountingLocator {
        calls: Cell<usize>,
    }

    impl FileLocator for &CountingLocator {
        fn find(&self, base_dir: &Path, filename: &str) -> Result<PathBuf> {
            self.calls.set(self.calls.get() + 1);
            locator::find(base_dir, filename)
        }
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        for rel in ["manage.py", "mysite/settings.py", "mysite/wsgi.py"] {
            let path = dir.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        dir
    }

    #[test]
    fn test_infers_everything() {
        let dir = project();
        let app = DjangoApp::new(dir.path());
        let resolved = Resolver::new(&app).resolve().unwrap();

        assert_eq!(resolved.settings_module.as_deref(), Some("mysite.settings"));
        assert_eq!(resolved.wsgi_module.as_deref(), Some("mysite.wsgi"));
        assert_eq!(resolved.manage_path, Some(dir.path().join("manage.py")));
        let local = resolved.local_settings.unwrap();
        assert_eq!(local.path, dir.path().join("mysite/local_settings.py"));
        assert!(local.content.contains("from mysite.settings import *"));
    }

    #[test]
    fn test_reads_are_memoized() {
        let dir = project();
        let app = DjangoApp::new(dir.path());
        let counter = CountingLocator::default();
        let resolver = Resolver::with_locator(&app, &counter);

        let first = resolver.settings_module().unwrap().map(str::to_string);
        let second = resolver.settings_module().unwrap().map(str::to_string);
        resolver.local_settings_path().unwrap();
        resolver.resolve().unwrap();

        assert_eq!(first, second);
        // settings.py, wsgi.py and manage.py, each looked up once
        assert_eq!(counter.calls.get(), 3);
    }

    #[test]
    fn test_disabled_settings_disable_local_settings_without_scanning() {
        let dir = TempDir::new().unwrap();
        let mut app = DjangoApp::new(dir.path().join("not-there"));
        app.settings_module = Setting::Disabled;
        let counter = CountingLocator::default();
        let resolver = Resolver::with_locator(&app, &counter);

        assert_eq!(resolver.local_settings_path().unwrap(), None);
        assert_eq!(resolver.settings_module().unwrap(), None);
        assert_eq!(counter.calls.get(), 0);
    }

    #[test]
    fn test_disabled_settings_override_explicit_local_path() {
        let dir = project();
        let mut app = DjangoApp::new(dir.path());
        app.settings_module = Setting::Disabled;
        app.local_settings_path = Setting::Value(PathBuf::from("conf/local.py"));

        assert_eq!(Resolver::new(&app).local_settings_path().unwrap(), None);
    }

    #[test]
    fn test_explicit_values_skip_the_filesystem() {
        let dir = TempDir::new().unwrap();
        let mut app = DjangoApp::new(dir.path());
        app.settings_module = Setting::Value("config.settings.prod".into());
        app.wsgi_module = Setting::Disabled;
        app.manage_path = Some(PathBuf::from("bin/manage.py"));
        let counter = CountingLocator::default();
        let resolver = Resolver::with_locator(&app, &counter);

        let resolved = resolver.resolve().unwrap();
        assert_eq!(counter.calls.get(), 0);
        assert_eq!(resolved.wsgi_module, None);
        assert_eq!(resolved.manage_path, Some(dir.path().join("bin/manage.py")));
        assert_eq!(
            resolved.local_settings.unwrap().path,
            dir.path().join("config/settings/local_settings.py")
        );
    }

    #[test]
    fn test_missing_settings_propagates_not_found() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("manage.py"), "").unwrap();
        let app = DjangoApp::new(dir.path());

        let err = Resolver::new(&app).resolve().unwrap_err();
        assert!(matches!(err, DeployError::FileNotFound { ref filename, .. } if filename == SETTINGS_FILE));
    }

    #[test]
    fn test_manage_path_not_required_without_commands() {
        let dir = TempDir::new().unwrap();
        let mut app = DjangoApp::new(dir.path());
        app.settings_module = Setting::Disabled;
        app.wsgi_module = Setting::Disabled;
        app.collectstatic = false;

        let resolved = Resolver::new(&app).resolve().unwrap();
        assert_eq!(resolved.manage_path, None);
        assert!(!resolved.runs_commands());
    }

    #[test]
    fn test_database_and_custom_template() {
        let dir = project();
        fs::write(
            dir.path().join("local.py.tmpl"),
            "from {{ settings_module }} import *\nDATABASES = {{ databases }}\n",
        )
        .unwrap();
        let mut app = DjangoApp::new(dir.path());
        app.database = Some(DatabaseSpec::Url("postgres://db/shop".into()));
        app.local_settings_template = Some(PathBuf::from("local.py.tmpl"));

        let resolved = Resolver::new(&app).resolve().unwrap();
        let db = resolved.database.unwrap();
        assert_eq!(db.name.as_deref(), Some("shop"));
        let content = resolved.local_settings.unwrap().content;
        assert!(content.starts_with("from mysite.settings import *\nDATABASES = {\"default\":"));
    }

    #[test]
    fn test_module_path_conversions() {
        let root = Path::new("/srv/app");
        assert_eq!(
            path_to_module(root, Path::new("/srv/app/mysite/settings.py")).unwrap(),
            "mysite.settings"
        );
        assert_eq!(
            module_to_path(root, "mysite.settings"),
            PathBuf::from("/srv/app/mysite/settings.py")
        );
        assert!(path_to_module(root, Path::new("/elsewhere/settings.py")).is_err());
    }

    #[test]
    fn test_setting_deserializes_false_as_disabled() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default)]
            module: Setting<String>,
        }

        let off: Holder = toml::from_str("module = false").unwrap();
        assert_eq!(off.module, Setting::Disabled);
        let on: Holder = toml::from_str(r#"module = "mysite.settings""#).unwrap();
        assert_eq!(on.module, Setting::Value("mysite.settings".into()));
        let unset: Holder = toml::from_str("").unwrap();
        assert_eq!(unset.module, Setting::Unset);
    }
}
