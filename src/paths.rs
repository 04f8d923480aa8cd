//! Path resolution for djdeploy
//!
//! # Environment Variables
//!
//! - `DJDEPLOY_MANIFEST` - Manifest file used when `--manifest` is not given
//! - `DJDEPLOY_STATE_DIR` - Override state directory
//!
//! # Path Resolution Priority
//!
//! For manifest_path():
//! 1. `--manifest` flag
//! 2. `DJDEPLOY_MANIFEST` environment variable
//! 3. `./djdeploy.toml`
//!
//! For state_dir():
//! 1. `DJDEPLOY_STATE_DIR` environment variable
//! 2. `XDG_STATE_HOME/djdeploy` (if set)
//! 3. `~/.local/state/djdeploy`

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Environment variable for the manifest path
pub const ENV_MANIFEST: &str = "DJDEPLOY_MANIFEST";

/// Environment variable for state directory override
pub const ENV_STATE_DIR: &str = "DJDEPLOY_STATE_DIR";

/// Manifest looked up in the working directory
pub const DEFAULT_MANIFEST: &str = "djdeploy.toml";

/// Get the manifest path
pub fn manifest_path(flag: Option<&Path>) -> PathBuf {
    if let Some(path) = flag {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ENV_MANIFEST) {
        let path = expand(&path);
        log::debug!("Using manifest from {}: {}", ENV_MANIFEST, path.display());
        return path;
    }

    PathBuf::from(DEFAULT_MANIFEST)
}

/// Get the djdeploy state directory path
pub fn state_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
        let path = expand(&dir);
        log::debug!("Using state dir from {}: {}", ENV_STATE_DIR, path.display());
        return Ok(path);
    }

    if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(xdg_state).join("djdeploy");
        log::debug!("Using XDG_STATE_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".local").join("state").join("djdeploy");
    log::debug!("Using default state dir: {}", path.display());
    Ok(path)
}

/// Expand ~ and environment variables in a path string.
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(std::borrow::Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

/// Expand `path` and anchor it at `base` when relative
pub fn resolve_against(base: &Path, path: &Path) -> PathBuf {
    let expanded = expand(&path.to_string_lossy());
    if expanded.is_absolute() {
        expanded
    } else {
        base.join(expanded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Helper to run a test with temporary env var
    ///
    /// # Safety
    /// This function uses unsafe env::set_var/remove_var which can cause issues
    /// if other threads read environment variables concurrently.
    /// Only use in single-threaded test contexts.
    fn with_env_var<F, R>(key: &str, value: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::set_var(key, value) };
        let result = f();
        match original {
            // SAFETY: Tests run in isolation
            Some(v) => unsafe { env::set_var(key, v) },
            None => unsafe { env::remove_var(key) },
        }
        result
    }

    fn without_env_var<F, R>(key: &str, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let original = env::var(key).ok();
        // SAFETY: Tests run in isolation and don't read env vars concurrently
        unsafe { env::remove_var(key) };
        let result = f();
        if let Some(v) = original {
            // SAFETY: Tests run in isolation
            unsafe { env::set_var(key, v) };
        }
        result
    }

    #[test]
    fn test_manifest_flag_wins() {
        with_env_var(ENV_MANIFEST, "/etc/djdeploy/env.toml", || {
            let path = manifest_path(Some(Path::new("/srv/deploy.toml")));
            assert_eq!(path, PathBuf::from("/srv/deploy.toml"));
        });
    }

    #[test]
    fn test_manifest_env_then_default() {
        with_env_var(ENV_MANIFEST, "/etc/djdeploy/env.toml", || {
            assert_eq!(manifest_path(None), PathBuf::from("/etc/djdeploy/env.toml"));
        });
        without_env_var(ENV_MANIFEST, || {
            assert_eq!(manifest_path(None), PathBuf::from(DEFAULT_MANIFEST));
        });
    }

    #[test]
    fn test_state_dir_env_override() {
        with_env_var(ENV_STATE_DIR, "/custom/state/path", || {
            let result = state_dir().unwrap();
            assert_eq!(result, PathBuf::from("/custom/state/path"));
        });
    }

    #[test]
    fn test_xdg_state_home() {
        without_env_var(ENV_STATE_DIR, || {
            with_env_var("XDG_STATE_HOME", "/tmp/xdg-state-test", || {
                let result = state_dir().unwrap();
                assert_eq!(result, PathBuf::from("/tmp/xdg-state-test/djdeploy"));
            });
        });
    }

    #[test]
    fn test_expand_with_tilde() {
        let result = expand("~/test/path");
        let home = dirs::home_dir().unwrap();
        assert_eq!(result, home.join("test").join("path"));
    }

    #[test]
    fn test_expand_unknown_env_var_unchanged() {
        let result = expand("/path/$NONEXISTENT_VAR_12345/file");
        assert_eq!(result, PathBuf::from("/path/$NONEXISTENT_VAR_12345/file"));
    }

    #[test]
    fn test_resolve_against() {
        let base = Path::new("/etc/djdeploy");
        assert_eq!(
            resolve_against(base, Path::new("apps/shop")),
            PathBuf::from("/etc/djdeploy/apps/shop")
        );
        assert_eq!(
            resolve_against(base, Path::new("/srv/shop")),
            PathBuf::from("/srv/shop")
        );
    }
}
