//! `djdeploy database` - show how a URL maps onto Django settings

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

use crate::django::database::{self, DatabaseConfig};

pub fn run(url: &str, path: &Path) -> Result<()> {
    let app_path = std::path::absolute(path)
        .with_context(|| format!("Could not resolve {}", path.display()))?;
    println!("{}", render(url, &app_path)?);
    Ok(())
}

/// `{"default": {...}}` as pretty JSON
fn render(url: &str, app_path: &Path) -> Result<String> {
    let config: DatabaseConfig = database::parse(url, app_path)?;
    let databases = BTreeMap::from([("default", config)]);
    Ok(serde_json::to_string_pretty(&databases)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_postgres() {
        let out = render("postgres://u:p@db:5432/shop", Path::new("/srv/app")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(
            value["default"]["ENGINE"],
            "django.db.backends.postgresql_psycopg2"
        );
        assert_eq!(value["default"]["PORT"], "5432");
        assert_eq!(value["default"]["URL"], "postgres://u:p@db:5432/shop");
    }

    #[test]
    fn test_render_invalid_url() {
        let err = render("postgres://db:99999/shop", Path::new("/srv/app")).unwrap_err();
        assert!(err.to_string().contains("invalid database URL"));
    }
}
