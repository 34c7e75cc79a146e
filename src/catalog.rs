//! Ordered model-script catalog.
//!
//! Order is significant: later scripts read tables built by earlier ones
//! (positions -> pnl -> exposures -> liquidity -> earnings window). The
//! catalog is plain data so the set can be extended without touching the
//! runner or orchestrator.

use std::path::{Path, PathBuf};

/// Environment variable overriding the SQL scripts directory.
pub const SQL_DIR_ENV: &str = "FE_COO_SQL_DIR";

/// Default SQL scripts directory relative to the working directory.
pub const DEFAULT_SQL_DIR: &str = "sql";

/// A named unit of SQL transformation logic. Each script owns full-refresh
/// semantics for the mart table(s) it produces.
#[derive(Debug, Clone)]
pub struct ModelScript {
    pub name: String,
    pub path: PathBuf,
}

impl ModelScript {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

/// The fixed build order for the mart.
pub fn default_catalog(sql_dir: &Path) -> Vec<ModelScript> {
    [
        ("daily_positions", "01_daily_positions.sql"),
        ("daily_pnl", "02_daily_pnl.sql"),
        ("daily_exposures", "03_exposures.sql"),
        ("daily_liquidity", "04_liquidity.sql"),
        ("earnings_window", "05_earnings_window.sql"),
    ]
    .into_iter()
    .map(|(name, file)| ModelScript::new(name, sql_dir.join(file)))
    .collect()
}

/// Default catalog rooted at `FE_COO_SQL_DIR` (or `sql/`).
pub fn catalog_from_env() -> Vec<ModelScript> {
    let dir = std::env::var(SQL_DIR_ENV).unwrap_or_else(|_| DEFAULT_SQL_DIR.to_string());
    default_catalog(Path::new(&dir))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_ordered() {
        let catalog = default_catalog(Path::new("sql"));
        let names: Vec<_> = catalog.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "daily_positions",
                "daily_pnl",
                "daily_exposures",
                "daily_liquidity",
                "earnings_window"
            ]
        );
        assert!(catalog[0].path.ends_with("01_daily_positions.sql"));
    }

    #[test]
    fn env_catalog_roots_scripts_at_the_configured_dir() {
        std::env::set_var(SQL_DIR_ENV, "/srv/models");
        let catalog = catalog_from_env();
        assert!(catalog
            .iter()
            .all(|m| m.path.starts_with("/srv/models")));
        std::env::remove_var(SQL_DIR_ENV);
        let catalog = catalog_from_env();
        assert!(catalog[0].path.starts_with(DEFAULT_SQL_DIR));
    }
}
