//! Embedded analytical store.
//!
//! One SQLite base file plus three schema databases (`raw`, `mart`, `ops`)
//! attached to every connection under those names, so model SQL and checks
//! address tables exactly as `mart.daily_positions`. The `Store` handle is
//! cheap and injected into each component; actual connections are scoped to
//! one logical operation and dropped immediately after.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, warn};

use crate::error::PipelineError;

/// Environment variable overriding the store location.
pub const DB_PATH_ENV: &str = "FE_COO_DB_PATH";

/// Default store location relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "data/fe_coo.db";

/// Logical schemas, each backed by its own attached database file.
pub const SCHEMAS: [&str; 3] = ["raw", "mart", "ops"];

/// Connection access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadWrite,
    ReadOnly,
}

/// Handle to the analytics store. Holds only the base path; every call to
/// [`Store::open`] yields a fresh scoped connection.
#[derive(Debug, Clone)]
pub struct Store {
    base: PathBuf,
}

impl Store {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Resolve the store location from `FE_COO_DB_PATH`, falling back to
    /// `data/fe_coo.db`.
    pub fn from_env() -> Self {
        let base = std::env::var(DB_PATH_ENV).unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());
        Self::new(base)
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// Path of the attached database file backing one schema.
    fn schema_path(&self, schema: &str) -> PathBuf {
        self.base.with_extension(format!("{schema}.db"))
    }

    fn exists(&self) -> bool {
        self.base.exists() && SCHEMAS.iter().all(|s| self.schema_path(s).exists())
    }

    /// Open a connection with all three schemas attached.
    ///
    /// A read-only request against a store that does not exist yet degrades
    /// to a create-capable connection so that first-run bootstrapping works;
    /// the degradation is logged.
    pub fn open(&self, access: Access) -> Result<Connection, PipelineError> {
        let access = match access {
            Access::ReadOnly if !self.exists() => {
                warn!(
                    base = %self.base.display(),
                    "read-only open against missing store, degrading to create"
                );
                Access::ReadWrite
            }
            other => other,
        };

        let conn = match access {
            Access::ReadWrite => {
                if let Some(parent) = self.base.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                let conn = Connection::open(&self.base)?;
                for schema in SCHEMAS {
                    let path = self.schema_path(schema);
                    conn.execute_batch(&format!(
                        "ATTACH DATABASE '{}' AS {schema};",
                        escape_sql_literal(&path)
                    ))?;
                }
                conn
            }
            Access::ReadOnly => {
                let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI;
                let conn = Connection::open_with_flags(&self.base, flags)?;
                for schema in SCHEMAS {
                    let path = self.schema_path(schema);
                    conn.execute_batch(&format!(
                        "ATTACH DATABASE 'file:{}?mode=ro' AS {schema};",
                        escape_sql_literal(&path)
                    ))?;
                }
                conn
            }
        };

        // Writers from a concurrent reader's perspective hold the file lock
        // briefly; wait rather than failing on SQLITE_BUSY.
        conn.busy_timeout(Duration::from_secs(5))?;
        debug!(base = %self.base.display(), ?access, "store connection opened");
        Ok(conn)
    }
}

/// Escape a path for embedding in a single-quoted SQL literal.
fn escape_sql_literal(path: &Path) -> String {
    path.to_string_lossy().replace('\'', "''")
}
