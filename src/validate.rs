//! Data-quality checks over the mart.
//!
//! Three atomic primitives (existence, minimum row count, key uniqueness)
//! plus the fixed battery the mart build runs before a run may be declared
//! successful. Each check opens its own read-only connection and returns a
//! [`CheckResult`]; results are ephemeral and only the aggregate verdict
//! feeds into the run record.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PipelineError;
use crate::store::{Access, Store};

/// Mart tables the battery asserts exist and are non-empty.
pub const MART_TABLES: [&str; 5] = [
    "daily_positions",
    "daily_pnl",
    "daily_exposures",
    "daily_liquidity",
    "earnings_window_pnl",
];

/// Outcome of one data-quality assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub details: String,
}

/// Aggregate battery verdict plus every individual result for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DqReport {
    pub passed: bool,
    pub checks: Vec<CheckResult>,
}

impl DqReport {
    pub fn from_checks(checks: Vec<CheckResult>) -> Self {
        let passed = checks.iter().all(|c| c.passed);
        Self { passed, checks }
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|c| !c.passed)
    }

    /// Full battery payload for error messages and logs.
    pub fn summary(&self) -> String {
        let failed = self.failed_checks().count();
        let payload = serde_json::to_string(self).unwrap_or_else(|_| "<unserializable>".into());
        format!("{failed}/{} checks failed: {payload}", self.checks.len())
    }
}

/// Reject anything that is not a plain ASCII identifier before it is
/// interpolated into SQL.
fn safe_ident(ident: &str) -> Result<&str, PipelineError> {
    let mut chars = ident.chars();
    let head_ok = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if head_ok && ident.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(ident)
    } else {
        Err(PipelineError::InvalidIdentifier(ident.to_string()))
    }
}

/// Table registered exactly once in the schema's catalog.
pub fn check_table_exists(
    store: &Store,
    schema: &str,
    table: &str,
) -> Result<CheckResult, PipelineError> {
    let schema = safe_ident(schema)?;
    let conn = store.open(Access::ReadOnly)?;
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {schema}.sqlite_master WHERE type = 'table' AND name = ?1"),
        [table],
        |row| row.get(0),
    )?;
    Ok(CheckResult {
        name: format!("exists:{schema}.{table}"),
        passed: count == 1,
        details: format!("count={count}"),
    })
}

/// `COUNT(*) >= min_rows`; the mart battery uses `min_rows = 1`.
pub fn check_row_count(
    store: &Store,
    schema: &str,
    table: &str,
    min_rows: i64,
) -> Result<CheckResult, PipelineError> {
    let schema = safe_ident(schema)?;
    let table = safe_ident(table)?;
    let conn = store.open(Access::ReadOnly)?;
    let rows: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {schema}.{table}"),
        [],
        |row| row.get(0),
    )?;
    Ok(CheckResult {
        name: format!("min_rows:{schema}.{table}"),
        passed: rows >= min_rows,
        details: format!("rows={rows}, min_rows={min_rows}"),
    })
}

/// Zero key tuples occurring more than once. Group-by based, so composite
/// keys, NULLs, and mixed column types are handled uniformly.
pub fn check_unique_key(
    store: &Store,
    schema: &str,
    table: &str,
    key_cols: &[&str],
) -> Result<CheckResult, PipelineError> {
    if key_cols.is_empty() {
        return Err(PipelineError::EmptyUniqueKey);
    }
    let schema = safe_ident(schema)?;
    let table = safe_ident(table)?;
    let cols = key_cols
        .iter()
        .map(|c| safe_ident(c).map(str::to_string))
        .collect::<Result<Vec<_>, _>>()?
        .join(", ");

    let conn = store.open(Access::ReadOnly)?;
    let dup_groups: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM ( \
               SELECT 1 FROM {schema}.{table} \
               GROUP BY {cols} \
               HAVING COUNT(*) > 1 \
             )"
        ),
        [],
        |row| row.get(0),
    )?;
    Ok(CheckResult {
        name: format!("unique_key:{schema}.{table}({cols})"),
        passed: dup_groups == 0,
        details: format!("dup_groups={dup_groups}"),
    })
}

/// The fixed battery for the mart build: existence + non-empty for each mart
/// table, plus the positions key invariant. The verdict is the AND of every
/// individual check.
pub fn mart_battery(store: &Store) -> Result<DqReport, PipelineError> {
    let mut checks = Vec::with_capacity(MART_TABLES.len() * 2 + 1);

    for table in MART_TABLES {
        checks.push(check_table_exists(store, "mart", table)?);
        checks.push(check_row_count(store, "mart", table, 1)?);
    }
    checks.push(check_unique_key(
        store,
        "mart",
        "daily_positions",
        &["date", "strategy", "ticker"],
    )?);

    let report = DqReport::from_checks(checks);
    debug!(passed = report.passed, checks = report.checks.len(), "dq battery complete");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::new(dir.path().join("fe_coo.db"));
        let conn = store.open(Access::ReadWrite).expect("open rw");
        conn.execute_batch(
            "CREATE TABLE mart.daily_positions (date TEXT, strategy TEXT, ticker TEXT, shares REAL); \
             INSERT INTO mart.daily_positions VALUES ('2025-10-01', 'CORE', 'ABC', 100.0); \
             INSERT INTO mart.daily_positions VALUES ('2025-10-01', 'CORE', 'XYZ', -40.0); \
             CREATE TABLE mart.empty_table (x INTEGER);",
        )
        .expect("fixture schema");
        (dir, store)
    }

    #[test]
    fn existence_check_distinguishes_present_and_absent() {
        let (_dir, store) = fixture_store();
        let present = check_table_exists(&store, "mart", "daily_positions").unwrap();
        assert!(present.passed, "{}", present.details);
        let absent = check_table_exists(&store, "mart", "no_such_table").unwrap();
        assert!(!absent.passed);
        assert_eq!(absent.details, "count=0");
    }

    #[test]
    fn row_count_boundary_one_row_passes_zero_fails() {
        let (_dir, store) = fixture_store();
        let conn = store.open(Access::ReadWrite).unwrap();
        conn.execute_batch(
            "CREATE TABLE mart.one_row (x INTEGER); INSERT INTO mart.one_row VALUES (1);",
        )
        .unwrap();
        drop(conn);

        assert!(check_row_count(&store, "mart", "one_row", 1).unwrap().passed);
        assert!(!check_row_count(&store, "mart", "empty_table", 1).unwrap().passed);
    }

    #[test]
    fn unique_key_flips_when_a_duplicate_is_injected() {
        let (_dir, store) = fixture_store();
        let key = ["date", "strategy", "ticker"];

        let clean = check_unique_key(&store, "mart", "daily_positions", &key).unwrap();
        assert!(clean.passed, "{}", clean.details);
        assert_eq!(clean.details, "dup_groups=0");

        let conn = store.open(Access::ReadWrite).unwrap();
        conn.execute(
            "INSERT INTO mart.daily_positions VALUES ('2025-10-01', 'CORE', 'ABC', 55.0)",
            [],
        )
        .unwrap();
        drop(conn);

        let dirty = check_unique_key(&store, "mart", "daily_positions", &key).unwrap();
        assert!(!dirty.passed);
        assert_eq!(dirty.details, "dup_groups=1");
    }

    #[test]
    fn unique_key_treats_nulls_as_equal_groups() {
        let (_dir, store) = fixture_store();
        let conn = store.open(Access::ReadWrite).unwrap();
        conn.execute_batch(
            "CREATE TABLE mart.nullable (a TEXT, b INTEGER); \
             INSERT INTO mart.nullable VALUES (NULL, 1); \
             INSERT INTO mart.nullable VALUES (NULL, 1);",
        )
        .unwrap();
        drop(conn);

        let res = check_unique_key(&store, "mart", "nullable", &["a", "b"]).unwrap();
        assert!(!res.passed, "duplicate NULL tuples must be reported");
    }

    #[test]
    fn unique_key_rejects_empty_key_and_bad_identifiers() {
        let (_dir, store) = fixture_store();
        assert!(matches!(
            check_unique_key(&store, "mart", "daily_positions", &[]),
            Err(PipelineError::EmptyUniqueKey)
        ));
        assert!(matches!(
            check_row_count(&store, "mart", "daily_positions; DROP TABLE x", 1),
            Err(PipelineError::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn battery_verdict_is_and_of_all_checks() {
        let (_dir, store) = fixture_store();
        let conn = store.open(Access::ReadWrite).unwrap();
        conn.execute_batch(
            "CREATE TABLE mart.daily_pnl (date TEXT, strategy TEXT, ticker TEXT, pnl REAL); \
             INSERT INTO mart.daily_pnl VALUES ('2025-10-01', 'CORE', 'ABC', 12.5); \
             CREATE TABLE mart.daily_exposures (date TEXT, strategy TEXT, gross_exposure REAL, net_exposure REAL); \
             INSERT INTO mart.daily_exposures VALUES ('2025-10-01', 'CORE', 100.0, 60.0); \
             CREATE TABLE mart.daily_liquidity (date TEXT, strategy TEXT, ticker TEXT, shares REAL, adv_shares INTEGER, days_to_liquidate REAL, illiquid_flag INTEGER); \
             INSERT INTO mart.daily_liquidity VALUES ('2025-10-01', 'CORE', 'ABC', 100.0, 500000, 0.0002, 0); \
             CREATE TABLE mart.earnings_window_pnl (strategy TEXT, ticker TEXT, earnings_date TEXT, pnl_total_window REAL);",
        )
        .unwrap();
        drop(conn);

        // earnings_window_pnl exists but is empty, so exactly one check of
        // the battery fails and the verdict must be false.
        let report = mart_battery(&store).unwrap();
        assert!(!report.passed);
        let failing: Vec<_> = report.failed_checks().map(|c| c.name.clone()).collect();
        assert_eq!(failing, vec!["min_rows:mart.earnings_window_pnl"]);
        assert_eq!(report.checks.len(), 11);
    }
}
