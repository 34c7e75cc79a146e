//! SQL model runner.
//!
//! Applies an ordered sequence of model scripts against the store, each one
//! an opaque SQL program that fully replaces its own mart table(s). The
//! completed-script accumulator is owned by the caller so that partial
//! progress survives a mid-sequence failure.

use std::time::Instant;

use tracing::info;

use crate::catalog::ModelScript;
use crate::error::PipelineError;
use crate::store::{Access, Store};

/// Execute `scripts` in order on one read-write connection, pushing each
/// completed script's name onto `completed`.
///
/// A missing script file aborts immediately with no mutation for that
/// script and no attempt at later scripts; a SQL failure inside a script
/// terminates the sequence the same way. `completed` retains exactly the
/// scripts that finished before the failure.
pub fn run_models(
    store: &Store,
    scripts: &[ModelScript],
    completed: &mut Vec<String>,
) -> Result<(), PipelineError> {
    let conn = store.open(Access::ReadWrite)?;

    for script in scripts {
        if !script.path.exists() {
            return Err(PipelineError::MissingModelScript {
                name: script.name.clone(),
                path: script.path.clone(),
            });
        }
        let sql = std::fs::read_to_string(&script.path)?;

        let t0 = Instant::now();
        conn.execute_batch(&sql).map_err(|e| PipelineError::Model {
            name: script.name.clone(),
            source: e,
        })?;
        info!(
            model = %script.name,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "model applied"
        );
        completed.push(script.name.clone());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn write_script(dir: &Path, file: &str, sql: &str) -> ModelScript {
        let path = dir.join(file);
        fs::write(&path, sql).expect("write script");
        let name = file.trim_end_matches(".sql").to_string();
        ModelScript::new(name, path)
    }

    fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::new(dir.path().join("fe_coo.db"));
        (dir, store)
    }

    #[test]
    fn runs_scripts_in_order_and_reports_all() {
        let (dir, store) = temp_store();
        let scripts = vec![
            write_script(
                dir.path(),
                "a.sql",
                "DROP TABLE IF EXISTS mart.a; CREATE TABLE mart.a AS SELECT 1 AS x;",
            ),
            write_script(
                dir.path(),
                "b.sql",
                "DROP TABLE IF EXISTS mart.b; CREATE TABLE mart.b AS SELECT x + 1 AS y FROM mart.a;",
            ),
        ];

        let mut completed = Vec::new();
        run_models(&store, &scripts, &mut completed).expect("run models");
        assert_eq!(completed, vec!["a", "b"]);

        let conn = store.open(Access::ReadOnly).unwrap();
        let y: i64 = conn
            .query_row("SELECT y FROM mart.b", [], |row| row.get(0))
            .unwrap();
        assert_eq!(y, 2);
    }

    #[test]
    fn missing_script_aborts_before_later_scripts() {
        let (dir, store) = temp_store();
        let first = write_script(
            dir.path(),
            "first.sql",
            "DROP TABLE IF EXISTS mart.first; CREATE TABLE mart.first AS SELECT 1 AS x;",
        );
        let missing = ModelScript::new("ghost", dir.path().join("ghost.sql"));
        let never_run = write_script(
            dir.path(),
            "later.sql",
            "DROP TABLE IF EXISTS mart.later; CREATE TABLE mart.later AS SELECT 1 AS x;",
        );
        let scripts = vec![first, missing, never_run];

        let mut completed = Vec::new();
        let err = run_models(&store, &scripts, &mut completed).unwrap_err();
        assert!(matches!(err, PipelineError::MissingModelScript { ref name, .. } if name == "ghost"));
        assert_eq!(completed, vec!["first"]);

        let conn = store.open(Access::ReadOnly).unwrap();
        let later_exists: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM mart.sqlite_master WHERE name = 'later'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(later_exists, 0, "scripts after a missing one must not run");
    }

    #[test]
    fn sql_failure_maps_to_model_error_with_partial_progress() {
        let (dir, store) = temp_store();
        let scripts = vec![
            write_script(
                dir.path(),
                "ok.sql",
                "DROP TABLE IF EXISTS mart.ok; CREATE TABLE mart.ok AS SELECT 1 AS x;",
            ),
            write_script(dir.path(), "broken.sql", "SELEC nonsense FROM nowhere;"),
        ];

        let mut completed = Vec::new();
        let err = run_models(&store, &scripts, &mut completed).unwrap_err();
        assert!(matches!(err, PipelineError::Model { ref name, .. } if name == "broken"));
        assert_eq!(completed, vec!["ok"]);
    }

    #[test]
    fn rerunning_a_full_refresh_script_is_idempotent() {
        let (dir, store) = temp_store();
        let scripts = vec![write_script(
            dir.path(),
            "refresh.sql",
            "DROP TABLE IF EXISTS mart.refresh; \
             CREATE TABLE mart.refresh AS SELECT 1 AS x UNION ALL SELECT 2;",
        )];

        for _ in 0..2 {
            let mut completed = Vec::new();
            run_models(&store, &scripts, &mut completed).expect("run models");
        }

        let conn = store.open(Access::ReadOnly).unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM mart.refresh", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 2);
    }
}
