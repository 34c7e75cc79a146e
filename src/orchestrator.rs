//! Build-mart orchestration.
//!
//! Sequential state machine: INIT -> (REGENERATE_RAW)? -> RUN_MODELS ->
//! RUN_DQ -> FINALIZE. Failures in the middle steps are caught exactly once
//! at this boundary, converted to a `failed` outcome with a structured error
//! string, and still reach FINALIZE so that exactly one run record is
//! appended per invocation. Only INIT and the ledger append itself may
//! propagate an `Err` to the caller.

use std::time::Instant;

use anyhow::Context;
use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::catalog::ModelScript;
use crate::error::PipelineError;
use crate::generator::RawDataGenerator;
use crate::ledger::{self, RunRecord, RunStatus};
use crate::runner;
use crate::store::Store;
use crate::validate::{self, DqReport};

/// Per-step retry extension point. The pipeline is retry-free by design;
/// the default policy runs each step once.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 1 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Invoke the raw-data generator before building. Defaults to false.
    pub regenerate_raw: bool,
    pub retry: RetryPolicy,
}

/// Structured result returned to callers; never an `Err` for step failures.
#[derive(Debug, Serialize)]
pub struct BuildOutcome {
    pub run_id: String,
    pub status: RunStatus,
    pub models_ran: Vec<String>,
    pub duration_seconds: f64,
    /// Check battery detail, present on success.
    pub dq: Option<DqReport>,
    /// Structured error summary, present on failure.
    pub error: Option<String>,
}

/// Orchestrate one mart build against `store`.
pub fn build_mart(
    store: &Store,
    catalog: &[ModelScript],
    generator: &dyn RawDataGenerator,
    opts: &BuildOptions,
) -> anyhow::Result<BuildOutcome> {
    let run_id = format!("build-mart-{}", Utc::now().format("%Y%m%dT%H%M%SZ"));
    let started = Instant::now();
    info!(%run_id, regenerate_raw = opts.regenerate_raw, "build starting");

    // INIT: hard precondition; without the ledger table there is nowhere to
    // record the run, so this failure aborts before timing matters.
    ledger::ensure_ops_ledger(store).context("ops ledger precondition failed")?;

    let mut models_ran: Vec<String> = Vec::new();
    let steps = run_steps(store, catalog, generator, opts, &mut models_ran);

    let (status, dq, error) = match steps {
        Ok(report) => {
            info!(%run_id, models = models_ran.len(), "build succeeded");
            (RunStatus::Success, Some(report), None)
        }
        Err(err) => {
            let rendered = err.render();
            error!(%run_id, error = %rendered, "build failed");
            (RunStatus::Failed, None, Some(rendered))
        }
    };

    // FINALIZE: always reached on both paths; exactly one record per
    // invocation. An append failure is the one thing allowed to propagate.
    let duration_seconds = started.elapsed().as_secs_f64();
    let record = RunRecord {
        run_id: run_id.clone(),
        run_ts: Utc::now(),
        status,
        regenerated_raw: opts.regenerate_raw,
        models_ran: models_ran.join(","),
        duration_seconds,
        error_message: error.clone(),
    };
    ledger::append_run(store, &record).context("run ledger append failed")?;

    Ok(BuildOutcome {
        run_id,
        status,
        models_ran,
        duration_seconds,
        dq,
        error,
    })
}

/// Steps 2-4. `models_ran` is an accumulator owned by the caller so partial
/// progress survives an `Err`.
fn run_steps(
    store: &Store,
    catalog: &[ModelScript],
    generator: &dyn RawDataGenerator,
    opts: &BuildOptions,
    models_ran: &mut Vec<String>,
) -> Result<DqReport, PipelineError> {
    if opts.regenerate_raw {
        info!("regenerating raw tables");
        with_retry(&opts.retry, "regenerate_raw", || {
            generator
                .regenerate(store)
                .map_err(|e| PipelineError::Generator {
                    message: format!("{e:#}"),
                })
        })?;
    }

    info!("running SQL models");
    with_retry(&opts.retry, "run_models", || {
        let mut ran = Vec::new();
        let result = runner::run_models(store, catalog, &mut ran);
        *models_ran = ran;
        result
    })?;

    info!("running DQ checks");
    let report = with_retry(&opts.retry, "run_dq", || validate::mart_battery(store))?;
    if !report.passed {
        return Err(PipelineError::QualityGate { report });
    }
    Ok(report)
}

fn with_retry<T>(
    policy: &RetryPolicy,
    step: &str,
    mut f: impl FnMut() -> Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    let attempts = policy.attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                warn!(step, attempt, error = %err, "step failed, retrying");
            }
            Err(err) => return Err(err),
        }
    }
}
