//! Front Office / COO analytics mart pipeline.
//!
//! Synthetic raw trade/price/reference data -> ordered SQL model scripts ->
//! derived `mart.*` tables -> data-quality battery -> append-only run
//! ledger in `ops.pipeline_runs`. The orchestrator guarantees exactly one
//! run record per invocation, success or failure.

pub mod catalog;
pub mod error;
pub mod generator;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod runner;
pub mod store;
pub mod validate;

pub use catalog::{catalog_from_env, default_catalog, ModelScript};
pub use error::PipelineError;
pub use generator::{GeneratorConfig, RawDataGenerator, SyntheticGenerator};
pub use ledger::{RunRecord, RunStatus};
pub use orchestrator::{build_mart, BuildOptions, BuildOutcome, RetryPolicy};
pub use store::{Access, Store};
pub use validate::{CheckResult, DqReport};
