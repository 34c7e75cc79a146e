//! fe-coo: mart pipeline CLI.
//!
//! # Exit Codes
//!
//! - 0: command succeeded (for `build`: run status is `success`)
//! - 1: `build` completed but the run status is `failed`
//! - 2: invocation error (bad config, missing ledger, I/O)

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::error;
use tracing_subscriber::EnvFilter;

use fe_coo_analytics::{
    catalog, ledger, metrics,
    orchestrator::{build_mart, BuildOptions},
    store::Store,
    validate, RunStatus, SyntheticGenerator,
};

/// Front Office / COO analytics mart pipeline
#[derive(Parser, Debug)]
#[command(name = "fe-coo")]
#[command(about = "Build, validate, and inspect the FE-COO analytics mart")]
struct Cli {
    /// Base path of the analytics store (default: FE_COO_DB_PATH or data/fe_coo.db)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Directory holding the SQL model scripts (default: FE_COO_SQL_DIR or sql/)
    #[arg(long)]
    sql_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full mart build (models + DQ checks + run record)
    Build {
        /// Regenerate raw tables before building
        #[arg(long)]
        regenerate_raw: bool,
    },

    /// Regenerate the synthetic raw tables only
    Generate,

    /// Run the DQ battery against the current mart and print each check
    Validate,

    /// Show recent pipeline runs from the ledger
    Runs {
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Daily PnL per strategy
    Pnl {
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Gross/net exposure over time
    Exposures {
        #[arg(long)]
        strategy: Option<String>,
    },

    /// Hardest-to-unwind positions
    Liquidity {
        #[arg(long)]
        date: Option<String>,
        #[arg(long, default_value = "10")]
        limit: usize,
    },

    /// Biggest earnings-window PnL swings
    Earnings {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
}

fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %format!("{err:#}"), "invocation failed");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let store = match cli.db_path {
        Some(path) => Store::new(path),
        None => Store::from_env(),
    };

    match cli.command {
        Commands::Build { regenerate_raw } => {
            let catalog = match cli.sql_dir {
                Some(dir) => catalog::default_catalog(&dir),
                None => catalog::catalog_from_env(),
            };
            let generator = SyntheticGenerator::default();
            let opts = BuildOptions {
                regenerate_raw,
                ..BuildOptions::default()
            };
            let outcome = build_mart(&store, &catalog, &generator, &opts)?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(match outcome.status {
                RunStatus::Success => ExitCode::SUCCESS,
                RunStatus::Failed => ExitCode::from(1),
            })
        }

        Commands::Generate => {
            use fe_coo_analytics::RawDataGenerator;
            SyntheticGenerator::default().regenerate(&store)?;
            println!("raw tables regenerated at {}", store.base_path().display());
            Ok(ExitCode::SUCCESS)
        }

        Commands::Validate => {
            let report = validate::mart_battery(&store)?;
            for check in &report.checks {
                let mark = if check.passed { "PASS" } else { "FAIL" };
                println!("{mark}  {}  ({})", check.name, check.details);
            }
            println!(
                "verdict: {}",
                if report.passed { "passed" } else { "failed" }
            );
            Ok(if report.passed {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }

        Commands::Runs { limit } => {
            for run in ledger::recent_runs(&store, limit)? {
                println!(
                    "{}  {}  regenerated_raw={}  {:.3}s  [{}]{}",
                    run.run_ts.to_rfc3339(),
                    run.status.as_str(),
                    run.regenerated_raw,
                    run.duration_seconds,
                    run.models_ran,
                    run.error_message
                        .map(|e| format!("  error: {}", e.lines().next().unwrap_or("").to_string()))
                        .unwrap_or_default()
                );
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Pnl { strategy } => {
            for p in metrics::pnl_by_day(&store, strategy.as_deref())? {
                println!("{}  {:<8}  {:>12.2}", p.date, p.strategy, p.pnl);
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Exposures { strategy } => {
            for e in metrics::exposures_over_time(&store, strategy.as_deref())? {
                println!(
                    "{}  {:<8}  gross={:>14.2}  net={:>14.2}",
                    e.date, e.strategy, e.gross_exposure, e.net_exposure
                );
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Liquidity { date, limit } => {
            for r in metrics::most_illiquid(&store, date.as_deref(), limit)? {
                println!(
                    "{}  {:<8}  {}  shares={:>10.0}  adv={:>9}  dtl={:>8.4}{}",
                    r.date,
                    r.strategy,
                    r.ticker,
                    r.shares,
                    r.adv_shares,
                    r.days_to_liquidate,
                    if r.illiquid_flag { "  ILLIQUID" } else { "" }
                );
            }
            Ok(ExitCode::SUCCESS)
        }

        Commands::Earnings { limit } => {
            for w in metrics::biggest_earnings_windows(&store, limit)? {
                println!(
                    "{:<8}  {}  {}  {:>12.2}",
                    w.strategy, w.ticker, w.earnings_date, w.pnl_total_window
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
