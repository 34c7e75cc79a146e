//! Read-only mart queries for dashboard/CLI consumers.
//!
//! Thin presentation-layer read paths over `mart.*`; never mutate state.
//! Each function opens its own read-only connection. Reads may observe a
//! mart mid-rebuild (no read-isolation guarantee).

use rusqlite::params;
use serde::Serialize;

use crate::error::PipelineError;
use crate::store::{Access, Store};

#[derive(Debug, Clone, Serialize)]
pub struct PnlPoint {
    pub date: String,
    pub strategy: String,
    pub pnl: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PnlMover {
    pub date: String,
    pub strategy: String,
    pub ticker: String,
    pub pnl: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExposurePoint {
    pub date: String,
    pub strategy: String,
    pub gross_exposure: f64,
    pub net_exposure: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LiquidityRow {
    pub date: String,
    pub strategy: String,
    pub ticker: String,
    pub shares: f64,
    pub adv_shares: i64,
    pub days_to_liquidate: f64,
    pub illiquid_flag: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarningsWindowRow {
    pub strategy: String,
    pub ticker: String,
    pub earnings_date: String,
    pub pnl_total_window: f64,
}

/// PnL summed per (date, strategy), optionally filtered to one strategy.
pub fn pnl_by_day(store: &Store, strategy: Option<&str>) -> Result<Vec<PnlPoint>, PipelineError> {
    let conn = store.open(Access::ReadOnly)?;
    let map = |row: &rusqlite::Row| {
        Ok(PnlPoint {
            date: row.get(0)?,
            strategy: row.get(1)?,
            pnl: row.get(2)?,
        })
    };
    let points = if let Some(strategy) = strategy {
        let mut stmt = conn.prepare(
            "SELECT date, strategy, SUM(pnl) AS pnl
             FROM mart.daily_pnl
             WHERE strategy = ?1
             GROUP BY date, strategy
             ORDER BY date, strategy",
        )?;
        let points: Vec<PnlPoint> = stmt.query_map([strategy], map)?.collect::<Result<_, _>>()?;
        points
    } else {
        let mut stmt = conn.prepare(
            "SELECT date, strategy, SUM(pnl) AS pnl
             FROM mart.daily_pnl
             GROUP BY date, strategy
             ORDER BY date, strategy",
        )?;
        let points: Vec<PnlPoint> = stmt.query_map([], map)?.collect::<Result<_, _>>()?;
        points
    };
    Ok(points)
}

/// Largest absolute single-name daily PnL rows.
pub fn top_pnl_movers(store: &Store, n: usize) -> Result<Vec<PnlMover>, PipelineError> {
    let conn = store.open(Access::ReadOnly)?;
    let mut stmt = conn.prepare(
        "SELECT date, strategy, ticker, pnl
         FROM mart.daily_pnl
         ORDER BY ABS(pnl) DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([n], |row| {
            Ok(PnlMover {
                date: row.get(0)?,
                strategy: row.get(1)?,
                ticker: row.get(2)?,
                pnl: row.get(3)?,
            })
        })?
        .collect::<Result<_, _>>()?;
    Ok(rows)
}

/// Gross/net exposure series, optionally filtered to one strategy.
pub fn exposures_over_time(
    store: &Store,
    strategy: Option<&str>,
) -> Result<Vec<ExposurePoint>, PipelineError> {
    let conn = store.open(Access::ReadOnly)?;
    let map = |row: &rusqlite::Row| {
        Ok(ExposurePoint {
            date: row.get(0)?,
            strategy: row.get(1)?,
            gross_exposure: row.get(2)?,
            net_exposure: row.get(3)?,
        })
    };
    let points = if let Some(strategy) = strategy {
        let mut stmt = conn.prepare(
            "SELECT date, strategy, gross_exposure, net_exposure
             FROM mart.daily_exposures
             WHERE strategy = ?1
             ORDER BY date, strategy",
        )?;
        let points: Vec<ExposurePoint> =
            stmt.query_map([strategy], map)?.collect::<Result<_, _>>()?;
        points
    } else {
        let mut stmt = conn.prepare(
            "SELECT date, strategy, gross_exposure, net_exposure
             FROM mart.daily_exposures
             ORDER BY date, strategy",
        )?;
        let points: Vec<ExposurePoint> = stmt.query_map([], map)?.collect::<Result<_, _>>()?;
        points
    };
    Ok(points)
}

/// Hardest-to-unwind positions, optionally restricted to one date.
pub fn most_illiquid(
    store: &Store,
    date: Option<&str>,
    n: usize,
) -> Result<Vec<LiquidityRow>, PipelineError> {
    let conn = store.open(Access::ReadOnly)?;
    let map = |row: &rusqlite::Row| {
        Ok(LiquidityRow {
            date: row.get(0)?,
            strategy: row.get(1)?,
            ticker: row.get(2)?,
            shares: row.get(3)?,
            adv_shares: row.get(4)?,
            days_to_liquidate: row.get(5)?,
            illiquid_flag: row.get::<_, i64>(6)? != 0,
        })
    };
    let rows = if let Some(date) = date {
        let mut stmt = conn.prepare(
            "SELECT date, strategy, ticker, shares, adv_shares, days_to_liquidate, illiquid_flag
             FROM mart.daily_liquidity
             WHERE date = ?1
             ORDER BY days_to_liquidate DESC
             LIMIT ?2",
        )?;
        let rows: Vec<LiquidityRow> = stmt
            .query_map(params![date, n], map)?
            .collect::<Result<_, _>>()?;
        rows
    } else {
        let mut stmt = conn.prepare(
            "SELECT date, strategy, ticker, shares, adv_shares, days_to_liquidate, illiquid_flag
             FROM mart.daily_liquidity
             ORDER BY days_to_liquidate DESC
             LIMIT ?1",
        )?;
        let rows: Vec<LiquidityRow> = stmt.query_map([n], map)?.collect::<Result<_, _>>()?;
        rows
    };
    Ok(rows)
}

/// Largest absolute earnings-window PnL swings.
pub fn biggest_earnings_windows(
    store: &Store,
    n: usize,
) -> Result<Vec<EarningsWindowRow>, PipelineError> {
    let conn = store.open(Access::ReadOnly)?;
    let mut stmt = conn.prepare(
        "SELECT strategy, ticker, earnings_date, pnl_total_window
         FROM mart.earnings_window_pnl
         ORDER BY ABS(pnl_total_window) DESC
         LIMIT ?1",
    )?;
    let rows = stmt
        .query_map([n], |row| {
            Ok(EarningsWindowRow {
                strategy: row.get(0)?,
                ticker: row.get(1)?,
                earnings_date: row.get(2)?,
                pnl_total_window: row.get(3)?,
            })
        })?
        .collect::<Result<_, _>>()?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog;
    use crate::generator::{tests::test_config, RawDataGenerator, SyntheticGenerator};
    use crate::orchestrator::{build_mart, BuildOptions};
    use std::path::Path;

    fn built_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Store::new(dir.path().join("fe_coo.db"));
        let catalog = catalog::default_catalog(&Path::new(env!("CARGO_MANIFEST_DIR")).join("sql"));
        let generator = SyntheticGenerator::new(test_config());
        generator.regenerate(&store).expect("raw data");
        let outcome =
            build_mart(&store, &catalog, &generator, &BuildOptions::default()).expect("build");
        assert!(outcome.error.is_none(), "{:?}", outcome.error);
        (dir, store)
    }

    #[test]
    fn pnl_by_day_is_ordered_and_filterable() {
        let (_dir, store) = built_store();
        let all = pnl_by_day(&store, None).unwrap();
        assert!(!all.is_empty());
        let mut sorted = all.clone();
        sorted.sort_by(|a, b| (&a.date, &a.strategy).cmp(&(&b.date, &b.strategy)));
        assert_eq!(
            all.iter().map(|p| (&p.date, &p.strategy)).collect::<Vec<_>>(),
            sorted.iter().map(|p| (&p.date, &p.strategy)).collect::<Vec<_>>()
        );

        let core = pnl_by_day(&store, Some("CORE")).unwrap();
        assert!(!core.is_empty());
        assert!(core.iter().all(|p| p.strategy == "CORE"));
    }

    #[test]
    fn exposures_have_non_negative_gross() {
        let (_dir, store) = built_store();
        let points = exposures_over_time(&store, None).unwrap();
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| p.gross_exposure >= 0.0));
        assert!(points
            .iter()
            .all(|p| p.net_exposure.abs() <= p.gross_exposure + 1e-9));

        let core = exposures_over_time(&store, Some("CORE")).unwrap();
        assert!(!core.is_empty());
        assert!(core.iter().all(|p| p.strategy == "CORE"));
    }

    #[test]
    fn most_illiquid_returns_requested_rows_without_gaps() {
        let (_dir, store) = built_store();
        let rows = most_illiquid(&store, None, 5).unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.windows(2).all(|w| w[0].days_to_liquidate >= w[1].days_to_liquidate));
        assert!(rows.iter().all(|r| r.days_to_liquidate.is_finite()));

        let date = rows[0].date.clone();
        let on_date = most_illiquid(&store, Some(&date), 3).unwrap();
        assert_eq!(on_date.len(), 3);
        assert!(on_date.iter().all(|r| r.date == date));
    }

    #[test]
    fn earnings_windows_and_movers_are_limited() {
        let (_dir, store) = built_store();
        let windows = biggest_earnings_windows(&store, 10).unwrap();
        assert!(!windows.is_empty());
        assert!(windows.len() <= 10);

        let movers = top_pnl_movers(&store, 3).unwrap();
        assert_eq!(movers.len(), 3);
        assert!(movers.windows(2).all(|w| w[0].pnl.abs() >= w[1].pnl.abs()));
    }
}
