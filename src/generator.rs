//! Synthetic raw-data generator.
//!
//! Upstream collaborator of the pipeline: rewrites every `raw.*` table the
//! SQL models depend on (trades, prices, security_master, liquidity,
//! earnings_calendar). Injected into the orchestrator behind the
//! [`RawDataGenerator`] trait so tests can substitute failing or no-op
//! sources. Fully deterministic for a given seed.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate, Weekday};
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use statrs::distribution::Normal;
use tracing::info;

use crate::store::{Access, Store};

/// Contract: writes/overwrites all `raw.*` tables used downstream.
pub trait RawDataGenerator {
    fn regenerate(&self, store: &Store) -> Result<()>;
}

const SECTORS: [&str; 10] = [
    "Technology",
    "Healthcare",
    "Financials",
    "Consumer",
    "Industrials",
    "Energy",
    "Materials",
    "Utilities",
    "Real Estate",
    "Communications",
];

const COUNTRIES: [&str; 6] = ["US", "UK", "DE", "FR", "JP", "CA"];
const COUNTRY_WEIGHTS: [f64; 6] = [0.72, 0.06, 0.06, 0.06, 0.06, 0.04];

#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub seed: u64,
    pub n_tickers: usize,
    /// Business days simulated from `start_date`. Must exceed 6 so that an
    /// earnings date can land strictly inside the range.
    pub n_days: usize,
    pub start_date: NaiveDate,
    pub strategies: Vec<String>,
    pub n_trades: usize,
    pub max_shares_per_trade: i64,
    pub adv_min: i64,
    pub adv_max: i64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            n_tickers: 40,
            n_days: 90,
            start_date: NaiveDate::from_ymd_opt(2025, 10, 1).expect("valid date"),
            strategies: vec!["CORE".into(), "TMT".into(), "HEALTH".into()],
            n_trades: 2500,
            max_shares_per_trade: 800,
            adv_min: 200_000,
            adv_max: 5_000_000,
        }
    }
}

/// Default generator implementation: seeded random walks for prices, trades
/// anchored near the day's close, one earnings date per ticker inside the
/// simulated range.
#[derive(Debug, Clone, Default)]
pub struct SyntheticGenerator {
    pub cfg: GeneratorConfig,
}

impl SyntheticGenerator {
    pub fn new(cfg: GeneratorConfig) -> Self {
        Self { cfg }
    }
}

struct TradeRow {
    trade_id: i64,
    timestamp: String,
    trade_date: String,
    strategy: String,
    ticker: String,
    side: &'static str,
    quantity: i64,
    price: f64,
}

impl RawDataGenerator for SyntheticGenerator {
    fn regenerate(&self, store: &Store) -> Result<()> {
        let cfg = &self.cfg;
        anyhow::ensure!(cfg.n_tickers > 0, "n_tickers must be positive");
        anyhow::ensure!(cfg.n_days > 6, "n_days must exceed 6");
        anyhow::ensure!(!cfg.strategies.is_empty(), "at least one strategy required");
        anyhow::ensure!(
            cfg.adv_min < cfg.adv_max,
            "adv_min must be below adv_max"
        );

        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);

        let tickers = make_tickers(cfg.n_tickers, &mut rng);
        let days = business_days(cfg.start_date, cfg.n_days);
        let closes = simulate_prices(&tickers, &days, &mut rng)?;
        let (sectors, countries) = classify(&tickers, &mut rng)?;
        let advs: Vec<i64> = (0..tickers.len())
            .map(|_| rng.gen_range(cfg.adv_min..cfg.adv_max))
            .collect();
        let earnings = earnings_dates(&days, tickers.len(), &mut rng);
        let trades = generate_trades(cfg, &tickers, &days, &closes, &mut rng)?;

        let mut conn = store.open(Access::ReadWrite)?;
        let tx = conn.transaction().context("begin raw refresh")?;

        tx.execute_batch(
            "DROP TABLE IF EXISTS raw.prices;
             CREATE TABLE raw.prices (date TEXT NOT NULL, ticker TEXT NOT NULL, close REAL NOT NULL);
             DROP TABLE IF EXISTS raw.security_master;
             CREATE TABLE raw.security_master (ticker TEXT NOT NULL, sector TEXT NOT NULL, country TEXT NOT NULL, currency TEXT NOT NULL);
             DROP TABLE IF EXISTS raw.liquidity;
             CREATE TABLE raw.liquidity (ticker TEXT NOT NULL, adv_shares INTEGER NOT NULL);
             DROP TABLE IF EXISTS raw.earnings_calendar;
             CREATE TABLE raw.earnings_calendar (ticker TEXT NOT NULL, earnings_date TEXT NOT NULL);
             DROP TABLE IF EXISTS raw.trades;
             CREATE TABLE raw.trades (
                 trade_id INTEGER NOT NULL,
                 timestamp TEXT NOT NULL,
                 trade_date TEXT NOT NULL,
                 strategy TEXT NOT NULL,
                 ticker TEXT NOT NULL,
                 side TEXT NOT NULL,
                 quantity INTEGER NOT NULL,
                 price REAL NOT NULL
             );",
        )?;

        {
            let mut stmt =
                tx.prepare("INSERT INTO raw.prices (date, ticker, close) VALUES (?1, ?2, ?3)")?;
            for (ti, ticker) in tickers.iter().enumerate() {
                for (di, day) in days.iter().enumerate() {
                    stmt.execute(rusqlite::params![
                        day.to_string(),
                        ticker,
                        closes[ti][di]
                    ])?;
                }
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO raw.security_master (ticker, sector, country, currency) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (i, ticker) in tickers.iter().enumerate() {
                stmt.execute(rusqlite::params![
                    ticker,
                    sectors[i],
                    countries[i],
                    currency_for(countries[i])
                ])?;
            }
        }

        {
            let mut stmt =
                tx.prepare("INSERT INTO raw.liquidity (ticker, adv_shares) VALUES (?1, ?2)")?;
            for (i, ticker) in tickers.iter().enumerate() {
                stmt.execute(rusqlite::params![ticker, advs[i]])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO raw.earnings_calendar (ticker, earnings_date) VALUES (?1, ?2)",
            )?;
            for (i, ticker) in tickers.iter().enumerate() {
                stmt.execute(rusqlite::params![ticker, earnings[i].to_string()])?;
            }
        }

        {
            let mut stmt = tx.prepare(
                "INSERT INTO raw.trades
                 (trade_id, timestamp, trade_date, strategy, ticker, side, quantity, price)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for t in &trades {
                stmt.execute(rusqlite::params![
                    t.trade_id,
                    t.timestamp,
                    t.trade_date,
                    t.strategy,
                    t.ticker,
                    t.side,
                    t.quantity,
                    t.price
                ])?;
            }
        }

        tx.commit().context("commit raw refresh")?;

        info!(
            tickers = tickers.len(),
            days = days.len(),
            trades = trades.len(),
            "raw tables regenerated"
        );
        Ok(())
    }
}

fn make_tickers(n: usize, rng: &mut ChaCha8Rng) -> Vec<String> {
    let mut tickers = BTreeSet::new();
    while tickers.len() < n {
        let t: String = (0..3)
            .map(|_| (b'A' + rng.gen_range(0..26u8)) as char)
            .collect();
        tickers.insert(t);
    }
    tickers.into_iter().collect()
}

fn business_days(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut days = Vec::with_capacity(n);
    let mut day = start;
    while days.len() < n {
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            days.push(day);
        }
        day = day.succ_opt().expect("date overflow");
    }
    days
}

/// Geometric random walk per ticker, two-decimal closes.
fn simulate_prices(
    tickers: &[String],
    days: &[NaiveDate],
    rng: &mut ChaCha8Rng,
) -> Result<Vec<Vec<f64>>> {
    let mut closes = Vec::with_capacity(tickers.len());
    for _ in tickers {
        let p0: f64 = rng.gen_range(20.0..250.0);
        let vol: f64 = rng.gen_range(0.008..0.03);
        let returns = Normal::new(0.0002, vol).context("price return distribution")?;
        let mut level = p0;
        let mut path = Vec::with_capacity(days.len());
        for _ in days {
            level *= returns.sample(rng).exp();
            path.push(round2(level));
        }
        closes.push(path);
    }
    Ok(closes)
}

fn classify(
    tickers: &[String],
    rng: &mut ChaCha8Rng,
) -> Result<(Vec<&'static str>, Vec<&'static str>)> {
    let country_dist = WeightedIndex::new(COUNTRY_WEIGHTS).context("country weights")?;
    let mut sectors = Vec::with_capacity(tickers.len());
    let mut countries = Vec::with_capacity(tickers.len());
    for _ in tickers {
        sectors.push(SECTORS[rng.gen_range(0..SECTORS.len())]);
        countries.push(COUNTRIES[country_dist.sample(rng)]);
    }
    Ok((sectors, countries))
}

fn currency_for(country: &str) -> &'static str {
    match country {
        "US" => "USD",
        "DE" | "FR" => "EUR",
        "UK" => "GBP",
        "JP" => "JPY",
        _ => "CAD",
    }
}

/// One earnings date per ticker, strictly inside the simulated range so the
/// +/- 2 day window always overlaps priced days.
fn earnings_dates(days: &[NaiveDate], n_tickers: usize, rng: &mut ChaCha8Rng) -> Vec<NaiveDate> {
    let idx_min = 5.max((days.len() as f64 * 0.15) as usize);
    let idx_max = (idx_min + 1).max((days.len() as f64 * 0.85) as usize);
    (0..n_tickers)
        .map(|_| days[rng.gen_range(idx_min..idx_max.min(days.len()))])
        .collect()
}

fn generate_trades(
    cfg: &GeneratorConfig,
    tickers: &[String],
    days: &[NaiveDate],
    closes: &[Vec<f64>],
    rng: &mut ChaCha8Rng,
) -> Result<Vec<TradeRow>> {
    let noise = Normal::new(0.0, 0.0025).context("trade price noise")?;
    let mut trades = Vec::with_capacity(cfg.n_trades);

    for trade_id in 1..=cfg.n_trades as i64 {
        let di = rng.gen_range(0..days.len());
        let ti = rng.gen_range(0..tickers.len());
        let strategy = cfg.strategies[rng.gen_range(0..cfg.strategies.len())].clone();
        let side = if rng.gen_bool(0.52) { "BUY" } else { "SELL" };
        let quantity = rng.gen_range(10..cfg.max_shares_per_trade);

        // Market-ish hours: 09:35 to 15:54.
        let minute_of_day = rng.gen_range(9 * 60 + 35..15 * 60 + 55);
        let day = days[di];
        let timestamp = format!(
            "{}T{:02}:{:02}:00Z",
            day,
            minute_of_day / 60,
            minute_of_day % 60
        );

        let price = round2(closes[ti][di] * (1.0 + noise.sample(rng)));

        trades.push(TradeRow {
            trade_id,
            timestamp,
            trade_date: day.to_string(),
            strategy,
            ticker: tickers[ti].clone(),
            side,
            quantity,
            price,
        });
    }

    // A few oversized tickets so liquidity spikes look realistic.
    let n_big = (cfg.n_trades / 300).max(8).min(trades.len());
    for idx in rand::seq::index::sample(rng, trades.len(), n_big) {
        trades[idx].quantity *= 6;
    }

    Ok(trades)
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
