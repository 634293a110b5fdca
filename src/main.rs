use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{Duration, Utc};
use clap::Parser;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fxbot::execution::TradingEngine;
use fxbot::models::{PriceBar, Quote};
use fxbot::scheduler;
use fxbot::sim::{generate_bars, PaperBroker, Scenario};
use fxbot::store::MemoryBarStore;
use fxbot::BotConfig;

/// Paper-trading run against a synthetic market feed.
#[derive(Parser, Debug)]
#[command(name = "fxbot", about = "FX trend-following trading bot")]
struct Cli {
    /// Configuration file (TOML, optional)
    #[arg(long, default_value = "Fxbot")]
    config: String,

    /// RNG seed for the synthetic feed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Synthetic market scenario
    #[arg(long, value_enum, default_value_t = Scenario::Sideways)]
    scenario: Scenario,

    /// Synthetic starting price
    #[arg(long, default_value_t = 150.0)]
    start_price: f64,
}

const PAPER_SPREAD: f64 = 0.003;
const FEED_HORIZON_BARS: usize = 5_000;

fn quote_from(bar: &PriceBar) -> Quote {
    Quote {
        bid: bar.close - PAPER_SPREAD / 2.0,
        ask: bar.close + PAPER_SPREAD / 2.0,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fxbot=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = BotConfig::load(&cli.config)?;

    info!("🚀 starting fxbot");
    info!(symbol = %config.symbol, timeframe_min = config.timeframe_minutes, "configuration loaded");
    info!(scenario = ?cli.scenario, seed = cli.seed, "paper mode: synthetic feed");

    let timeframe = config.timeframe()?;
    let history = config.history_bars;

    // Pre-generate the whole feed; history is seeded up front and the rest
    // drips in one bar per cycle.
    let span = Duration::minutes(timeframe.minutes() as i64 * history as i64);
    let mut feed: VecDeque<PriceBar> = generate_bars(
        cli.scenario,
        history + FEED_HORIZON_BARS,
        cli.start_price,
        Utc::now() - span,
        timeframe,
        cli.seed,
    )
    .into();

    let broker = Arc::new(PaperBroker::new());
    let seed_bars: Vec<PriceBar> = feed.drain(..history).collect();
    let last_seed = seed_bars
        .last()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("empty synthetic feed"))?;
    broker.push_bars(timeframe, seed_bars).await;
    broker.set_quote(quote_from(&last_seed)).await;

    let engine = TradingEngine::new(
        config.engine_config()?,
        broker.clone(),
        broker.clone(),
        Arc::new(MemoryBarStore::new()),
        config.entry_gate(),
        config.monitor(),
        config.sizing_state(),
    );
    let engine = Arc::new(Mutex::new(engine));
    let feed = Arc::new(Mutex::new(feed));

    let cadence = config.cadence;
    info!(?cadence, "entering trading loop");

    let loop_broker = broker.clone();
    let trading_loop = scheduler::run(cadence, move |now| {
        let engine = engine.clone();
        let broker = loop_broker.clone();
        let feed = feed.clone();
        async move {
            if let Some(bar) = feed.lock().await.pop_front() {
                let quote = quote_from(&bar);
                broker.push_bars(timeframe, vec![bar]).await;
                broker.set_quote(quote).await;
            }
            engine.lock().await.run_cycle(now).await
        }
    });

    tokio::select! {
        _ = trading_loop => {}
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 shutdown signal received");
        }
    }

    let closed = broker.closed_trades().await;
    let total: f64 = closed.iter().map(|t| t.realized_profit).sum();
    let wins = closed.iter().filter(|t| t.is_win()).count();
    info!(
        trades = closed.len(),
        wins,
        total_profit = format!("{total:.2}"),
        "session summary"
    );

    Ok(())
}
