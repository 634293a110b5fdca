//! End-to-end paper-trading cycles: engine, gate, monitor, sizing and the
//! bar store wired together against the scriptable paper broker.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use fxbot::execution::{
    EngineConfig, EntryGate, ExecutionClient, ExitRule, PositionMonitor, TradingEngine,
};
use fxbot::models::{PriceBar, Quote, Side, Timeframe};
use fxbot::sim::PaperBroker;
use fxbot::sizing::{SizingPolicy, SizingState};
use fxbot::store::MemoryBarStore;
use fxbot::strategy::ClassifierConfig;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 6, 0, 0).unwrap()
}

fn rising_bars(n: usize) -> Vec<PriceBar> {
    (0..n)
        .map(|i| {
            let close = 150.0 + i as f64 * 0.05;
            PriceBar {
                timestamp: start() + Duration::minutes(i as i64 * 5),
                open: close - 0.02,
                high: close + 0.03,
                low: close - 0.05,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

fn engine_config() -> EngineConfig {
    EngineConfig {
        symbol: "USDJPY".to_string(),
        timeframe: Timeframe::M5,
        confirm_timeframe: None,
        history_bars: 60,
        classifier: ClassifierConfig::default(),
        take_profit: 0.190,
        stop_loss: 0.090,
        scale_targets: false,
        alternate_direction: false,
    }
}

fn build_engine(
    broker: Arc<PaperBroker>,
    gate: EntryGate,
    rules: Vec<ExitRule>,
    policy: SizingPolicy,
) -> TradingEngine {
    TradingEngine::new(
        engine_config(),
        broker.clone(),
        broker,
        Arc::new(MemoryBarStore::new()),
        gate,
        PositionMonitor::new(rules),
        SizingState::new(policy, 0.01),
    )
}

async fn seeded_broker() -> (Arc<PaperBroker>, f64) {
    let broker = Arc::new(PaperBroker::new());
    let bars = rising_bars(60);
    let last_close = bars.last().unwrap().close;
    broker.push_bars(Timeframe::M5, bars).await;
    broker
        .set_quote(Quote {
            bid: last_close + 0.100,
            ask: last_close + 0.103,
        })
        .await;
    (broker, last_close)
}

#[tokio::test]
async fn trade_lifecycle_with_peak_trailing_exit() {
    let (broker, _) = seeded_broker().await;
    let mut engine = build_engine(
        broker.clone(),
        EntryGate::new(Duration::minutes(15), 1, None),
        vec![ExitRule::PeakTrailing { fraction: 0.5 }],
        SizingPolicy::Martingale { max_volume: 0.16 },
    );

    let now = start() + Duration::minutes(300);
    engine.run_cycle(now).await.unwrap();

    let positions = broker.open_positions("USDJPY").await.unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].side, Side::Buy);
    let entry = positions[0].entry_price;

    // Profit climbs to +0.10 on the bid: new peak, no close
    broker
        .set_quote(Quote {
            bid: entry + 0.100,
            ask: entry + 0.103,
        })
        .await;
    engine.run_cycle(now + Duration::minutes(5)).await.unwrap();
    assert_eq!(broker.open_positions("USDJPY").await.unwrap().len(), 1);

    // Gave back past half the peak: close in profit
    broker
        .set_quote(Quote {
            bid: entry + 0.040,
            ask: entry + 0.043,
        })
        .await;
    engine.run_cycle(now + Duration::minutes(10)).await.unwrap();

    assert!(broker.open_positions("USDJPY").await.unwrap().is_empty());
    let closed = broker.closed_trades().await;
    assert_eq!(closed.len(), 1);
    assert!(closed[0].is_win());
    assert!((closed[0].realized_profit - 40.0).abs() < 1e-6);
    // A winning close resets martingale to base
    assert_eq!(engine.sizing().current_volume(), 0.01);
}

#[tokio::test]
async fn aggregate_target_closes_every_position() {
    let (broker, _) = seeded_broker().await;
    let mut engine = build_engine(
        broker.clone(),
        EntryGate::new(Duration::minutes(5), 2, None),
        vec![ExitRule::AggregateTarget { target: 50.0 }],
        SizingPolicy::Flat,
    );

    let now = start() + Duration::minutes(300);
    engine.run_cycle(now).await.unwrap();
    let first_entry = broker.open_positions("USDJPY").await.unwrap()[0].entry_price;

    // Second entry after cooldown, still below the combined target
    broker
        .set_quote(Quote {
            bid: first_entry + 0.020,
            ask: first_entry + 0.023,
        })
        .await;
    engine.run_cycle(now + Duration::minutes(5)).await.unwrap();
    assert_eq!(broker.open_positions("USDJPY").await.unwrap().len(), 2);

    // Combined unrealized profit crosses the target: everything closes.
    // Running inside the cooldown window keeps a fresh entry from opening
    // in the same cycle.
    broker
        .set_quote(Quote {
            bid: first_entry + 0.050,
            ask: first_entry + 0.053,
        })
        .await;
    engine.run_cycle(now + Duration::minutes(8)).await.unwrap();

    assert!(broker.open_positions("USDJPY").await.unwrap().is_empty());
    assert_eq!(broker.closed_trades().await.len(), 2);
}

#[tokio::test]
async fn broker_side_stop_does_not_feed_sizing() {
    let (broker, _) = seeded_broker().await;
    let mut engine = build_engine(
        broker.clone(),
        EntryGate::new(Duration::minutes(5), 1, None),
        vec![],
        SizingPolicy::Martingale { max_volume: 0.16 },
    );

    let now = start() + Duration::minutes(300);
    engine.run_cycle(now).await.unwrap();
    let entry = broker.open_positions("USDJPY").await.unwrap()[0].entry_price;

    // Quote crashes through the stop: the broker closes it on its own
    broker
        .set_quote(Quote {
            bid: entry - 0.200,
            ask: entry - 0.197,
        })
        .await;
    assert!(broker.open_positions("USDJPY").await.unwrap().is_empty());
    let closed = broker.closed_trades().await;
    assert_eq!(closed.len(), 1);
    assert!(!closed[0].is_win());

    // The engine never saw an explicit close, so the stake is untouched
    engine.run_cycle(now + Duration::minutes(5)).await.unwrap();
    assert_eq!(engine.sizing().current_volume(), 0.01);
}

#[tokio::test]
async fn neutral_market_never_enters() {
    let broker = Arc::new(PaperBroker::new());
    // Flat closes: price sits exactly on its EMA, trend is neutral
    let bars: Vec<PriceBar> = (0..60)
        .map(|i| PriceBar {
            timestamp: start() + Duration::minutes(i * 5),
            open: 150.0,
            high: 150.03,
            low: 149.97,
            close: 150.0,
            volume: 1000.0,
        })
        .collect();
    broker.push_bars(Timeframe::M5, bars).await;
    broker
        .set_quote(Quote {
            bid: 149.9985,
            ask: 150.0015,
        })
        .await;

    let mut engine = build_engine(
        broker.clone(),
        EntryGate::new(Duration::minutes(5), 2, None),
        vec![],
        SizingPolicy::Flat,
    );
    engine.run_cycle(start() + Duration::minutes(300)).await.unwrap();
    assert!(broker.open_positions("USDJPY").await.unwrap().is_empty());
}
