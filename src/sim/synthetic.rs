use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{PriceBar, Timeframe};

/// Shape of a generated price path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Scenario {
    Uptrend,
    Downtrend,
    Sideways,
    Volatile,
}

impl Scenario {
    /// Per-bar drift and noise amplitude, in price units.
    fn parameters(&self) -> (f64, f64) {
        match self {
            Scenario::Uptrend => (0.015, 0.02),
            Scenario::Downtrend => (-0.015, 0.02),
            Scenario::Sideways => (0.0, 0.02),
            Scenario::Volatile => (0.0, 0.12),
        }
    }
}

/// Generate a deterministic bar series: same seed, same bars.
pub fn generate_bars(
    scenario: Scenario,
    count: usize,
    start_price: f64,
    start_time: DateTime<Utc>,
    timeframe: Timeframe,
    seed: u64,
) -> Vec<PriceBar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let (drift, noise) = scenario.parameters();
    let step = Duration::minutes(timeframe.minutes() as i64);

    let mut close = start_price;
    let mut bars = Vec::with_capacity(count);
    for i in 0..count {
        let open = close;
        close = open + drift + rng.gen_range(-noise..noise);
        let wiggle = rng.gen_range(0.0..noise / 2.0);
        let high = open.max(close) + wiggle;
        let low = open.min(close) - wiggle;

        bars.push(PriceBar {
            timestamp: start_time + step * i as i32,
            open,
            high,
            low,
            close,
            volume: rng.gen_range(500.0..5000.0),
        });
    }
    bars
}
