use serde::Deserialize;

use crate::indicators::{calculate_bollinger, calculate_ema, calculate_rsi, high_low_extremes};
use crate::models::{PriceBar, Side, TrendState};
use crate::Result;

/// How the trend label is derived from the bar window.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrendRule {
    /// UP if the latest close is above the EMA, DOWN if below, else NEUTRAL.
    PriceVsEma { period: usize },
    /// Strict fast > medium > slow stacking is UP, the strict reversal is
    /// DOWN; any interleaving is a NEUTRAL no-trade zone.
    EmaStack {
        fast: usize,
        medium: usize,
        slow: usize,
    },
}

impl TrendRule {
    fn min_bars(&self) -> usize {
        match self {
            TrendRule::PriceVsEma { period } => *period,
            TrendRule::EmaStack { slow, .. } => *slow,
        }
    }
}

/// Classifier configuration, immutable for the process lifetime.
#[derive(Debug, Clone, Deserialize)]
pub struct ClassifierConfig {
    pub rule: TrendRule,
    /// Require a break of structure before a trend is actionable.
    pub require_bos: bool,
    pub bos_window: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub bollinger_period: usize,
    pub bollinger_std_dev: f64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            rule: TrendRule::PriceVsEma { period: 50 },
            require_bos: false,
            bos_window: 10,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            bollinger_period: 20,
            bollinger_std_dev: 2.0,
        }
    }
}

/// Explicit immutable input to one classification call: the current bar
/// windows plus the latest traded price. The classifier reads nothing else,
/// so the trend label is a pure function of this snapshot.
#[derive(Debug, Clone, Copy)]
pub struct MarketSnapshot<'a> {
    pub bars: &'a [PriceBar],
    /// Higher-timeframe window for multi-timeframe confirmation; when
    /// present, both windows must agree or the trend is NEUTRAL.
    pub confirm_bars: Option<&'a [PriceBar]>,
    pub latest_price: f64,
}

/// Classification output for one cycle. Never cached across calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSignal {
    pub trend: TrendState,
    pub bos: bool,
    /// RSI beyond the overbought threshold, confirmed by the latest close
    /// turning down against it.
    pub overbought: bool,
    /// RSI beyond the oversold threshold, confirmed by the latest close
    /// turning up against it.
    pub oversold: bool,
    /// Close outside the Bollinger bands: below the lower band reads as a
    /// buy region, above the upper as a sell region.
    pub band_breakout: Option<Side>,
}

impl TrendSignal {
    /// The side an entry would take, or None when the signal is not
    /// actionable (neutral trend, or missing BOS confirmation when
    /// required).
    pub fn entry_side(&self, require_bos: bool) -> Option<Side> {
        if require_bos && !self.bos {
            return None;
        }
        self.trend.entry_side()
    }
}

fn closes(bars: &[PriceBar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

fn apply_rule(bars: &[PriceBar], rule: &TrendRule) -> Result<TrendState> {
    let prices = closes(bars);
    let latest = match prices.last() {
        Some(&p) => p,
        None => {
            return Err(crate::BotError::InsufficientData {
                have: 0,
                need: rule.min_bars(),
            })
        }
    };

    match rule {
        TrendRule::PriceVsEma { period } => {
            let ema = calculate_ema(&prices, *period)?;
            Ok(if latest > ema {
                TrendState::Up
            } else if latest < ema {
                TrendState::Down
            } else {
                TrendState::Neutral
            })
        }
        TrendRule::EmaStack { fast, medium, slow } => {
            let ema_fast = calculate_ema(&prices, *fast)?;
            let ema_medium = calculate_ema(&prices, *medium)?;
            let ema_slow = calculate_ema(&prices, *slow)?;

            Ok(if ema_fast > ema_medium && ema_medium > ema_slow {
                TrendState::Up
            } else if ema_fast < ema_medium && ema_medium < ema_slow {
                TrendState::Down
            } else {
                TrendState::Neutral
            })
        }
    }
}

/// Derive a trend signal from an explicit snapshot.
///
/// Pure: no shared state is read or written; calling twice with the same
/// snapshot yields the same signal.
pub fn classify(snapshot: &MarketSnapshot, config: &ClassifierConfig) -> Result<TrendSignal> {
    let mut trend = apply_rule(snapshot.bars, &config.rule)?;

    // Multi-timeframe confirmation: both windows must agree
    if let Some(confirm_bars) = snapshot.confirm_bars {
        let confirm_trend = apply_rule(confirm_bars, &config.rule)?;
        if confirm_trend != trend {
            trend = TrendState::Neutral;
        }
    }

    let extremes = high_low_extremes(snapshot.bars, config.bos_window)?;
    let bos = extremes.is_breakout(snapshot.latest_price);

    let prices = closes(snapshot.bars);
    let rsi = calculate_rsi(&prices, config.rsi_period)?;

    // Overbought/oversold only counts once the latest candle turns against
    // the extreme; an extreme that is still running is not a reversal signal.
    let (last, prev) = (prices[prices.len() - 1], prices[prices.len() - 2]);
    let overbought = rsi >= config.rsi_overbought && last < prev;
    let oversold = rsi <= config.rsi_oversold && last > prev;

    let bands = calculate_bollinger(&prices, config.bollinger_period, config.bollinger_std_dev)?;
    let band_breakout = if bands.is_below_lower(snapshot.latest_price) {
        Some(Side::Buy)
    } else if bands.is_above_upper(snapshot.latest_price) {
        Some(Side::Sell)
    } else {
        None
    };

    tracing::debug!(?trend, bos, rsi, "classified market snapshot");

    Ok(TrendSignal {
        trend,
        bos,
        overbought,
        oversold,
        band_breakout,
    })
}
