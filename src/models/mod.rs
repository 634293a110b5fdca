use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV sample for a fixed timeframe.
///
/// Immutable once recorded; the bar store enforces strictly increasing,
/// duplicate-free timestamps via find-or-insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Latest bid/ask for the traded pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub bid: f64,
    pub ask: f64,
}

impl Quote {
    /// Execution cost added to TP/SL distances when placing orders.
    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Price a market order of the given side would fill at.
    pub fn entry_price(&self, side: Side) -> f64 {
        match side {
            Side::Buy => self.ask,
            Side::Sell => self.bid,
        }
    }
}

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Market trend label, recomputed each cycle from the current bar window.
/// Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendState {
    Up,
    Down,
    Neutral,
}

impl TrendState {
    /// The order side a trend implies, if any.
    pub fn entry_side(&self) -> Option<Side> {
        match self {
            TrendState::Up => Some(Side::Buy),
            TrendState::Down => Some(Side::Sell),
            TrendState::Neutral => None,
        }
    }
}

/// Bar timeframe supported by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
}

impl Timeframe {
    pub fn minutes(&self) -> u32 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M5 => 5,
        }
    }

    pub fn from_minutes(minutes: u32) -> Option<Timeframe> {
        match minutes {
            1 => Some(Timeframe::M1),
            5 => Some(Timeframe::M5),
            _ => None,
        }
    }
}

/// A position held at the execution boundary.
///
/// The core never owns this; it reads it each cycle and issues close/modify
/// instructions back through the boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenPosition {
    pub id: String,
    pub side: Side,
    pub entry_price: f64,
    pub volume: f64,
    pub unrealized_profit: f64,
}

/// Outcome of a closed position as reported by the execution boundary.
/// The realized profit sign is the only authority for win/loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub position_id: String,
    pub side: Side,
    pub volume: f64,
    pub realized_profit: f64,
    pub closed_at: DateTime<Utc>,
}

impl ClosedTrade {
    pub fn is_win(&self) -> bool {
        self.realized_profit >= 0.0
    }
}
