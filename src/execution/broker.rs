use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ClosedTrade, OpenPosition, PriceBar, Quote, Side, Timeframe};
use crate::Result;

/// An order to open, with optional absolute TP/SL price levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub volume: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub comment: String,
}

/// Broker acknowledgement for an opened position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTicket {
    pub position_id: String,
}

/// Read-side market access: historical bars and the current quote.
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Bars for `symbol` at `timeframe` since `from`, oldest first.
    async fn historical_bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PriceBar>>;

    async fn latest_quote(&self, symbol: &str) -> Result<Quote>;
}

/// Write-side broker access: open, amend, close, and list positions.
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn open_position(&self, request: &OrderRequest) -> Result<OrderTicket>;

    async fn modify_position(
        &self,
        position_id: &str,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<()>;

    /// Close the position at market and report the realized outcome.
    async fn close_position(&self, position_id: &str) -> Result<ClosedTrade>;

    async fn open_positions(&self, symbol: &str) -> Result<Vec<OpenPosition>>;
}
