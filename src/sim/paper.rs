use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::execution::{ExecutionClient, MarketData, OrderRequest, OrderTicket};
use crate::models::{ClosedTrade, OpenPosition, PriceBar, Quote, Side, Timeframe};
use crate::{BotError, Result};

/// Units of base currency per 1.0 lot, standard FX contract sizing.
const CONTRACT_SIZE: f64 = 100_000.0;

struct PaperPosition {
    position: OpenPosition,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
}

#[derive(Default)]
struct PaperState {
    bars: HashMap<Timeframe, Vec<PriceBar>>,
    quote: Option<Quote>,
    positions: Vec<PaperPosition>,
    closed: Vec<ClosedTrade>,
}

/// An in-process broker that fills orders at the current quote and
/// mark-to-markets open positions on every quote update.
///
/// TP/SL levels attached to an order are honored broker-side: a quote
/// crossing a level closes the position at that level, the way a real
/// platform would between two polling cycles.
#[derive(Default)]
pub struct PaperBroker {
    state: Mutex<PaperState>,
}

impl PaperBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append bars for a timeframe.
    pub async fn push_bars(&self, timeframe: Timeframe, bars: Vec<PriceBar>) {
        let mut state = self.state.lock().await;
        state.bars.entry(timeframe).or_default().extend(bars);
    }

    /// Move the market: updates the quote, re-marks every open position and
    /// closes the ones whose TP/SL the new quote crossed.
    pub async fn set_quote(&self, quote: Quote) {
        let mut state = self.state.lock().await;
        state.quote = Some(quote);

        let mut still_open = Vec::new();
        let mut closed = Vec::new();
        for mut paper in state.positions.drain(..) {
            let mark = close_price(paper.position.side, &quote);
            paper.position.unrealized_profit =
                signed_delta(paper.position.side, paper.position.entry_price, mark)
                    * paper.position.volume
                    * CONTRACT_SIZE;

            if let Some(level) = triggered_level(&paper, &quote) {
                let realized = signed_delta(paper.position.side, paper.position.entry_price, level)
                    * paper.position.volume
                    * CONTRACT_SIZE;
                tracing::debug!(
                    position_id = %paper.position.id,
                    level,
                    realized,
                    "paper position closed at protective level"
                );
                closed.push(ClosedTrade {
                    position_id: paper.position.id,
                    side: paper.position.side,
                    volume: paper.position.volume,
                    realized_profit: realized,
                    closed_at: Utc::now(),
                });
            } else {
                still_open.push(paper);
            }
        }
        state.positions = still_open;
        state.closed.extend(closed);
    }

    /// Trades closed so far, both protective-level and explicit closes.
    pub async fn closed_trades(&self) -> Vec<ClosedTrade> {
        self.state.lock().await.closed.clone()
    }
}

fn close_price(side: Side, quote: &Quote) -> f64 {
    match side {
        Side::Buy => quote.bid,
        Side::Sell => quote.ask,
    }
}

fn signed_delta(side: Side, entry: f64, exit: f64) -> f64 {
    match side {
        Side::Buy => exit - entry,
        Side::Sell => entry - exit,
    }
}

fn triggered_level(paper: &PaperPosition, quote: &Quote) -> Option<f64> {
    let mark = close_price(paper.position.side, quote);
    match paper.position.side {
        Side::Buy => {
            if paper.take_profit.is_some_and(|tp| mark >= tp) {
                paper.take_profit
            } else if paper.stop_loss.is_some_and(|sl| mark <= sl) {
                paper.stop_loss
            } else {
                None
            }
        }
        Side::Sell => {
            if paper.take_profit.is_some_and(|tp| mark <= tp) {
                paper.take_profit
            } else if paper.stop_loss.is_some_and(|sl| mark >= sl) {
                paper.stop_loss
            } else {
                None
            }
        }
    }
}

#[async_trait]
impl MarketData for PaperBroker {
    async fn historical_bars(
        &self,
        _symbol: &str,
        timeframe: Timeframe,
        from: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PriceBar>> {
        let state = self.state.lock().await;
        let bars = state.bars.get(&timeframe).cloned().unwrap_or_default();
        let mut window: Vec<PriceBar> = bars.into_iter().filter(|b| b.timestamp >= from).collect();
        if window.len() > limit {
            window = window.split_off(window.len() - limit);
        }
        Ok(window)
    }

    async fn latest_quote(&self, _symbol: &str) -> Result<Quote> {
        self.state
            .lock()
            .await
            .quote
            .ok_or_else(|| BotError::Connectivity("no quote available".to_string()))
    }
}

#[async_trait]
impl ExecutionClient for PaperBroker {
    async fn open_position(&self, request: &OrderRequest) -> Result<OrderTicket> {
        let mut state = self.state.lock().await;
        let quote = state
            .quote
            .ok_or_else(|| BotError::Connectivity("no quote available".to_string()))?;

        if request.volume <= 0.0 {
            return Err(BotError::InvalidOrderResponse(format!(
                "volume {} is not positive",
                request.volume
            )));
        }

        let entry_price = quote.entry_price(request.side);
        let mark = close_price(request.side, &quote);
        let id = Uuid::new_v4().to_string();

        state.positions.push(PaperPosition {
            position: OpenPosition {
                id: id.clone(),
                side: request.side,
                entry_price,
                volume: request.volume,
                unrealized_profit: signed_delta(request.side, entry_price, mark)
                    * request.volume
                    * CONTRACT_SIZE,
            },
            stop_loss: request.stop_loss,
            take_profit: request.take_profit,
        });

        Ok(OrderTicket { position_id: id })
    }

    async fn modify_position(
        &self,
        position_id: &str,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let paper = state
            .positions
            .iter_mut()
            .find(|p| p.position.id == position_id)
            .ok_or_else(|| {
                BotError::InvalidOrderResponse(format!("unknown position {position_id}"))
            })?;
        paper.stop_loss = stop_loss;
        paper.take_profit = take_profit;
        Ok(())
    }

    async fn close_position(&self, position_id: &str) -> Result<ClosedTrade> {
        let mut state = self.state.lock().await;
        let index = state
            .positions
            .iter()
            .position(|p| p.position.id == position_id)
            .ok_or_else(|| {
                BotError::InvalidOrderResponse(format!("unknown position {position_id}"))
            })?;

        let paper = state.positions.remove(index);
        let trade = ClosedTrade {
            position_id: paper.position.id,
            side: paper.position.side,
            volume: paper.position.volume,
            realized_profit: paper.position.unrealized_profit,
            closed_at: Utc::now(),
        };
        state.closed.push(trade.clone());
        Ok(trade)
    }

    async fn open_positions(&self, _symbol: &str) -> Result<Vec<OpenPosition>> {
        let state = self.state.lock().await;
        Ok(state.positions.iter().map(|p| p.position.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(bid: f64, ask: f64) -> Quote {
        Quote { bid, ask }
    }

    fn order(side: Side) -> OrderRequest {
        OrderRequest {
            symbol: "USDJPY".to_string(),
            side,
            volume: 0.01,
            stop_loss: None,
            take_profit: None,
            comment: String::new(),
        }
    }

    #[tokio::test]
    async fn test_no_quote_is_a_connectivity_error() {
        let broker = PaperBroker::new();
        assert!(matches!(
            broker.latest_quote("USDJPY").await,
            Err(BotError::Connectivity(_))
        ));
        assert!(matches!(
            broker.open_position(&order(Side::Buy)).await,
            Err(BotError::Connectivity(_))
        ));
    }

    #[tokio::test]
    async fn test_buy_fills_at_ask_and_marks_on_bid() {
        let broker = PaperBroker::new();
        broker.set_quote(quote(150.000, 150.003)).await;
        broker.open_position(&order(Side::Buy)).await.unwrap();

        let positions = broker.open_positions("USDJPY").await.unwrap();
        assert_eq!(positions[0].entry_price, 150.003);
        // Entry cost is the spread
        assert!((positions[0].unrealized_profit - (-3.0)).abs() < 1e-9);

        broker.set_quote(quote(150.103, 150.106)).await;
        let positions = broker.open_positions("USDJPY").await.unwrap();
        assert!((positions[0].unrealized_profit - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_sell_fills_at_bid_and_marks_on_ask() {
        let broker = PaperBroker::new();
        broker.set_quote(quote(150.000, 150.003)).await;
        broker.open_position(&order(Side::Sell)).await.unwrap();

        broker.set_quote(quote(149.897, 149.900)).await;
        let positions = broker.open_positions("USDJPY").await.unwrap();
        assert!((positions[0].unrealized_profit - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_take_profit_closes_broker_side() {
        let broker = PaperBroker::new();
        broker.set_quote(quote(150.000, 150.003)).await;
        let mut request = order(Side::Buy);
        request.take_profit = Some(150.196);
        broker.open_position(&request).await.unwrap();

        broker.set_quote(quote(150.250, 150.253)).await;
        assert!(broker.open_positions("USDJPY").await.unwrap().is_empty());

        let closed = broker.closed_trades().await;
        assert_eq!(closed.len(), 1);
        // Filled at the level, not at the overshot quote
        assert!((closed[0].realized_profit - (150.196 - 150.003) * 1000.0).abs() < 1e-6);
        assert!(closed[0].is_win());
    }

    #[tokio::test]
    async fn test_stop_loss_closes_broker_side() {
        let broker = PaperBroker::new();
        broker.set_quote(quote(150.000, 150.003)).await;
        let mut request = order(Side::Buy);
        request.stop_loss = Some(149.910);
        broker.open_position(&request).await.unwrap();

        broker.set_quote(quote(149.850, 149.853)).await;
        assert!(broker.open_positions("USDJPY").await.unwrap().is_empty());
        let closed = broker.closed_trades().await;
        assert!(!closed[0].is_win());
    }

    #[tokio::test]
    async fn test_explicit_close_realizes_current_profit() {
        let broker = PaperBroker::new();
        broker.set_quote(quote(150.000, 150.003)).await;
        let ticket = broker.open_position(&order(Side::Buy)).await.unwrap();

        broker.set_quote(quote(150.053, 150.056)).await;
        let trade = broker.close_position(&ticket.position_id).await.unwrap();
        assert!((trade.realized_profit - 50.0).abs() < 1e-9);
        assert!(broker.open_positions("USDJPY").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_unknown_position_is_rejected() {
        let broker = PaperBroker::new();
        assert!(matches!(
            broker.close_position("nope").await,
            Err(BotError::InvalidOrderResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_modify_updates_protective_levels() {
        let broker = PaperBroker::new();
        broker.set_quote(quote(150.000, 150.003)).await;
        let ticket = broker.open_position(&order(Side::Buy)).await.unwrap();

        broker
            .modify_position(&ticket.position_id, Some(149.950), Some(150.100))
            .await
            .unwrap();
        broker.set_quote(quote(150.120, 150.123)).await;
        assert!(broker.open_positions("USDJPY").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_historical_bars_window_and_limit() {
        use chrono::{Duration, TimeZone};
        let broker = PaperBroker::new();
        let start = Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap();
        let bars: Vec<PriceBar> = (0..10)
            .map(|i| PriceBar {
                timestamp: start + Duration::minutes(i * 5),
                open: 150.0,
                high: 150.1,
                low: 149.9,
                close: 150.0,
                volume: 1000.0,
            })
            .collect();
        broker.push_bars(Timeframe::M5, bars).await;

        let from = start + Duration::minutes(10);
        let window = broker
            .historical_bars("USDJPY", Timeframe::M5, from, 5)
            .await
            .unwrap();
        assert_eq!(window.len(), 5);
        // Most recent bars win when the window exceeds the limit
        assert_eq!(window.last().unwrap().timestamp, start + Duration::minutes(45));
        assert_eq!(window.first().unwrap().timestamp, start + Duration::minutes(25));
    }
}
