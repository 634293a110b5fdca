use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::models::{Side, Timeframe};
use crate::sizing::SizingState;
use crate::store::BarStore;
use crate::strategy::{classify, ClassifierConfig, MarketSnapshot};
use crate::{BotError, Result};

use super::broker::{ExecutionClient, MarketData, OrderRequest};
use super::entry_gate::EntryGate;
use super::monitor::{profit_targets, PositionMonitor};

/// Static per-engine settings; the mutable trading state lives in the gate,
/// monitor and sizing fields of the engine itself.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Higher timeframe whose trend must agree before entering.
    pub confirm_timeframe: Option<Timeframe>,
    /// How many bars of history to sync and classify over.
    pub history_bars: usize,
    pub classifier: ClassifierConfig,
    /// Take-profit distance in price units.
    pub take_profit: f64,
    /// Stop-loss distance in price units.
    pub stop_loss: f64,
    /// Scale TP/SL distances with the current stake ratio.
    pub scale_targets: bool,
    /// Enter opposite to the previous entry's side instead of following the
    /// trend signal, once a first trend-derived entry exists.
    pub alternate_direction: bool,
}

/// One trading engine instance per symbol.
///
/// Every cycle runs the same sequence: sync bars into the store, monitor and
/// close open positions, then look for a new entry. Closes are handled
/// before entries so a freed slot is usable in the same cycle.
pub struct TradingEngine {
    config: EngineConfig,
    market: Arc<dyn MarketData>,
    broker: Arc<dyn ExecutionClient>,
    store: Arc<dyn BarStore>,
    gate: EntryGate,
    monitor: PositionMonitor,
    sizing: SizingState,
}

impl TradingEngine {
    pub fn new(
        config: EngineConfig,
        market: Arc<dyn MarketData>,
        broker: Arc<dyn ExecutionClient>,
        store: Arc<dyn BarStore>,
        gate: EntryGate,
        monitor: PositionMonitor,
        sizing: SizingState,
    ) -> Self {
        Self {
            config,
            market,
            broker,
            store,
            gate,
            monitor,
            sizing,
        }
    }

    pub fn sizing(&self) -> &SizingState {
        &self.sizing
    }

    /// Run one full decision cycle at `now`.
    pub async fn run_cycle(&mut self, now: DateTime<Utc>) -> Result<()> {
        let bars = self.sync_bars(now).await?;
        let quote = self.market.latest_quote(&self.config.symbol).await?;

        let mut positions = self.broker.open_positions(&self.config.symbol).await?;
        self.monitor.retain(positions.iter().map(|p| p.id.as_str()));

        // Close pass first: realized outcomes feed sizing before any entry
        let decisions = self.monitor.evaluate(&positions);
        for decision in &decisions {
            let closed = self.broker.close_position(&decision.position_id).await?;
            self.monitor.forget(&decision.position_id);
            self.sizing.apply_outcome(closed.realized_profit);
            tracing::info!(
                position_id = %closed.position_id,
                profit = closed.realized_profit,
                win = closed.is_win(),
                reason = ?decision.reason,
                "position closed"
            );
            positions.retain(|p| p.id != decision.position_id);
        }

        // Entry pass
        let confirm_bars = match self.config.confirm_timeframe {
            Some(timeframe) => Some(self.fetch_window(now, timeframe).await?),
            None => None,
        };

        let snapshot = MarketSnapshot {
            bars: &bars,
            confirm_bars: confirm_bars.as_deref(),
            latest_price: (quote.bid + quote.ask) / 2.0,
        };

        let signal = match classify(&snapshot, &self.config.classifier) {
            Ok(signal) => signal,
            Err(BotError::InsufficientData { have, need }) => {
                // Not enough history yet; skip entries until the window fills
                tracing::info!(have, need, "waiting for enough bars to classify");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let Some(trend_side) = signal.entry_side(self.config.classifier.require_bos) else {
            tracing::debug!(trend = ?signal.trend, bos = signal.bos, "no actionable signal");
            return Ok(());
        };

        let side = self.pick_side(trend_side);

        let stamp_before = self.gate.last_entry();
        if !self.gate.try_enter(now, positions.len()) {
            return Ok(());
        }

        let volume = self.sizing.current_volume();
        let (tp_distance, sl_distance) = if self.config.scale_targets {
            self.sizing
                .scaled_targets(self.config.take_profit, self.config.stop_loss)
        } else {
            (self.config.take_profit, self.config.stop_loss)
        };

        let entry_price = quote.entry_price(side);
        let (take_profit, stop_loss) =
            profit_targets(side, entry_price, tp_distance, sl_distance, quote.spread());

        let request = OrderRequest {
            symbol: self.config.symbol.clone(),
            side,
            volume,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
            comment: format!("{:?} trend entry", signal.trend),
        };

        match self.broker.open_position(&request).await {
            Ok(ticket) => {
                self.sizing.record_open(side, now);
                tracing::info!(
                    position_id = %ticket.position_id,
                    ?side,
                    volume,
                    entry_price,
                    take_profit,
                    stop_loss,
                    "position opened"
                );
                Ok(())
            }
            Err(e) => {
                // Unstamp the gate so the next cycle may retry; sizing was
                // never touched for a fill that did not happen
                self.gate.revoke(stamp_before);
                Err(e)
            }
        }
    }

    /// In alternate mode each entry flips the previous side; the trend
    /// signal only seeds the first direction.
    fn pick_side(&self, trend_side: Side) -> Side {
        if self.config.alternate_direction {
            match self.sizing.last_side {
                Some(previous) => previous.opposite(),
                None => trend_side,
            }
        } else {
            trend_side
        }
    }

    /// Pull fresh bars from the feed, persist them idempotently, and return
    /// the store's ascending view of the window.
    async fn sync_bars(&self, now: DateTime<Utc>) -> Result<Vec<crate::models::PriceBar>> {
        let span = Duration::minutes(
            self.config.timeframe.minutes() as i64 * self.config.history_bars as i64,
        );
        let from = now - span;

        let fetched = self
            .market
            .historical_bars(
                &self.config.symbol,
                self.config.timeframe,
                from,
                self.config.history_bars,
            )
            .await?;

        let mut inserted = 0usize;
        for bar in fetched {
            if self.store.insert(bar).await? {
                inserted += 1;
            }
        }
        tracing::debug!(inserted, "bar sync complete");

        self.store.query_range(from, now, true).await
    }

    async fn fetch_window(
        &self,
        now: DateTime<Utc>,
        timeframe: Timeframe,
    ) -> Result<Vec<crate::models::PriceBar>> {
        let span = Duration::minutes(timeframe.minutes() as i64 * self.config.history_bars as i64);
        self.market
            .historical_bars(&self.config.symbol, timeframe, now - span, self.config.history_bars)
            .await
    }
}
