use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::Side;

/// How the next order volume reacts to the previous trade outcome.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SizingPolicy {
    /// Every order uses the base volume.
    Flat,
    /// Double the volume after a loss, reset to base after a win. The cap
    /// keeps one losing streak from growing the stake without bound.
    Martingale { max_volume: f64 },
    /// Add one base unit after a loss, remove one after a win, never going
    /// below the base.
    DAlembert,
}

impl SizingPolicy {
    fn on_win(&self, current: f64, base: f64) -> f64 {
        match self {
            SizingPolicy::Flat => base,
            SizingPolicy::Martingale { .. } => base,
            SizingPolicy::DAlembert => (current - base).max(base),
        }
    }

    fn on_lose(&self, current: f64, base: f64) -> f64 {
        match self {
            SizingPolicy::Flat => base,
            SizingPolicy::Martingale { max_volume } => (current * 2.0).min(*max_volume),
            SizingPolicy::DAlembert => current + base,
        }
    }
}

/// Mutable sizing state carried across trades.
///
/// The volume only moves in `apply_outcome`, driven by realized profit from
/// an explicit close. Positions that disappear on the platform side (TP/SL
/// hit between cycles) do not feed back here.
#[derive(Debug, Clone)]
pub struct SizingState {
    policy: SizingPolicy,
    base_volume: f64,
    current_volume: f64,
    /// Side of the most recent entry, for alternate-direction entry mode.
    pub last_side: Option<Side>,
    pub last_entry_time: Option<DateTime<Utc>>,
}

impl SizingState {
    pub fn new(policy: SizingPolicy, base_volume: f64) -> Self {
        Self {
            policy,
            base_volume,
            current_volume: base_volume,
            last_side: None,
            last_entry_time: None,
        }
    }

    pub fn current_volume(&self) -> f64 {
        self.current_volume
    }

    pub fn base_volume(&self) -> f64 {
        self.base_volume
    }

    /// Ratio of the current stake to the base stake, used to scale TP/SL
    /// distances so the per-trade risk profile follows the stake.
    pub fn scale_factor(&self) -> f64 {
        self.current_volume / self.base_volume
    }

    /// Scale take-profit / stop-loss distances by the current stake ratio.
    pub fn scaled_targets(&self, take_profit: f64, stop_loss: f64) -> (f64, f64) {
        let factor = self.scale_factor();
        (take_profit * factor, stop_loss * factor)
    }

    /// Record a successfully opened position.
    pub fn record_open(&mut self, side: Side, at: DateTime<Utc>) {
        self.last_side = Some(side);
        self.last_entry_time = Some(at);
    }

    /// Feed a realized trade outcome back into the policy. Zero profit
    /// counts as a win so a break-even close resets rather than escalates.
    pub fn apply_outcome(&mut self, realized_profit: f64) {
        let before = self.current_volume;
        self.current_volume = if realized_profit >= 0.0 {
            self.policy.on_win(self.current_volume, self.base_volume)
        } else {
            self.policy.on_lose(self.current_volume, self.base_volume)
        };

        if (self.current_volume - before).abs() > f64::EPSILON {
            tracing::info!(
                realized_profit,
                from = before,
                to = self.current_volume,
                "sizing adjusted after trade outcome"
            );
        }
    }
}
