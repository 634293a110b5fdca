use std::collections::HashMap;

use serde::Deserialize;

use crate::models::{OpenPosition, Side};

/// One profit-protection rule evaluated every monitoring pass.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitRule {
    /// Track the highest unrealized profit per position and close once
    /// profit falls to `fraction` of that peak or below. Only arms after
    /// the position has been in profit.
    PeakTrailing { fraction: f64 },
    /// Close every open position once their combined unrealized profit
    /// reaches the target.
    AggregateTarget { target: f64 },
    /// Per-position hard bounds: close at or below the floor, or at or
    /// above the ceiling.
    AbsoluteBounds { floor: f64, ceiling: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CloseReason {
    PeakGiveback,
    AggregateTarget,
    FloorHit,
    CeilingHit,
}

#[derive(Debug, Clone)]
pub struct CloseDecision {
    pub position_id: String,
    pub reason: CloseReason,
}

/// Evaluates exit rules against the open position set each cycle.
///
/// Peak tracking is the only state here; it survives across cycles and is
/// dropped via `forget` once a position is gone.
#[derive(Debug, Clone)]
pub struct PositionMonitor {
    rules: Vec<ExitRule>,
    peaks: HashMap<String, f64>,
}

impl PositionMonitor {
    pub fn new(rules: Vec<ExitRule>) -> Self {
        Self {
            rules,
            peaks: HashMap::new(),
        }
    }

    /// Decide which positions to close. Each position appears at most once
    /// in the result even if several rules fire.
    pub fn evaluate(&mut self, positions: &[OpenPosition]) -> Vec<CloseDecision> {
        let mut decisions: Vec<CloseDecision> = Vec::new();
        let mut decided: std::collections::HashSet<&str> = std::collections::HashSet::new();

        // Refresh peaks first so every rule sees current highs
        for position in positions {
            let peak = self.peaks.entry(position.id.clone()).or_insert(0.0);
            if position.unrealized_profit > *peak {
                *peak = position.unrealized_profit;
            }
        }

        for rule in &self.rules {
            match *rule {
                ExitRule::PeakTrailing { fraction } => {
                    for position in positions {
                        if decided.contains(position.id.as_str()) {
                            continue;
                        }
                        let peak = self.peaks.get(&position.id).copied().unwrap_or(0.0);
                        if peak > 0.0 && position.unrealized_profit <= peak * fraction {
                            tracing::info!(
                                position_id = %position.id,
                                peak,
                                profit = position.unrealized_profit,
                                "closing: profit gave back past trailing threshold"
                            );
                            decided.insert(position.id.as_str());
                            decisions.push(CloseDecision {
                                position_id: position.id.clone(),
                                reason: CloseReason::PeakGiveback,
                            });
                        }
                    }
                }
                ExitRule::AggregateTarget { target } => {
                    let total: f64 = positions.iter().map(|p| p.unrealized_profit).sum();
                    if !positions.is_empty() && total >= target {
                        tracing::info!(total, target, "closing all: aggregate profit target reached");
                        for position in positions {
                            if decided.insert(position.id.as_str()) {
                                decisions.push(CloseDecision {
                                    position_id: position.id.clone(),
                                    reason: CloseReason::AggregateTarget,
                                });
                            }
                        }
                    }
                }
                ExitRule::AbsoluteBounds { floor, ceiling } => {
                    for position in positions {
                        if decided.contains(position.id.as_str()) {
                            continue;
                        }
                        let profit = position.unrealized_profit;
                        let reason = if profit <= floor {
                            Some(CloseReason::FloorHit)
                        } else if profit >= ceiling {
                            Some(CloseReason::CeilingHit)
                        } else {
                            None
                        };
                        if let Some(reason) = reason {
                            tracing::info!(
                                position_id = %position.id,
                                profit,
                                "closing: absolute profit bound hit"
                            );
                            decided.insert(position.id.as_str());
                            decisions.push(CloseDecision {
                                position_id: position.id.clone(),
                                reason,
                            });
                        }
                    }
                }
            }
        }

        decisions
    }

    /// Drop peak state for a position that no longer exists.
    pub fn forget(&mut self, position_id: &str) {
        self.peaks.remove(position_id);
    }

    /// Keep peak state only for positions still open. Positions closed on
    /// the platform side (TP/SL hit between cycles) disappear from the open
    /// set without an explicit close, so their peaks are pruned here.
    pub fn retain<'a, I>(&mut self, live: I)
    where
        I: Iterator<Item = &'a str>,
    {
        let live: std::collections::HashSet<&str> = live.collect();
        self.peaks.retain(|id, _| live.contains(id.as_str()));
    }

    #[cfg(test)]
    fn peak_of(&self, position_id: &str) -> Option<f64> {
        self.peaks.get(position_id).copied()
    }
}

/// Absolute TP/SL price levels for an entry, widened by the spread so the
/// fill side of the book has to travel the full configured distance.
///
/// BUY closes on the bid, so targets sit `spread` beyond the ask-based
/// entry; SELL mirrors.
pub fn profit_targets(
    side: Side,
    entry_price: f64,
    take_profit_distance: f64,
    stop_loss_distance: f64,
    spread: f64,
) -> (f64, f64) {
    match side {
        Side::Buy => (
            entry_price + take_profit_distance + spread,
            entry_price - stop_loss_distance - spread,
        ),
        Side::Sell => (
            entry_price - take_profit_distance - spread,
            entry_price + stop_loss_distance + spread,
        ),
    }
}
