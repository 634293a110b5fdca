use crate::error::BotError;
use crate::models::PriceBar;
use crate::Result;

/// Highest high / lowest low over a trailing bar window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceExtremes {
    pub highest: f64,
    pub lowest: f64,
}

impl PriceExtremes {
    /// Break of structure: price outside the recent high/low range, used as
    /// trend-continuation confirmation.
    pub fn is_breakout(&self, price: f64) -> bool {
        price > self.highest || price < self.lowest
    }
}

/// Max high and min low over the trailing `window` bars.
pub fn high_low_extremes(bars: &[PriceBar], window: usize) -> Result<PriceExtremes> {
    if window == 0 || bars.len() < window {
        return Err(BotError::InsufficientData {
            have: bars.len(),
            need: window.max(1),
        });
    }

    let recent = &bars[bars.len() - window..];
    let highest = recent.iter().fold(f64::MIN, |acc, b| acc.max(b.high));
    let lowest = recent.iter().fold(f64::MAX, |acc, b| acc.min(b.low));

    Ok(PriceExtremes { highest, lowest })
}
