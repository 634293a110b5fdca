use crate::error::BotError;
use crate::Result;

/// Calculate Relative Strength Index (RSI) over the trailing window.
///
/// Wilder-style simple averaging: average gain over average loss across the
/// last `period` price deltas (needs `period + 1` values). If the average
/// loss is zero, RSI is 100 by definition, which also avoids the
/// divide-by-zero.
///
/// Values:
/// - RSI > 70: overbought
/// - RSI < 30: oversold
pub fn calculate_rsi(prices: &[f64], period: usize) -> Result<f64> {
    if period == 0 || prices.len() < period + 1 {
        return Err(BotError::InsufficientData {
            have: prices.len(),
            need: period + 1,
        });
    }

    let mut gains = 0.0;
    let mut losses = 0.0;

    let start = prices.len() - period - 1;
    for i in start..prices.len() - 1 {
        let change = prices[i + 1] - prices[i];
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Ok(100.0);
    }

    let rs = avg_gain / avg_loss;
    Ok(100.0 - (100.0 / (1.0 + rs)))
}
