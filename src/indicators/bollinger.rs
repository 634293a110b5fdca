use crate::Result;

use super::calculate_sma;

/// Bollinger Bands around a simple moving average.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl BollingerBands {
    /// Close beyond the upper band (mean-reversion sell region).
    pub fn is_above_upper(&self, price: f64) -> bool {
        price > self.upper
    }

    /// Close beyond the lower band (mean-reversion buy region).
    pub fn is_below_lower(&self, price: f64) -> bool {
        price < self.lower
    }
}

/// Calculate Bollinger Bands over the trailing `period` window.
///
/// Middle band = SMA(period); upper/lower = middle ± multiplier × population
/// standard deviation of the same window.
pub fn calculate_bollinger(
    prices: &[f64],
    period: usize,
    std_dev_multiplier: f64,
) -> Result<BollingerBands> {
    let middle = calculate_sma(prices, period)?;

    let window = &prices[prices.len() - period..];
    let variance =
        window.iter().map(|p| (p - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    Ok(BollingerBands {
        upper: middle + std_dev_multiplier * std_dev,
        middle,
        lower: middle - std_dev_multiplier * std_dev,
    })
}
