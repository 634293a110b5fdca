use crate::error::BotError;
use crate::Result;

/// Calculate Simple Moving Average (SMA) over the trailing `period` window.
pub fn calculate_sma(prices: &[f64], period: usize) -> Result<f64> {
    if period == 0 || prices.len() < period {
        return Err(BotError::InsufficientData {
            have: prices.len(),
            need: period.max(1),
        });
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Ok(sum / period as f64)
}

/// Calculate Exponential Moving Average (EMA) as a full series aligned 1:1
/// with the input.
///
/// Seed = simple average of the first `period` values (not first-value
/// seeding), smoothing factor α = 2/(period+1). Indices before `period - 1`
/// carry no value rather than zero, so short warmups cannot read as signals.
pub fn ema_series(prices: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 || prices.len() < period {
        return Err(BotError::InsufficientData {
            have: prices.len(),
            need: period.max(1),
        });
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut series = Vec::with_capacity(prices.len());

    // Warmup: no value until a full window has accumulated
    for _ in 0..period - 1 {
        series.push(None);
    }

    let seed: f64 = prices[..period].iter().sum::<f64>() / period as f64;
    let mut ema = seed;
    series.push(Some(ema));

    for price in &prices[period..] {
        ema = (price - ema) * alpha + ema;
        series.push(Some(ema));
    }

    Ok(series)
}

/// Latest EMA value for the sequence. Convenience over `ema_series`.
pub fn calculate_ema(prices: &[f64], period: usize) -> Result<f64> {
    let series = ema_series(prices, period)?;
    Ok(series
        .last()
        .copied()
        .flatten()
        .expect("series ends with a value for len >= period"))
}
