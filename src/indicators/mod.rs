// Technical indicators module
// Pure functions over ordered price sequences. Every function reports
// InsufficientData when the window requirement is unmet instead of returning
// a default value that could fabricate a trade signal.

pub mod bollinger;
pub mod extremes;
pub mod moving_average;
pub mod rsi;

pub use bollinger::{calculate_bollinger, BollingerBands};
pub use extremes::{high_low_extremes, PriceExtremes};
pub use moving_average::{calculate_ema, calculate_sma, ema_series};
pub use rsi::calculate_rsi;
