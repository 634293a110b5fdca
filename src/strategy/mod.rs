// Trend classification module
pub mod classifier;

pub use classifier::{classify, ClassifierConfig, MarketSnapshot, TrendRule, TrendSignal};
