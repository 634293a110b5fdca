// Core modules
pub mod config;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod scheduler;
pub mod sim;
pub mod sizing;
pub mod store;
pub mod strategy;

// Re-export commonly used types
pub use config::BotConfig;
pub use error::BotError;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
