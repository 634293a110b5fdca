// Order execution: boundary traits, entry gating, and position monitoring.
pub mod broker;
pub mod engine;
pub mod entry_gate;
pub mod monitor;

pub use broker::{ExecutionClient, MarketData, OrderRequest, OrderTicket};
pub use engine::{EngineConfig, TradingEngine};
pub use entry_gate::EntryGate;
pub use monitor::{profit_targets, CloseDecision, CloseReason, ExitRule, PositionMonitor};
