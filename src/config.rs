use chrono::Duration;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::execution::{EngineConfig, EntryGate, ExitRule, PositionMonitor};
use crate::models::Timeframe;
use crate::scheduler::Cadence;
use crate::sizing::{SizingPolicy, SizingState};
use crate::strategy::ClassifierConfig;
use crate::{BotError, Result};

/// Runtime configuration, loaded once at startup from an optional TOML file
/// plus `FXBOT_*` environment overrides.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub symbol: String,
    pub timeframe_minutes: u32,
    /// Higher timeframe that must agree with the primary trend, if set.
    pub confirm_timeframe_minutes: Option<u32>,
    pub history_bars: usize,
    pub base_volume: f64,
    /// Take-profit distance in price units.
    pub take_profit: f64,
    /// Stop-loss distance in price units.
    pub stop_loss: f64,
    pub scale_targets: bool,
    pub alternate_direction: bool,
    pub cooldown_minutes: i64,
    pub max_open_positions: usize,
    /// Only enter when the wall-clock minute is a multiple of this.
    pub minute_alignment: Option<u32>,
    pub cadence: Cadence,
    pub classifier: ClassifierConfig,
    pub sizing: SizingPolicy,
    pub exit_rules: Vec<ExitRule>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            symbol: "USDJPY".to_string(),
            timeframe_minutes: 5,
            confirm_timeframe_minutes: None,
            history_bars: 100,
            base_volume: 0.01,
            take_profit: 0.190,
            stop_loss: 0.090,
            scale_targets: false,
            alternate_direction: false,
            cooldown_minutes: 5,
            max_open_positions: 2,
            minute_alignment: Some(5),
            cadence: Cadence::WallClock { minutes: 5 },
            classifier: ClassifierConfig::default(),
            sizing: SizingPolicy::Flat,
            exit_rules: vec![
                ExitRule::PeakTrailing { fraction: 0.5 },
                ExitRule::AggregateTarget { target: 1.0 },
            ],
        }
    }
}

impl BotConfig {
    /// Load from `path` (missing file is fine, defaults apply) with
    /// `FXBOT_*` environment variables taking precedence.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("FXBOT").separator("__"))
            .build()
            .map_err(|e| BotError::Configuration(e.to_string()))?;

        let config: BotConfig = settings
            .try_deserialize()
            .map_err(|e| BotError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the engine cannot run with. Configuration
    /// errors are fatal, unlike per-cycle failures.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(BotError::Configuration("symbol must not be empty".into()));
        }
        if self.base_volume <= 0.0 {
            return Err(BotError::Configuration(format!(
                "base_volume must be positive, got {}",
                self.base_volume
            )));
        }
        if self.take_profit <= 0.0 || self.stop_loss <= 0.0 {
            return Err(BotError::Configuration(
                "take_profit and stop_loss distances must be positive".into(),
            ));
        }
        if self.max_open_positions == 0 {
            return Err(BotError::Configuration(
                "max_open_positions must be at least 1".into(),
            ));
        }
        if self.history_bars == 0 {
            return Err(BotError::Configuration("history_bars must be at least 1".into()));
        }
        if self.minute_alignment == Some(0) {
            return Err(BotError::Configuration(
                "minute_alignment must be at least 1".into(),
            ));
        }
        match self.cadence {
            Cadence::WallClock { minutes: 0 } => {
                return Err(BotError::Configuration(
                    "wall_clock cadence minutes must be at least 1".into(),
                ));
            }
            Cadence::Interval { seconds: 0 } => {
                return Err(BotError::Configuration(
                    "interval cadence seconds must be at least 1".into(),
                ));
            }
            _ => {}
        }
        if let SizingPolicy::Martingale { max_volume } = self.sizing {
            if max_volume < self.base_volume {
                return Err(BotError::Configuration(format!(
                    "martingale max_volume {} is below base_volume {}",
                    max_volume, self.base_volume
                )));
            }
        }
        self.timeframe()?;
        self.confirm_timeframe()?;
        Ok(())
    }

    pub fn timeframe(&self) -> Result<Timeframe> {
        Timeframe::from_minutes(self.timeframe_minutes).ok_or_else(|| {
            BotError::Configuration(format!(
                "unsupported timeframe: {} minutes",
                self.timeframe_minutes
            ))
        })
    }

    pub fn confirm_timeframe(&self) -> Result<Option<Timeframe>> {
        match self.confirm_timeframe_minutes {
            None => Ok(None),
            Some(minutes) => Timeframe::from_minutes(minutes).map(Some).ok_or_else(|| {
                BotError::Configuration(format!("unsupported confirm timeframe: {minutes} minutes"))
            }),
        }
    }

    pub fn engine_config(&self) -> Result<EngineConfig> {
        Ok(EngineConfig {
            symbol: self.symbol.clone(),
            timeframe: self.timeframe()?,
            confirm_timeframe: self.confirm_timeframe()?,
            history_bars: self.history_bars,
            classifier: self.classifier.clone(),
            take_profit: self.take_profit,
            stop_loss: self.stop_loss,
            scale_targets: self.scale_targets,
            alternate_direction: self.alternate_direction,
        })
    }

    pub fn entry_gate(&self) -> EntryGate {
        EntryGate::new(
            Duration::minutes(self.cooldown_minutes),
            self.max_open_positions,
            self.minute_alignment,
        )
    }

    pub fn monitor(&self) -> PositionMonitor {
        PositionMonitor::new(self.exit_rules.clone())
    }

    pub fn sizing_state(&self) -> SizingState {
        SizingState::new(self.sizing, self.base_volume)
    }
}
