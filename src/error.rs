/// Top-level error type for fxbot.
///
/// The scheduler recovers from everything except `Configuration`, which is
/// fatal at startup: the process must not trade with ambiguous settings.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Too few bars for the configured indicator period. Callers skip the
    /// cycle's entry decision; they never substitute a default value.
    #[error("insufficient data: have {have} bars, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("connectivity: {0}")]
    Connectivity(String),

    /// The execution boundary returned no usable position id / fill. The
    /// entry attempt is aborted and sizing state is left untouched.
    #[error("invalid order response: {0}")]
    InvalidOrderResponse(String),

    #[error("configuration: {0}")]
    Configuration(String),
}

impl BotError {
    /// True for errors that abort startup rather than one cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BotError::Configuration(_))
    }
}
