//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for stratfolio.
#[derive(Debug, thiserror::Error)]
pub enum StratfolioError {
    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid rule {rule} for {instrument}: {reason}")]
    RuleInvalid {
        instrument: String,
        rule: String,
        reason: String,
    },

    #[error("invalid instrument {instrument}: {reason}")]
    InstrumentInvalid { instrument: String, reason: String },

    #[error("no price data for {instrument}")]
    EmptySeries { instrument: String },

    #[error("price data for {instrument} is not strictly increasing at {date}")]
    NonMonotonic { instrument: String, date: NaiveDate },

    #[error("no instrument could be simulated")]
    NothingToSimulate,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StratfolioError {
    /// Instrument the error refers to, when it refers to one.
    pub fn instrument(&self) -> Option<&str> {
        match self {
            StratfolioError::RuleInvalid { instrument, .. }
            | StratfolioError::InstrumentInvalid { instrument, .. }
            | StratfolioError::EmptySeries { instrument }
            | StratfolioError::NonMonotonic { instrument, .. } => Some(instrument),
            _ => None,
        }
    }
}

impl From<&StratfolioError> for std::process::ExitCode {
    fn from(err: &StratfolioError) -> Self {
        let code: u8 = match err {
            StratfolioError::Io(_) => 1,
            StratfolioError::ConfigParse { .. }
            | StratfolioError::ConfigMissing { .. }
            | StratfolioError::ConfigInvalid { .. }
            | StratfolioError::InstrumentInvalid { .. } => 2,
            StratfolioError::DataSource { .. } => 3,
            StratfolioError::RuleInvalid { .. } => 4,
            StratfolioError::EmptySeries { .. }
            | StratfolioError::NonMonotonic { .. }
            | StratfolioError::NothingToSimulate => 5,
        };
        std::process::ExitCode::from(code)
    }
}
