//! OHLCV bar representation and whole-series checks.

use chrono::NaiveDate;

use super::error::StratfolioError;

#[derive(Debug, Clone, PartialEq)]
pub struct OhlcvBar {
    pub code: String,
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: i64,
}

impl OhlcvBar {
    /// A bar can be traded and marked only with a positive, finite close.
    pub fn is_tradable(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

/// Reject series the ledger cannot replay: empty, or dates not strictly increasing.
pub fn validate_series(code: &str, bars: &[OhlcvBar]) -> Result<(), StratfolioError> {
    if bars.is_empty() {
        return Err(StratfolioError::EmptySeries {
            instrument: code.to_string(),
        });
    }
    for pair in bars.windows(2) {
        if pair[1].date <= pair[0].date {
            return Err(StratfolioError::NonMonotonic {
                instrument: code.to_string(),
                date: pair[1].date,
            });
        }
    }
    Ok(())
}
