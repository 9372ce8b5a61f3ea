//! Technical indicators used by the signal rules.
//!
//! - `IndicatorPoint`: one point of an indicator time series, with a validity flag
//! - `IndicatorValue`: the output shape of an indicator
//! - `IndicatorType`: indicator identity plus parameters
//! - `IndicatorSeries`: a time series of indicator values aligned to the bars

mod ema;
pub mod macd;
pub mod sma;

pub use macd::calculate_macd;
pub use sma::calculate_sma;

use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone)]
pub struct IndicatorPoint {
    pub date: NaiveDate,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndicatorType {
    Sma(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
}

#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// The simple value at `index`, or `None` for invalid or multi-value points.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        let point = self.values.get(index)?;
        match (point.valid, &point.value) {
            (true, IndicatorValue::Simple(v)) => Some(*v),
            _ => None,
        }
    }

    /// The (line, signal) pair at `index`, or `None` if the point is invalid.
    pub fn macd_at(&self, index: usize) -> Option<(f64, f64)> {
        let point = self.values.get(index)?;
        match (point.valid, &point.value) {
            (true, IndicatorValue::Macd { line, signal, .. }) => Some((*line, *signal)),
            _ => None,
        }
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
        }
    }
}
