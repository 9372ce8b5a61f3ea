//! Report generation port trait.

use std::path::Path;

use crate::domain::backtest::BacktestReport;
use crate::domain::error::StratfolioError;

/// Port for writing backtest reports.
pub trait ReportPort {
    fn write(&self, report: &BacktestReport, output: &Path) -> Result<(), StratfolioError>;
}
