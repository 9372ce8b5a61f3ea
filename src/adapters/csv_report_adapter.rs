//! CSV report adapter.
//!
//! Writes four files into the output directory:
//! `trades.csv`, `values.csv`, `signals.csv` and `metrics.csv`.
//! Rows for each instrument come first in configuration order; aggregate rows
//! use the scope `portfolio`.

use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::info;

use crate::domain::backtest::BacktestReport;
use crate::domain::error::StratfolioError;
use crate::domain::metrics::Metrics;
use crate::ports::report_port::ReportPort;

const PORTFOLIO_SCOPE: &str = "portfolio";

#[derive(Serialize)]
struct ValueRow<'a> {
    scope: &'a str,
    date: NaiveDate,
    mark_price: Option<f64>,
    cash: Option<f64>,
    holdings: Option<i64>,
    holdings_value: Option<f64>,
    portfolio_value: f64,
    signal: Option<f64>,
}

#[derive(Serialize)]
struct SignalRow<'a> {
    instrument: &'a str,
    date: NaiveDate,
    buy_amount: f64,
    sell_amount: f64,
    net: f64,
}

#[derive(Serialize)]
struct MetricRow<'a> {
    scope: &'a str,
    name: &'a str,
    value: String,
}

pub struct CsvReportAdapter;

fn open_writer(path: &Path) -> Result<csv::Writer<fs::File>, StratfolioError> {
    csv::Writer::from_path(path).map_err(|e| StratfolioError::Io(io::Error::from(e)))
}

fn serialize_row<W: io::Write, T: Serialize>(
    writer: &mut csv::Writer<W>,
    row: T,
) -> Result<(), StratfolioError> {
    writer
        .serialize(row)
        .map_err(|e| StratfolioError::Io(io::Error::from(e)))
}

fn write_metrics<W: io::Write>(
    writer: &mut csv::Writer<W>,
    scope: &str,
    metrics: &Metrics,
) -> Result<(), StratfolioError> {
    for (name, value) in metrics.to_map() {
        serialize_row(
            writer,
            MetricRow {
                scope,
                name: &name,
                value: value.to_string(),
            },
        )?;
    }
    Ok(())
}

impl CsvReportAdapter {
    fn write_trades(report: &BacktestReport, dir: &Path) -> Result<(), StratfolioError> {
        let mut writer = open_writer(&dir.join("trades.csv"))?;
        for trade in &report.portfolio.trades {
            serialize_row(&mut writer, trade)?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_values(report: &BacktestReport, dir: &Path) -> Result<(), StratfolioError> {
        let mut writer = open_writer(&dir.join("values.csv"))?;
        for result in &report.portfolio.instruments {
            for row in &result.rows {
                serialize_row(
                    &mut writer,
                    ValueRow {
                        scope: &result.code,
                        date: row.date,
                        mark_price: Some(row.mark_price),
                        cash: Some(row.cash),
                        holdings: Some(row.holdings),
                        holdings_value: Some(row.holdings_value),
                        portfolio_value: row.portfolio_value,
                        signal: Some(row.signal),
                    },
                )?;
            }
        }
        for point in &report.portfolio.equity_curve {
            serialize_row(
                &mut writer,
                ValueRow {
                    scope: PORTFOLIO_SCOPE,
                    date: point.date,
                    mark_price: None,
                    cash: None,
                    holdings: None,
                    holdings_value: None,
                    portfolio_value: point.equity,
                    signal: None,
                },
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    fn write_signals(report: &BacktestReport, dir: &Path) -> Result<(), StratfolioError> {
        let mut writer = open_writer(&dir.join("signals.csv"))?;
        for result in &report.portfolio.instruments {
            for signal in &result.signals {
                serialize_row(
                    &mut writer,
                    SignalRow {
                        instrument: &result.code,
                        date: signal.date,
                        buy_amount: signal.buy_amount,
                        sell_amount: signal.sell_amount,
                        net: signal.net(),
                    },
                )?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    fn write_metrics_file(report: &BacktestReport, dir: &Path) -> Result<(), StratfolioError> {
        let mut writer = open_writer(&dir.join("metrics.csv"))?;
        write_metrics(&mut writer, PORTFOLIO_SCOPE, &report.metrics)?;
        for entry in &report.instrument_metrics {
            write_metrics(&mut writer, &entry.code, &entry.metrics)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, report: &BacktestReport, output: &Path) -> Result<(), StratfolioError> {
        fs::create_dir_all(output)?;
        Self::write_trades(report, output)?;
        Self::write_values(report, output)?;
        Self::write_signals(report, output)?;
        Self::write_metrics_file(report, output)?;
        info!(dir = %output.display(), "report written");
        Ok(())
    }
}
