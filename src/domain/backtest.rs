//! Backtest entry point.
//!
//! `run_backtest` takes explicit inputs and returns an explicit report: it
//! validates the instruments, fetches every series once through the
//! `DataPort`, simulates and composes the portfolio, then computes metrics.

use chrono::NaiveDate;
use std::collections::HashMap;
use tracing::{info, warn};

use super::config_validation::validate_instruments;
use super::error::StratfolioError;
use super::instrument::Instrument;
use super::ledger::SameDayPolicy;
use super::metrics::Metrics;
use super::ohlcv::OhlcvBar;
use super::portfolio::{CalendarAlignment, EquityPoint, PortfolioResult, run_portfolio};
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub risk_free_rate: f64,
    pub alignment: CalendarAlignment,
    pub same_day: SameDayPolicy,
    /// Code of a price series to measure relative performance against.
    pub benchmark: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentMetrics {
    pub code: String,
    pub metrics: Metrics,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub config: BacktestConfig,
    pub portfolio: PortfolioResult,
    pub metrics: Metrics,
    pub instrument_metrics: Vec<InstrumentMetrics>,
}

/// Fetch every instrument's bars, and the benchmark's, once before any simulation.
pub fn fetch_series(
    config: &BacktestConfig,
    instruments: &[Instrument],
    data: &dyn DataPort,
) -> Result<HashMap<String, Vec<OhlcvBar>>, StratfolioError> {
    let codes = instruments
        .iter()
        .map(|i| i.code.as_str())
        .chain(config.benchmark.as_deref());

    let mut series = HashMap::with_capacity(instruments.len() + 1);
    for code in codes {
        if series.contains_key(code) {
            continue;
        }
        let bars = data.fetch_ohlcv(code, config.start_date, config.end_date)?;
        info!(instrument = %code, bars = bars.len(), "loaded price series");
        series.insert(code.to_string(), bars);
    }
    Ok(series)
}

/// Close-price curve of the benchmark; `None` (with a warning) when it has no
/// tradable bars.
fn benchmark_curve(
    config: &BacktestConfig,
    series: &HashMap<String, Vec<OhlcvBar>>,
) -> Option<Vec<EquityPoint>> {
    let code = config.benchmark.as_deref()?;
    let curve: Vec<EquityPoint> = series
        .get(code)
        .map(|bars| {
            bars.iter()
                .filter(|bar| bar.is_tradable())
                .map(|bar| EquityPoint {
                    date: bar.date,
                    equity: bar.close,
                })
                .collect()
        })
        .unwrap_or_default();
    if curve.is_empty() {
        warn!(benchmark = %code, "benchmark has no usable prices; relative metrics skipped");
        return None;
    }
    Some(curve)
}

pub fn run_backtest(
    config: &BacktestConfig,
    instruments: &[Instrument],
    data: &dyn DataPort,
) -> Result<BacktestReport, StratfolioError> {
    validate_instruments(instruments)?;
    let series = fetch_series(config, instruments, data)?;
    run_on_series(config, instruments, &series)
}

/// Simulate against series already in memory.
pub fn run_on_series(
    config: &BacktestConfig,
    instruments: &[Instrument],
    series: &HashMap<String, Vec<OhlcvBar>>,
) -> Result<BacktestReport, StratfolioError> {
    validate_instruments(instruments)?;
    info!(
        instruments = instruments.len(),
        start = %config.start_date,
        end = %config.end_date,
        "starting backtest"
    );

    let portfolio = run_portfolio(instruments, series, config.alignment, config.same_day)?;
    let benchmark = benchmark_curve(config, series);
    let metrics = Metrics::compute(
        &portfolio.equity_curve,
        &portfolio.trades,
        config.risk_free_rate,
        benchmark.as_deref(),
    );

    let instrument_metrics = portfolio
        .instruments
        .iter()
        .map(|result| {
            let curve: Vec<EquityPoint> = result
                .rows
                .iter()
                .map(|row| EquityPoint {
                    date: row.date,
                    equity: row.portfolio_value,
                })
                .collect();
            InstrumentMetrics {
                code: result.code.clone(),
                metrics: Metrics::compute(
                    &curve,
                    &result.trades,
                    config.risk_free_rate,
                    benchmark.as_deref(),
                ),
            }
        })
        .collect();

    info!(
        trades = portfolio.trades.len(),
        total_return = metrics.total_return,
        max_drawdown = metrics.max_drawdown,
        "backtest complete"
    );

    Ok(BacktestReport {
        config: config.clone(),
        portfolio,
        metrics,
        instrument_metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::rule::{Direction, Frequency, RuleKind, Sizing, StrategyRule, TimeBasedParams};

    fn sample_config() -> BacktestConfig {
        BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            risk_free_rate: 0.0,
            alignment: CalendarAlignment::Outer,
            same_day: SameDayPolicy::Net,
            benchmark: None,
        }
    }

    fn make_bars(code: &str, prices: &[f64]) -> Vec<OhlcvBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &close)| OhlcvBar {
                code: code.into(),
                date: NaiveDate::from_ymd_opt(2024, 1, (i + 1) as u32).unwrap(),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000,
            })
            .collect()
    }

    fn instrument(code: &str, initial: f64, rules: Vec<StrategyRule>) -> Instrument {
        Instrument {
            code: code.into(),
            fee_rate: 0.0,
            initial_investment: initial,
            max_investment: 1_000.0,
            rules,
        }
    }

    #[test]
    fn defaults_are_outer_and_net() {
        assert_eq!(CalendarAlignment::default(), CalendarAlignment::Outer);
        assert_eq!(SameDayPolicy::default(), SameDayPolicy::Net);
    }

    #[test]
    fn per_instrument_metrics_follow_config_order() {
        let instruments = vec![instrument("B", 500.0, vec![]), instrument("A", 0.0, vec![])];
        let mut series = HashMap::new();
        series.insert("A".to_string(), make_bars("A", &[10.0, 11.0]));
        series.insert("B".to_string(), make_bars("B", &[10.0, 12.0]));

        let report = run_on_series(&sample_config(), &instruments, &series).unwrap();
        let codes: Vec<&str> = report
            .instrument_metrics
            .iter()
            .map(|m| m.code.as_str())
            .collect();
        assert_eq!(codes, vec!["B", "A"]);
        assert!((report.instrument_metrics[0].metrics.total_return - 0.1).abs() < 1e-12);
        assert_eq!(report.instrument_metrics[1].metrics.total_return, 0.0);
    }

    #[test]
    fn invalid_rule_rejected_before_simulation() {
        let bad = StrategyRule {
            id: "bad".into(),
            direction: Direction::Buy,
            kind: RuleKind::TimeBased(TimeBasedParams {
                frequency: Frequency::Daily,
                trading_day: 0,
            }),
            enabled: true,
            sizing: Sizing::Amount(100.0),
        };
        let instruments = vec![instrument("A", 0.0, vec![bad])];
        let err = run_on_series(&sample_config(), &instruments, &HashMap::new()).unwrap_err();
        assert!(matches!(err, StratfolioError::RuleInvalid { .. }));
    }

    #[test]
    fn all_instruments_excluded_fails() {
        let instruments = vec![instrument("A", 0.0, vec![])];
        let err = run_on_series(&sample_config(), &instruments, &HashMap::new()).unwrap_err();
        assert!(matches!(err, StratfolioError::NothingToSimulate));
    }

    #[test]
    fn benchmark_series_feeds_relative_metrics() {
        let instruments = vec![instrument("A", 1_000.0, vec![])];
        let mut series = HashMap::new();
        series.insert("A".to_string(), make_bars("A", &[10.0, 11.0, 12.1]));
        series.insert("IDX".to_string(), make_bars("IDX", &[100.0, f64::NAN, 110.0]));
        let config = BacktestConfig {
            benchmark: Some("IDX".into()),
            ..sample_config()
        };

        let report = run_on_series(&config, &instruments, &series).unwrap();
        let bench = report.metrics.benchmark.clone().unwrap();
        // The NaN bar drops out: one benchmark return, dated on day 3.
        assert_eq!(bench.common_days, 1);
        assert!((bench.benchmark_return - 0.1).abs() < 1e-12);
        assert!(report.instrument_metrics[0].metrics.benchmark.is_some());
        // The benchmark is not simulated.
        assert_eq!(report.portfolio.instruments.len(), 1);
    }

    #[test]
    fn missing_benchmark_series_skips_relative_metrics() {
        let instruments = vec![instrument("A", 0.0, vec![])];
        let mut series = HashMap::new();
        series.insert("A".to_string(), make_bars("A", &[10.0, 11.0]));
        let config = BacktestConfig {
            benchmark: Some("IDX".into()),
            ..sample_config()
        };

        let report = run_on_series(&config, &instruments, &series).unwrap();
        assert!(report.metrics.benchmark.is_none());
    }
}
