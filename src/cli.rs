//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestReport, fetch_series};
use crate::domain::config_validation::{parse_date, validate_backtest_config, validate_instruments};
use crate::domain::error::StratfolioError;
use crate::domain::instrument::Instrument;
use crate::domain::ledger::SameDayPolicy;
use crate::domain::metrics::{Metrics, Recovery};
use crate::domain::portfolio::CalendarAlignment;
use crate::domain::rule::{
    CrossPattern, CrossPatternParams, Direction, Frequency, RuleKind, Sizing, StrategyRule,
    TimeBasedParams, TouchParams,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;

const DEFAULT_FEE_RATE: f64 = 0.0003;

#[derive(Parser, Debug)]
#[command(name = "stratfolio", about = "Multi-rule portfolio backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory holding one <CODE>.csv price file per instrument
        #[arg(short, long)]
        data: PathBuf,
        /// Report directory (default: ./report)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
        #[arg(short, long)]
        verbose: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        verbose: bool,
    },
}

impl Cli {
    pub fn verbose(&self) -> bool {
        match self.command {
            Command::Backtest { verbose, .. } | Command::Validate { verbose, .. } => verbose,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            data,
            output,
            dry_run,
            ..
        } => {
            if dry_run {
                run_dry_run(&config, &data)
            } else {
                run_backtest(&config, &data, output.as_deref())
            }
        }
        Command::Validate { config, .. } => run_validate(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, StratfolioError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// Load, validate and parse a configuration file into domain types.
pub fn load_run_inputs(path: &Path) -> Result<(BacktestConfig, Vec<Instrument>), StratfolioError> {
    let adapter = load_config(path)?;
    validate_backtest_config(&adapter)?;
    let bt_config = build_backtest_config(&adapter)?;
    let instruments = build_instruments(&adapter)?;
    validate_instruments(&instruments)?;
    Ok((bt_config, instruments))
}

pub fn run_backtest(
    config_path: &Path,
    data_dir: &Path,
    output_path: Option<&Path>,
) -> Result<(), StratfolioError> {
    let (bt_config, instruments) = load_run_inputs(config_path)?;
    let data_port = CsvAdapter::new(data_dir.to_path_buf());

    eprintln!(
        "Running backtest: {} instruments, {} to {}",
        instruments.len(),
        bt_config.start_date,
        bt_config.end_date,
    );

    let report = backtest_engine::run_backtest(&bt_config, &instruments, &data_port)?;
    print_summary(&report);

    let output = output_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("report"));
    CsvReportAdapter.write(&report, &output)?;
    eprintln!("\nReport written to: {}", output.display());
    Ok(())
}

pub fn run_dry_run(config_path: &Path, data_dir: &Path) -> Result<(), StratfolioError> {
    let (bt_config, instruments) = load_run_inputs(config_path)?;
    eprintln!("Config validated successfully");
    print_instruments(&bt_config, &instruments);

    let data_port = CsvAdapter::new(data_dir.to_path_buf());
    let series = fetch_series(&bt_config, &instruments, &data_port)?;

    eprintln!("\nPrice data:");
    for instrument in &instruments {
        let bars = series.get(&instrument.code).map_or(0, Vec::len);
        eprintln!("  {}: {} bars", instrument.code, bars);
    }

    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

pub fn run_validate(config_path: &Path) -> Result<(), StratfolioError> {
    let (bt_config, instruments) = load_run_inputs(config_path)?;
    print_instruments(&bt_config, &instruments);
    eprintln!("\nConfiguration is valid.");
    Ok(())
}

fn print_instruments(bt_config: &BacktestConfig, instruments: &[Instrument]) {
    eprintln!(
        "\nBacktest: {} to {}, calendar {:?}, same-day {:?}",
        bt_config.start_date, bt_config.end_date, bt_config.alignment, bt_config.same_day
    );
    if let Some(code) = &bt_config.benchmark {
        eprintln!("Benchmark: {}", code);
    }
    for instrument in instruments {
        eprintln!(
            "\n{}: max_investment {:.2}, initial_investment {:.2}, fee {}",
            instrument.code,
            instrument.max_investment,
            instrument.initial_investment,
            instrument.fee_rate
        );
        for rule in &instrument.rules {
            let state = if rule.enabled { "" } else { " (disabled)" };
            eprintln!("  {} {} {}{}", rule.id, rule.direction, rule.kind.name(), state);
        }
    }
}

fn print_metrics(metrics: &Metrics) {
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
    eprintln!("Volatility:       {:.2}%", metrics.annualized_volatility * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     {:.1}%", metrics.max_drawdown * 100.0);
    if let Some(episode) = &metrics.drawdown {
        match episode.recovery {
            Recovery::Recovered { date, days } => eprintln!(
                "  peak {} trough {} recovered {} ({} days)",
                episode.peak_date, episode.trough_date, date, days
            ),
            Recovery::Unrecovered => eprintln!(
                "  peak {} trough {} not recovered",
                episode.peak_date, episode.trough_date
            ),
        }
    }
    eprintln!("VaR 95% (daily):  {:.2}%", metrics.var_95 * 100.0);
    eprintln!("Best Month:       {:.2}%", metrics.best_month * 100.0);
    eprintln!("Worst Month:      {:.2}%", metrics.worst_month * 100.0);
    if let Some(bench) = &metrics.benchmark {
        eprintln!("Benchmark Return: {:.2}%", bench.benchmark_return * 100.0);
        eprintln!("Alpha / Beta:     {:.4} / {:.2}", bench.alpha, bench.beta);
        eprintln!("Information:      {:.2}", bench.information_ratio);
    }
    eprintln!("Total Trades:     {}", metrics.trade_count);
    eprintln!("Commission:       {:.2}", metrics.total_commission);
}

fn print_summary(report: &BacktestReport) {
    eprintln!("\n=== Aggregate Results ===");
    print_metrics(&report.metrics);

    if !report.instrument_metrics.is_empty() {
        eprintln!("\n=== Per-Instrument Summary ===");
        for entry in &report.instrument_metrics {
            eprintln!(
                "  {}:  {} trades, {:.2}% return, {:.1}% max drawdown",
                entry.code,
                entry.metrics.trade_count,
                entry.metrics.total_return * 100.0,
                entry.metrics.max_drawdown * 100.0,
            );
        }
    }

    for warning in &report.portfolio.warnings {
        eprintln!(
            "warning: {} padded with zero value on {} dates",
            warning.instrument, warning.padded_dates
        );
    }
    for excluded in &report.portfolio.excluded {
        eprintln!("warning: excluded {} ({})", excluded.code, excluded.reason);
    }
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, StratfolioError> {
    let start_date = parse_date(adapter.get_string("backtest", "start_date").as_deref(), "start_date")?;
    let end_date = parse_date(adapter.get_string("backtest", "end_date").as_deref(), "end_date")?;

    let alignment = match adapter.get_string("backtest", "calendar").map(|v| v.to_lowercase()) {
        None => CalendarAlignment::default(),
        Some(v) if v == "outer" => CalendarAlignment::Outer,
        Some(v) if v == "inner" => CalendarAlignment::Inner,
        Some(v) => return Err(invalid("backtest", "calendar", format!("unknown calendar '{}'", v))),
    };
    let same_day = match adapter.get_string("backtest", "same_day").map(|v| v.to_lowercase()) {
        None => SameDayPolicy::default(),
        Some(v) if v == "net" => SameDayPolicy::Net,
        Some(v) if v == "both_legs" => SameDayPolicy::BothLegs,
        Some(v) => return Err(invalid("backtest", "same_day", format!("unknown policy '{}'", v))),
    };

    Ok(BacktestConfig {
        start_date,
        end_date,
        risk_free_rate: parse_key(adapter, "backtest", "risk_free_rate", 0.0)?,
        alignment,
        same_day,
        benchmark: adapter.get_string("backtest", "benchmark"),
    })
}

/// Instruments in `[backtest] instruments` order with their configured rules.
pub fn build_instruments(adapter: &dyn ConfigPort) -> Result<Vec<Instrument>, StratfolioError> {
    let codes = adapter.get_list("backtest", "instruments");
    if codes.is_empty() {
        return Err(StratfolioError::ConfigMissing {
            section: "backtest".into(),
            key: "instruments".into(),
        });
    }
    codes.iter().map(|code| build_instrument(adapter, code)).collect()
}

fn build_instrument(adapter: &dyn ConfigPort, code: &str) -> Result<Instrument, StratfolioError> {
    let section = format!("instrument.{}", code);
    let max_investment: f64 = match adapter.get_string(&section, "max_investment") {
        Some(raw) => raw
            .parse()
            .map_err(|_| invalid(&section, "max_investment", format!("'{}' is not a number", raw)))?,
        None => {
            return Err(StratfolioError::ConfigMissing {
                section,
                key: "max_investment".into(),
            });
        }
    };

    let rules = adapter
        .get_list(&section, "rules")
        .iter()
        .map(|id| build_rule(adapter, code, id))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Instrument {
        code: code.to_string(),
        fee_rate: parse_key(adapter, &section, "fee_rate", DEFAULT_FEE_RATE)?,
        initial_investment: parse_key(adapter, &section, "initial_investment", 0.0)?,
        max_investment,
        rules,
    })
}

pub fn build_rule(adapter: &dyn ConfigPort, code: &str, id: &str) -> Result<StrategyRule, StratfolioError> {
    let section = format!("rule.{}.{}", code, id);
    if !adapter.has_section(&section) {
        return Err(StratfolioError::ConfigMissing {
            section,
            key: "kind".into(),
        });
    }
    let rule_err = |reason: String| StratfolioError::RuleInvalid {
        instrument: code.to_string(),
        rule: id.to_string(),
        reason,
    };
    let required = |key: &str| {
        adapter
            .get_string(&section, key)
            .ok_or_else(|| rule_err(format!("{} is required", key)))
    };
    let number = |key: &str, default: usize| -> Result<usize, StratfolioError> {
        parse_key(adapter, &section, key, default).map_err(|e| rule_err(e.to_string()))
    };

    let direction: Direction = required("direction")?.parse().map_err(rule_err)?;
    let enabled = match adapter.get_string(&section, "enabled") {
        None => true,
        Some(raw) => parse_flag(&raw)
            .ok_or_else(|| rule_err(format!("invalid enabled flag '{}'", raw)))?,
    };

    let kind = match required("kind")?.to_lowercase().as_str() {
        "time_based" => {
            let defaults = TimeBasedParams::default();
            let frequency = match adapter.get_string(&section, "frequency") {
                Some(raw) => raw.parse::<Frequency>().map_err(rule_err)?,
                None => defaults.frequency,
            };
            RuleKind::TimeBased(TimeBasedParams {
                frequency,
                trading_day: number("trading_day", defaults.trading_day)?,
            })
        }
        "cross_pattern" | "macd_pattern" => {
            let defaults = CrossPatternParams::default();
            let patterns = match adapter.get_string(&section, "patterns") {
                Some(_) => adapter
                    .get_list(&section, "patterns")
                    .iter()
                    .map(|p| p.parse::<CrossPattern>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(rule_err)?,
                None => defaults.patterns,
            };
            RuleKind::CrossPattern(CrossPatternParams {
                fast_period: number("fast_period", defaults.fast_period)?,
                slow_period: number("slow_period", defaults.slow_period)?,
                signal_period: number("signal_period", defaults.signal_period)?,
                patterns,
                double_cross_lookback: number("double_cross_lookback", defaults.double_cross_lookback)?,
                divergence_lookback: number("divergence_lookback", defaults.divergence_lookback)?,
            })
        }
        "threshold_touch" | "ma_touch" => {
            let defaults = TouchParams::default();
            let ma_periods = match adapter.get_string(&section, "ma_periods") {
                Some(_) => adapter
                    .get_list(&section, "ma_periods")
                    .iter()
                    .map(|p| {
                        p.parse::<usize>()
                            .map_err(|_| rule_err(format!("invalid ma_period '{}'", p)))
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                None => defaults.ma_periods,
            };
            RuleKind::ThresholdTouch(TouchParams {
                ma_periods,
                touch_threshold: parse_key(adapter, &section, "touch_threshold", defaults.touch_threshold)
                    .map_err(|e| rule_err(e.to_string()))?,
            })
        }
        other => return Err(rule_err(format!("unknown kind '{}'", other))),
    };

    let amount = adapter.get_string(&section, "trade_amount");
    let shares = adapter.get_string(&section, "trade_shares");
    let sizing = match (amount, shares) {
        (Some(raw), None) => Sizing::Amount(
            raw.parse()
                .map_err(|_| rule_err(format!("invalid trade_amount '{}'", raw)))?,
        ),
        (None, Some(raw)) => Sizing::Shares(
            raw.parse()
                .map_err(|_| rule_err(format!("invalid trade_shares '{}'", raw)))?,
        ),
        _ => {
            return Err(rule_err(
                "exactly one of trade_amount or trade_shares is required".to_string(),
            ));
        }
    };

    Ok(StrategyRule {
        id: id.to_string(),
        direction,
        kind,
        enabled,
        sizing,
    })
}

fn invalid(section: &str, key: &str, reason: String) -> StratfolioError {
    StratfolioError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Optional key: `default` when absent, an error when present but unparsable.
fn parse_key<T: FromStr>(
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, StratfolioError> {
    match adapter.get_string(section, key) {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| invalid(section, key, format!("cannot parse '{}'", raw))),
    }
}
