//! CLI integration tests for config loading and the backtest command.
//!
//! Tests cover:
//! - INI parsing into `BacktestConfig` and instruments
//! - Validate and dry-run commands with real files on disk
//! - Full backtest from CSV price files to CSV report files
//! - Error mapping for bad configs and missing data

mod common;

use clap::Parser;
use common::*;
use std::fs;
use std::io::Write;
use std::path::Path;
use stratfolio::adapters::file_config_adapter::FileConfigAdapter;
use stratfolio::cli::{self, Cli};
use stratfolio::domain::error::StratfolioError;
use stratfolio::domain::rule::{Frequency, RuleKind};
use tempfile::TempDir;

fn write_temp_ini(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

const VALID_INI: &str = r#"
[backtest]
start_date = 2024-01-01
end_date = 2024-06-30
risk_free_rate = 0.02
calendar = outer
same_day = net
instruments = AAA,BBB

[instrument.AAA]
fee_rate = 0.001
initial_investment = 2000
max_investment = 10000
rules = weekly,golden

[rule.AAA.weekly]
direction = buy
kind = time_based
frequency = weekly
trading_day = 1
trade_amount = 500

[rule.AAA.golden]
direction = sell
kind = cross_pattern
fast_period = 3
slow_period = 8
signal_period = 3
patterns = death_cross,bearish_divergence
trade_shares = 20

[instrument.BBB]
max_investment = 5000
rules = touch

[rule.BBB.touch]
direction = buy
kind = threshold_touch
ma_periods = 5,10
touch_threshold = 0.01
trade_amount = 300
"#;

fn data_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_price_file(dir.path(), "AAA", &generate_bars("AAA", "2024-01-01", 120, 40.0));
    write_price_file(dir.path(), "BBB", &generate_bars("BBB", "2024-01-15", 100, 15.0));
    dir
}

mod config_loading {
    use super::*;

    #[test]
    fn build_backtest_config_from_ini() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let config = cli::build_backtest_config(&adapter).unwrap();
        assert_eq!(config.start_date, date(2024, 1, 1));
        assert_eq!(config.end_date, date(2024, 6, 30));
        assert!((config.risk_free_rate - 0.02).abs() < f64::EPSILON);
    }

    #[test]
    fn build_instruments_in_listed_order() {
        let adapter = FileConfigAdapter::from_string(VALID_INI).unwrap();
        let instruments = cli::build_instruments(&adapter).unwrap();
        let codes: Vec<&str> = instruments.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["AAA", "BBB"]);
        assert_eq!(instruments[0].rules.len(), 2);
        assert!(matches!(
            &instruments[0].rules[0].kind,
            RuleKind::TimeBased(p) if p.frequency == Frequency::Weekly
        ));
        assert_eq!(instruments[1].fee_rate, 0.0003);
    }

    #[test]
    fn load_run_inputs_rejects_invalid_rule() {
        let ini = VALID_INI.replace("slow_period = 8", "slow_period = 2");
        let file = write_temp_ini(&ini);
        let err = cli::load_run_inputs(file.path()).unwrap_err();
        assert!(matches!(err, StratfolioError::RuleInvalid { instrument, rule, .. }
            if instrument == "AAA" && rule == "golden"));
    }

    #[test]
    fn load_run_inputs_rejects_missing_instrument_section() {
        let ini = VALID_INI.replace("instruments = AAA,BBB", "instruments = AAA,BBB,CCC");
        let file = write_temp_ini(&ini);
        let err = cli::load_run_inputs(file.path()).unwrap_err();
        assert!(matches!(err, StratfolioError::ConfigMissing { section, .. } if section == "instrument.CCC"));
    }

    #[test]
    fn load_run_inputs_rejects_bad_calendar() {
        let ini = VALID_INI.replace("calendar = outer", "calendar = sideways");
        let file = write_temp_ini(&ini);
        let err = cli::load_run_inputs(file.path()).unwrap_err();
        assert!(matches!(err, StratfolioError::ConfigInvalid { key, .. } if key == "calendar"));
    }

    #[test]
    fn missing_config_file_is_parse_error() {
        let err = cli::load_run_inputs(Path::new("/nonexistent/stratfolio.ini")).unwrap_err();
        assert!(matches!(err, StratfolioError::ConfigParse { .. }));
    }
}

mod commands {
    use super::*;

    #[test]
    fn validate_accepts_valid_config() {
        let file = write_temp_ini(VALID_INI);
        assert!(cli::run_validate(file.path()).is_ok());
    }

    #[test]
    fn dry_run_reads_data_without_writing_report() {
        let file = write_temp_ini(VALID_INI);
        let data = data_dir();
        assert!(cli::run_dry_run(file.path(), data.path()).is_ok());
    }

    #[test]
    fn backtest_writes_report_files() {
        let file = write_temp_ini(VALID_INI);
        let data = data_dir();
        let out = TempDir::new().unwrap();
        let report_dir = out.path().join("report");

        cli::run_backtest(file.path(), data.path(), Some(report_dir.as_path())).unwrap();

        for name in ["trades.csv", "values.csv", "signals.csv", "metrics.csv"] {
            assert!(report_dir.join(name).exists(), "missing {}", name);
        }
        let trades = fs::read_to_string(report_dir.join("trades.csv")).unwrap();
        assert!(trades.lines().nth(1).unwrap().contains(",AAA,"));
        assert!(trades.contains(",opening"));

        let metrics = fs::read_to_string(report_dir.join("metrics.csv")).unwrap();
        assert!(metrics.contains("portfolio,total_return,"));
        assert!(metrics.contains("AAA,total_return,"));
        assert!(metrics.contains("BBB,total_return,"));
    }

    #[test]
    fn benchmark_adds_relative_metrics() {
        let ini = VALID_INI.replace("instruments = AAA,BBB", "instruments = AAA,BBB\nbenchmark = IDX");
        let file = write_temp_ini(&ini);
        let data = data_dir();
        write_price_file(data.path(), "IDX", &generate_bars("IDX", "2024-01-01", 120, 3000.0));
        let out = TempDir::new().unwrap();

        cli::run_backtest(file.path(), data.path(), Some(out.path())).unwrap();
        let metrics = fs::read_to_string(out.path().join("metrics.csv")).unwrap();
        for key in ["beta", "alpha", "tracking_error", "benchmark_return"] {
            assert!(metrics.contains(&format!("portfolio,{},", key)), "missing {}", key);
        }
        assert!(metrics.contains("AAA,beta,"));
        let values = fs::read_to_string(out.path().join("values.csv")).unwrap();
        assert!(!values.lines().any(|l| l.starts_with("IDX,")));
    }

    #[test]
    fn rule_with_bad_enabled_flag_is_rejected() {
        let ini = VALID_INI.replace("trading_day = 1", "trading_day = 1\nenabled = maybe");
        let file = write_temp_ini(&ini);
        let err = cli::run_validate(file.path()).unwrap_err();
        assert!(matches!(err, StratfolioError::RuleInvalid { rule, .. } if rule == "weekly"));
    }

    #[test]
    fn backtest_through_cli_entry_point() {
        let file = write_temp_ini(VALID_INI);
        let data = data_dir();
        let out = TempDir::new().unwrap();
        let report_dir = out.path().join("cli_report");

        let cli = Cli::try_parse_from([
            "stratfolio",
            "backtest",
            "--config",
            file.path().to_str().unwrap(),
            "--data",
            data.path().to_str().unwrap(),
            "--output",
            report_dir.to_str().unwrap(),
        ])
        .unwrap();
        assert!(!cli.verbose());
        let _ = cli::run(cli);
        assert!(report_dir.join("values.csv").exists());
    }

    #[test]
    fn missing_price_files_exclude_instruments() {
        let file = write_temp_ini(VALID_INI);
        let data = TempDir::new().unwrap();
        write_price_file(data.path(), "AAA", &generate_bars("AAA", "2024-01-01", 50, 40.0));
        let out = TempDir::new().unwrap();

        cli::run_backtest(file.path(), data.path(), Some(out.path())).unwrap();
        let values = fs::read_to_string(out.path().join("values.csv")).unwrap();
        assert!(values.lines().any(|l| l.starts_with("AAA,")));
        assert!(!values.lines().any(|l| l.starts_with("BBB,")));
    }

    #[test]
    fn no_price_files_fails() {
        let file = write_temp_ini(VALID_INI);
        let data = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        let err = cli::run_backtest(file.path(), data.path(), Some(out.path())).unwrap_err();
        assert!(matches!(err, StratfolioError::NothingToSimulate));
        assert!(!out.path().join("trades.csv").exists());
    }
}
