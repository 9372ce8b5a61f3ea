#![allow(dead_code)]

use chrono::NaiveDate;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use stratfolio::domain::backtest::BacktestConfig;
use stratfolio::domain::error::StratfolioError;
use stratfolio::domain::instrument::Instrument;
use stratfolio::domain::ledger::SameDayPolicy;
pub use stratfolio::domain::ohlcv::OhlcvBar;
use stratfolio::domain::portfolio::CalendarAlignment;
use stratfolio::domain::rule::{Direction, Frequency, RuleKind, Sizing, StrategyRule, TimeBasedParams};
use stratfolio::ports::data_port::DataPort;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<OhlcvBar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, code: &str, bars: Vec<OhlcvBar>) -> Self {
        self.data.insert(code.to_string(), bars);
        self
    }

    pub fn with_error(mut self, code: &str, reason: &str) -> Self {
        self.errors.insert(code.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StratfolioError> {
        if let Some(reason) = self.errors.get(code) {
            return Err(StratfolioError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(code)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn make_bar(code: &str, date: &str, close: f64) -> OhlcvBar {
    OhlcvBar {
        code: code.to_string(),
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume: 1000,
    }
}

/// One bar per calendar day starting at `start_date`, closing at `closes`.
pub fn bars_from_closes(code: &str, start_date: &str, closes: &[f64]) -> Vec<OhlcvBar> {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| OhlcvBar {
            code: code.to_string(),
            date: start + chrono::Duration::days(i as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000,
        })
        .collect()
}

/// A smooth oscillating series with regular MACD crosses.
pub fn generate_bars(code: &str, start_date: &str, count: usize, start_price: f64) -> Vec<OhlcvBar> {
    let closes: Vec<f64> = (0..count)
        .map(|i| start_price + (i as f64 / 6.0).sin() * start_price * 0.1 + i as f64 * 0.05)
        .collect();
    bars_from_closes(code, start_date, &closes)
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        start_date: date(2020, 1, 1),
        end_date: date(2024, 12, 31),
        risk_free_rate: 0.0,
        alignment: CalendarAlignment::Outer,
        same_day: SameDayPolicy::Net,
        benchmark: None,
    }
}

pub fn instrument(code: &str, max_investment: f64, rules: Vec<StrategyRule>) -> Instrument {
    Instrument {
        code: code.to_string(),
        fee_rate: 0.0,
        initial_investment: 0.0,
        max_investment,
        rules,
    }
}

pub fn time_rule(id: &str, direction: Direction, frequency: Frequency, sizing: Sizing) -> StrategyRule {
    StrategyRule {
        id: id.to_string(),
        direction,
        kind: RuleKind::TimeBased(TimeBasedParams {
            frequency,
            trading_day: 1,
        }),
        enabled: true,
        sizing,
    }
}

pub fn series_of(entries: Vec<(&str, Vec<OhlcvBar>)>) -> HashMap<String, Vec<OhlcvBar>> {
    entries
        .into_iter()
        .map(|(code, bars)| (code.to_string(), bars))
        .collect()
}

/// Write `<dir>/<code>.csv` in the price-file layout.
pub fn write_price_file(dir: &Path, code: &str, bars: &[OhlcvBar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for bar in bars {
        writeln!(
            content,
            "{},{},{},{},{},{}",
            bar.date, bar.open, bar.high, bar.low, bar.close, bar.volume
        )
        .unwrap();
    }
    std::fs::write(dir.join(format!("{}.csv", code)), content).unwrap();
}
