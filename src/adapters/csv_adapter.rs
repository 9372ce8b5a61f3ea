//! CSV file data adapter.
//!
//! One file per instrument at `<base>/<CODE>.csv` with the header
//! `date,open,high,low,close,volume`. Empty price fields load as NaN so the
//! ledger treats them as skipped days; a missing file loads as an empty series.

use crate::domain::error::StratfolioError;
use crate::domain::ohlcv::OhlcvBar;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::warn;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }
}

fn field<'r>(record: &'r csv::StringRecord, index: usize, name: &str) -> Result<&'r str, StratfolioError> {
    record
        .get(index)
        .map(str::trim)
        .ok_or_else(|| StratfolioError::DataSource {
            reason: format!("missing {} column", name),
        })
}

fn parse_price(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, StratfolioError> {
    let raw = field(record, index, name)?;
    if raw.is_empty() {
        return Ok(f64::NAN);
    }
    raw.parse().map_err(|e| StratfolioError::DataSource {
        reason: format!("invalid {} value '{}': {}", name, raw, e),
    })
}

impl DataPort for CsvAdapter {
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StratfolioError> {
        let path = self.csv_path(code);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(instrument = code, path = %path.display(), "no price file");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(StratfolioError::DataSource {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| StratfolioError::DataSource {
                reason: format!("CSV parse error in {}: {}", path.display(), e),
            })?;

            let date_str = field(&record, 0, "date")?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                StratfolioError::DataSource {
                    reason: format!("invalid date '{}' in {}: {}", date_str, path.display(), e),
                }
            })?;

            if date < start_date || date > end_date {
                continue;
            }

            let volume_str = field(&record, 5, "volume")?;
            let volume: i64 = if volume_str.is_empty() {
                0
            } else {
                volume_str
                    .parse::<f64>()
                    .map(|v| v as i64)
                    .map_err(|e| StratfolioError::DataSource {
                        reason: format!("invalid volume value '{}': {}", volume_str, e),
                    })?
            };

            bars.push(OhlcvBar {
                code: code.to_string(),
                date,
                open: parse_price(&record, 1, "open")?,
                high: parse_price(&record, 2, "high")?,
                low: parse_price(&record, 3, "low")?,
                close: parse_price(&record, 4, "close")?,
                volume,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(bars)
    }
}
