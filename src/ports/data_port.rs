//! Price-series access port trait.

use crate::domain::error::StratfolioError;
use crate::domain::ohlcv::OhlcvBar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Daily bars for `code` within `[start_date, end_date]`, sorted by date.
    /// Gaps are absent dates; nothing is forward-filled.
    fn fetch_ohlcv(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<OhlcvBar>, StratfolioError>;
}
