//! Moving-average touch: close within a band around any selected SMA.

use crate::domain::indicator::calculate_sma;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::rule::TouchParams;
use crate::domain::signal::SignalRule;

impl SignalRule for TouchParams {
    fn fires(&self, bars: &[OhlcvBar]) -> Vec<bool> {
        let averages: Vec<_> = self
            .ma_periods
            .iter()
            .map(|&period| calculate_sma(bars, period))
            .collect();

        bars.iter()
            .enumerate()
            .map(|(i, bar)| {
                averages.iter().any(|series| match series.simple_at(i) {
                    Some(ma) if ma > 0.0 => {
                        (bar.close - ma).abs() / ma <= self.touch_threshold
                    }
                    _ => false,
                })
            })
            .collect()
    }
}
