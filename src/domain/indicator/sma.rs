//! Simple Moving Average over closes.
//!
//! SMA = mean of the last n tradable closes. Bars without a tradable close
//! stay out of the window; their point is invalid and carries the previous
//! average. A point is in warmup until n tradable closes have been seen.

use std::collections::VecDeque;

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::OhlcvBar;

pub fn calculate_sma(bars: &[OhlcvBar], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(bars.len());
    let mut window: VecDeque<f64> = VecDeque::with_capacity(period);
    let mut sum = 0.0;
    let mut last = 0.0;

    for bar in bars {
        let mut valid = false;
        if period > 0 && bar.is_tradable() {
            window.push_back(bar.close);
            sum += bar.close;
            if window.len() > period {
                if let Some(oldest) = window.pop_front() {
                    sum -= oldest;
                }
            }
            if window.len() == period {
                last = sum / period as f64;
                valid = true;
            }
        }

        values.push(IndicatorPoint {
            date: bar.date,
            valid,
            value: IndicatorValue::Simple(last),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
}
