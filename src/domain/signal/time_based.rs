//! Calendar rules: fire on the Nth trading bar of each period.

use chrono::Datelike;

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::rule::{Frequency, TimeBasedParams};
use crate::domain::signal::SignalRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PeriodKey {
    Week(i32, u32),
    Month(i32, u32),
    Whole,
}

fn period_key(frequency: Frequency, bar: &OhlcvBar) -> Option<PeriodKey> {
    match frequency {
        Frequency::Daily => None,
        Frequency::Weekly => {
            let week = bar.date.iso_week();
            Some(PeriodKey::Week(week.year(), week.week()))
        }
        Frequency::Monthly => Some(PeriodKey::Month(bar.date.year(), bar.date.month())),
        Frequency::Once => Some(PeriodKey::Whole),
    }
}

impl SignalRule for TimeBasedParams {
    fn fires(&self, bars: &[OhlcvBar]) -> Vec<bool> {
        if self.frequency == Frequency::Daily {
            return vec![true; bars.len()];
        }

        let mut mask = Vec::with_capacity(bars.len());
        let mut current: Option<PeriodKey> = None;
        let mut occurrence = 0usize;

        for bar in bars {
            let key = period_key(self.frequency, bar);
            if key != current {
                current = key;
                occurrence = 0;
            }
            occurrence += 1;
            mask.push(occurrence == self.trading_day);
        }

        mask
    }
}
