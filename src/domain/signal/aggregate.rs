//! Netting of all enabled rule outputs for one instrument.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::domain::instrument::Instrument;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::rule::Direction;
use crate::domain::signal::{RuleSignal, generate};

/// Raw buy and sell totals for one date; `net()` is what the ledger trades.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NetSignal {
    pub date: NaiveDate,
    pub buy_amount: f64,
    pub sell_amount: f64,
}

impl NetSignal {
    pub fn flat(date: NaiveDate) -> Self {
        Self {
            date,
            buy_amount: 0.0,
            sell_amount: 0.0,
        }
    }

    /// Positive is a net buy, negative a net sell, zero no action.
    pub fn net(&self) -> f64 {
        self.buy_amount - self.sell_amount
    }
}

/// Sum rule outputs per date. Every signal must have one amount per bar.
pub fn aggregate(bars: &[OhlcvBar], signals: &[RuleSignal]) -> Vec<NetSignal> {
    let mut out: Vec<NetSignal> = bars.iter().map(|b| NetSignal::flat(b.date)).collect();

    for signal in signals {
        debug_assert_eq!(signal.amounts.len(), bars.len());
        for (entry, amount) in out.iter_mut().zip(&signal.amounts) {
            match signal.direction {
                Direction::Buy => entry.buy_amount += amount,
                Direction::Sell => entry.sell_amount += amount,
            }
        }
    }

    out
}

/// Generate every enabled rule of `instrument` once, then net them.
pub fn net_signals(instrument: &Instrument, bars: &[OhlcvBar]) -> Vec<NetSignal> {
    let signals: Vec<RuleSignal> = instrument
        .enabled_rules()
        .map(|rule| {
            let signal = generate(rule, bars, instrument.fee_rate);
            debug!(
                instrument = %instrument.code,
                rule = %signal.rule_id,
                direction = %signal.direction,
                fired = signal.firing_count(),
                "rule evaluated"
            );
            signal
        })
        .collect();

    aggregate(bars, &signals)
}
