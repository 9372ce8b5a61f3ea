//! Signal generation.
//!
//! Each rule kind turns the full bar series into a per-bar firing mask that
//! does not depend on portfolio state. Firing bars are then priced through the
//! rule's `Sizing` into a notional, and `aggregate` nets all enabled rules of
//! an instrument into one signed amount per date.

pub mod aggregate;
pub mod cross_pattern;
pub mod threshold_touch;
pub mod time_based;

pub use aggregate::{NetSignal, aggregate, net_signals};

use crate::domain::ohlcv::OhlcvBar;
use crate::domain::rule::{Direction, RuleKind, Sizing, StrategyRule};

/// A rule kind that can be evaluated over a bar series.
pub trait SignalRule {
    /// One entry per bar; `true` where the rule fires.
    fn fires(&self, bars: &[OhlcvBar]) -> Vec<bool>;
}

impl SignalRule for RuleKind {
    fn fires(&self, bars: &[OhlcvBar]) -> Vec<bool> {
        match self {
            RuleKind::TimeBased(params) => params.fires(bars),
            RuleKind::CrossPattern(params) => params.fires(bars),
            RuleKind::ThresholdTouch(params) => params.fires(bars),
        }
    }
}

/// Output of one rule over one instrument: a notional per bar, 0 where it did not fire.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSignal {
    pub rule_id: String,
    pub direction: Direction,
    pub amounts: Vec<f64>,
}

impl RuleSignal {
    pub fn firing_count(&self) -> usize {
        self.amounts.iter().filter(|a| **a > 0.0).count()
    }
}

/// Notional of one firing bar at `close`.
pub fn notional(sizing: Sizing, close: f64, fee_rate: f64) -> f64 {
    match sizing {
        Sizing::Amount(amount) => amount,
        Sizing::Shares(shares) => shares as f64 * close * (1.0 + fee_rate),
    }
}

/// Evaluate one rule over `bars`. Bars without a tradable close never fire.
pub fn generate(rule: &StrategyRule, bars: &[OhlcvBar], fee_rate: f64) -> RuleSignal {
    let mask = rule.kind.fires(bars);
    let amounts = bars
        .iter()
        .zip(mask)
        .map(|(bar, fired)| {
            if fired && bar.is_tradable() {
                notional(rule.sizing, bar.close, fee_rate)
            } else {
                0.0
            }
        })
        .collect();

    RuleSignal {
        rule_id: rule.id.clone(),
        direction: rule.direction,
        amounts,
    }
}
