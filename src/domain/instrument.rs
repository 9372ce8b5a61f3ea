//! Per-instrument configuration.

use crate::domain::rule::StrategyRule;

#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    pub code: String,
    pub fee_rate: f64,
    /// Value of the opening position bought at the first bar; 0 disables it.
    pub initial_investment: f64,
    /// Cash pool for this instrument; not shared with other instruments.
    pub max_investment: f64,
    pub rules: Vec<StrategyRule>,
}

impl Instrument {
    pub fn enabled_rules(&self) -> impl Iterator<Item = &StrategyRule> {
        self.rules.iter().filter(|r| r.enabled)
    }
}
