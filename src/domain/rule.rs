//! Strategy rule configuration.
//!
//! - `StrategyRule`: one independently enableable signal generator
//! - `RuleKind`: tagged variant over the supported rule kinds
//! - `Sizing`: how a firing bar is converted into a notional

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sizing {
    /// Fixed notional per firing bar.
    Amount(f64),
    /// Fixed share count per firing bar, converted at close including fees.
    Shares(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    /// The Nth bar of the whole series.
    Once,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeBasedParams {
    pub frequency: Frequency,
    /// 1-based occurrence within the period.
    pub trading_day: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrossPattern {
    GoldenCross,
    DeathCross,
    DoubleGoldenCross,
    DoubleDeathCross,
    BullishDivergence,
    BearishDivergence,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrossPatternParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
    pub patterns: Vec<CrossPattern>,
    pub double_cross_lookback: usize,
    pub divergence_lookback: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TouchParams {
    pub ma_periods: Vec<usize>,
    /// Band as a fraction of the moving average (0.02 = 2%).
    pub touch_threshold: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuleKind {
    TimeBased(TimeBasedParams),
    CrossPattern(CrossPatternParams),
    ThresholdTouch(TouchParams),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRule {
    pub id: String,
    pub direction: Direction,
    pub kind: RuleKind,
    pub enabled: bool,
    pub sizing: Sizing,
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::TimeBased(_) => "time_based",
            RuleKind::CrossPattern(_) => "cross_pattern",
            RuleKind::ThresholdTouch(_) => "threshold_touch",
        }
    }
}

impl Default for TimeBasedParams {
    fn default() -> Self {
        Self {
            frequency: Frequency::Monthly,
            trading_day: 1,
        }
    }
}

impl Default for CrossPatternParams {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
            patterns: vec![CrossPattern::GoldenCross],
            double_cross_lookback: 10,
            divergence_lookback: 20,
        }
    }
}

impl Default for TouchParams {
    fn default() -> Self {
        Self {
            ma_periods: vec![5, 10, 20, 30, 60],
            touch_threshold: 0.02,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Direction::Buy),
            "sell" => Ok(Direction::Sell),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            "once" => Ok(Frequency::Once),
            other => Err(format!("unknown frequency '{}'", other)),
        }
    }
}

impl fmt::Display for CrossPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CrossPattern::GoldenCross => "golden_cross",
            CrossPattern::DeathCross => "death_cross",
            CrossPattern::DoubleGoldenCross => "double_golden_cross",
            CrossPattern::DoubleDeathCross => "double_death_cross",
            CrossPattern::BullishDivergence => "bullish_divergence",
            CrossPattern::BearishDivergence => "bearish_divergence",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for CrossPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "golden_cross" => Ok(CrossPattern::GoldenCross),
            "death_cross" => Ok(CrossPattern::DeathCross),
            "double_golden_cross" => Ok(CrossPattern::DoubleGoldenCross),
            "double_death_cross" => Ok(CrossPattern::DoubleDeathCross),
            "bullish_divergence" => Ok(CrossPattern::BullishDivergence),
            "bearish_divergence" => Ok(CrossPattern::BearishDivergence),
            other => Err(format!("unknown pattern '{}'", other)),
        }
    }
}
