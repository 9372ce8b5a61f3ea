//! Configuration validation.
//!
//! `validate_backtest_config` checks the raw `[backtest]` section before any
//! parsing into domain types; `validate_instruments` checks the parsed
//! instruments and their rules. Both run before any date is simulated.

use std::collections::HashSet;

use crate::domain::error::StratfolioError;
use crate::domain::instrument::Instrument;
use crate::domain::rule::{RuleKind, Sizing, StrategyRule};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), StratfolioError> {
    validate_risk_free_rate(config)?;
    validate_dates(config)?;
    validate_choice(config, "calendar", &["outer", "inner"])?;
    validate_choice(config, "same_day", &["net", "both_legs"])?;
    validate_instrument_sections(config)?;
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), StratfolioError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(StratfolioError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "risk_free_rate".to_string(),
            reason: "risk_free_rate must be between 0 and 1".to_string(),
        });
    }
    Ok(())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), StratfolioError> {
    let start_str = config.get_string("backtest", "start_date");
    let end_str = config.get_string("backtest", "end_date");

    let start_date = parse_date(start_str.as_deref(), "start_date")?;
    let end_date = parse_date(end_str.as_deref(), "end_date")?;

    if start_date >= end_date {
        return Err(StratfolioError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "start_date".to_string(),
            reason: "start_date must be before end_date".to_string(),
        });
    }
    Ok(())
}

pub fn parse_date(value: Option<&str>, field: &str) -> Result<NaiveDate, StratfolioError> {
    match value {
        None => Err(StratfolioError::ConfigMissing {
            section: "backtest".to_string(),
            key: field.to_string(),
        }),
        Some(s) => {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| StratfolioError::ConfigInvalid {
                section: "backtest".to_string(),
                key: field.to_string(),
                reason: format!("invalid {} format, expected YYYY-MM-DD", field),
            })
        }
    }
}

fn validate_choice(
    config: &dyn ConfigPort,
    key: &str,
    allowed: &[&str],
) -> Result<(), StratfolioError> {
    match config.get_string("backtest", key) {
        None => Ok(()),
        Some(v) if allowed.contains(&v.to_lowercase().as_str()) => Ok(()),
        Some(v) => Err(StratfolioError::ConfigInvalid {
            section: "backtest".to_string(),
            key: key.to_string(),
            reason: format!("'{}' is not one of {}", v, allowed.join(", ")),
        }),
    }
}

fn validate_instrument_sections(config: &dyn ConfigPort) -> Result<(), StratfolioError> {
    let codes = config.get_list("backtest", "instruments");
    if codes.is_empty() {
        return Err(StratfolioError::ConfigMissing {
            section: "backtest".to_string(),
            key: "instruments".to_string(),
        });
    }
    for code in &codes {
        let section = format!("instrument.{}", code);
        if !config.has_section(&section) {
            return Err(StratfolioError::ConfigMissing {
                section,
                key: "max_investment".to_string(),
            });
        }
    }
    Ok(())
}

/// Check every instrument and rule, and that codes are unique.
pub fn validate_instruments(instruments: &[Instrument]) -> Result<(), StratfolioError> {
    let mut seen = HashSet::new();
    for instrument in instruments {
        if !seen.insert(instrument.code.as_str()) {
            return Err(StratfolioError::InstrumentInvalid {
                instrument: instrument.code.clone(),
                reason: "instrument listed more than once".to_string(),
            });
        }
        validate_instrument(instrument)?;
    }
    Ok(())
}

pub fn validate_instrument(instrument: &Instrument) -> Result<(), StratfolioError> {
    let invalid = |reason: &str| StratfolioError::InstrumentInvalid {
        instrument: instrument.code.clone(),
        reason: reason.to_string(),
    };

    if instrument.code.trim().is_empty() {
        return Err(invalid("code must not be empty"));
    }
    if !(0.0..1.0).contains(&instrument.fee_rate) {
        return Err(invalid("fee_rate must be in [0, 1)"));
    }
    if !instrument.initial_investment.is_finite() || instrument.initial_investment < 0.0 {
        return Err(invalid("initial_investment must be non-negative"));
    }
    if !instrument.max_investment.is_finite() || instrument.max_investment < 0.0 {
        return Err(invalid("max_investment must be non-negative"));
    }

    let mut ids = HashSet::new();
    for rule in &instrument.rules {
        if !ids.insert(rule.id.as_str()) {
            return Err(StratfolioError::RuleInvalid {
                instrument: instrument.code.clone(),
                rule: rule.id.clone(),
                reason: "duplicate rule id".to_string(),
            });
        }
        validate_rule(rule).map_err(|reason| StratfolioError::RuleInvalid {
            instrument: instrument.code.clone(),
            rule: rule.id.clone(),
            reason,
        })?;
    }
    Ok(())
}

fn validate_rule(rule: &StrategyRule) -> Result<(), String> {
    match rule.sizing {
        Sizing::Amount(a) if !a.is_finite() || a <= 0.0 => {
            return Err("trade_amount must be positive".to_string());
        }
        Sizing::Shares(0) => return Err("trade_shares must be positive".to_string()),
        _ => {}
    }

    match &rule.kind {
        RuleKind::TimeBased(p) => {
            if p.trading_day == 0 {
                return Err("trading_day must be at least 1".to_string());
            }
        }
        RuleKind::CrossPattern(p) => {
            if p.fast_period == 0 || p.slow_period == 0 || p.signal_period == 0 {
                return Err("periods must be positive".to_string());
            }
            if p.fast_period >= p.slow_period {
                return Err("fast_period must be below slow_period".to_string());
            }
            if p.patterns.is_empty() {
                return Err("at least one pattern is required".to_string());
            }
            if p.double_cross_lookback == 0 || p.divergence_lookback == 0 {
                return Err("lookbacks must be at least 1".to_string());
            }
        }
        RuleKind::ThresholdTouch(p) => {
            if p.ma_periods.is_empty() {
                return Err("at least one ma_period is required".to_string());
            }
            if p.ma_periods.contains(&0) {
                return Err("ma_periods must be positive".to_string());
            }
            if !p.touch_threshold.is_finite() || p.touch_threshold < 0.0 {
                return Err("touch_threshold must be non-negative".to_string());
            }
        }
    }
    Ok(())
}
