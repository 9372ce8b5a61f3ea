//! Portfolio composition across instruments.
//!
//! Each instrument runs its own ledger with its own cash pool. Runs are
//! independent and execute in parallel; results are kept in configuration
//! order. The composed equity curve is the per-date sum of instrument values.

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

use super::error::StratfolioError;
use super::instrument::Instrument;
use super::ledger::{InstrumentResult, SameDayPolicy, Trade, simulate};
use super::ohlcv::OhlcvBar;

/// Which dates make up the composed calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalendarAlignment {
    /// Union of all dates; an instrument with no bar on a date contributes 0.
    #[default]
    Outer,
    /// Only dates every instrument has a bar for.
    Inner,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
}

/// An instrument was zero-padded on dates it has no bar for.
#[derive(Debug, Clone, PartialEq)]
pub struct CalendarWarning {
    pub instrument: String,
    pub padded_dates: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedInstrument {
    pub code: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PortfolioResult {
    pub instruments: Vec<InstrumentResult>,
    pub equity_curve: Vec<EquityPoint>,
    pub trades: Vec<Trade>,
    pub warnings: Vec<CalendarWarning>,
    pub excluded: Vec<ExcludedInstrument>,
}

impl PortfolioResult {
    pub fn instrument(&self, code: &str) -> Option<&InstrumentResult> {
        self.instruments.iter().find(|r| r.code == code)
    }
}

/// Simulate every instrument against its bars and compose the results.
///
/// Instruments whose series fails validation (or is missing) are excluded
/// with a reason. Fails only when nothing is left to compose.
pub fn run_portfolio(
    instruments: &[Instrument],
    series: &HashMap<String, Vec<OhlcvBar>>,
    alignment: CalendarAlignment,
    policy: SameDayPolicy,
) -> Result<PortfolioResult, StratfolioError> {
    let outcomes: Vec<Result<InstrumentResult, StratfolioError>> = instruments
        .par_iter()
        .map(|instrument| {
            let bars = series
                .get(&instrument.code)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            simulate(instrument, bars, policy)
        })
        .collect();

    let mut results = Vec::with_capacity(outcomes.len());
    let mut excluded = Vec::new();
    for (instrument, outcome) in instruments.iter().zip(outcomes) {
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                warn!(instrument = %instrument.code, error = %e, "instrument excluded");
                excluded.push(ExcludedInstrument {
                    code: instrument.code.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let mut composed = compose(results, alignment)?;
    composed.excluded = excluded;
    Ok(composed)
}

/// Sum instrument value series over the aligned calendar and concatenate
/// trade logs in input order.
pub fn compose(
    results: Vec<InstrumentResult>,
    alignment: CalendarAlignment,
) -> Result<PortfolioResult, StratfolioError> {
    if results.is_empty() {
        return Err(StratfolioError::NothingToSimulate);
    }

    let calendar = aligned_calendar(&results, alignment);
    let mut totals: BTreeMap<NaiveDate, f64> = calendar.iter().map(|d| (*d, 0.0)).collect();
    let mut warnings = Vec::new();

    for result in &results {
        let mut present = 0usize;
        for row in &result.rows {
            if let Some(total) = totals.get_mut(&row.date) {
                *total += row.portfolio_value;
                present += 1;
            }
        }
        let padded = calendar.len() - present;
        if padded > 0 {
            warn!(
                instrument = %result.code,
                padded_dates = padded,
                "instrument has no bar on some portfolio dates, valued at 0"
            );
            warnings.push(CalendarWarning {
                instrument: result.code.clone(),
                padded_dates: padded,
            });
        }
    }

    let equity_curve = totals
        .into_iter()
        .map(|(date, equity)| EquityPoint { date, equity })
        .collect();
    let trades = results.iter().flat_map(|r| r.trades.iter().cloned()).collect();

    Ok(PortfolioResult {
        instruments: results,
        equity_curve,
        trades,
        warnings,
        excluded: Vec::new(),
    })
}

fn aligned_calendar(results: &[InstrumentResult], alignment: CalendarAlignment) -> BTreeSet<NaiveDate> {
    let mut sets = results
        .iter()
        .map(|r| r.rows.iter().map(|row| row.date).collect::<BTreeSet<_>>());

    let Some(first) = sets.next() else {
        return BTreeSet::new();
    };

    sets.fold(first, |acc, dates| match alignment {
        CalendarAlignment::Outer => acc.union(&dates).copied().collect(),
        CalendarAlignment::Inner => acc.intersection(&dates).copied().collect(),
    })
}
