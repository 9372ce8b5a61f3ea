//! Parameter sweeps over instrument configurations.
//!
//! Each job is an independent single-instrument backtest against series that
//! are already in memory. Jobs run in parallel unless disabled; results keep
//! job order. A shared stop flag is checked before each job starts: jobs that
//! see it set report `NotStarted`, jobs already running complete.

use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::backtest::{BacktestConfig, run_on_series};
use super::error::StratfolioError;
use super::instrument::Instrument;
use super::metrics::Metrics;
use super::ohlcv::OhlcvBar;
use super::rule::RuleKind;

#[derive(Debug, Clone, PartialEq)]
pub struct SweepJob {
    pub label: String,
    pub instrument: Instrument,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepOutcome {
    Completed(Box<Metrics>),
    Failed(String),
    NotStarted,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SweepResult {
    pub label: String,
    pub outcome: SweepOutcome,
}

impl SweepResult {
    pub fn metrics(&self) -> Option<&Metrics> {
        match &self.outcome {
            SweepOutcome::Completed(m) => Some(m),
            _ => None,
        }
    }
}

/// Copies of `base` with the cross-pattern rule `rule_id` set to every
/// fast/slow combination with fast < slow.
pub fn cross_pattern_grid(
    base: &Instrument,
    rule_id: &str,
    fast_periods: &[usize],
    slow_periods: &[usize],
) -> Result<Vec<SweepJob>, StratfolioError> {
    let position = base.rules.iter().position(|r| r.id == rule_id);
    let index = match position {
        Some(i) if matches!(base.rules[i].kind, RuleKind::CrossPattern(_)) => i,
        _ => {
            return Err(StratfolioError::RuleInvalid {
                instrument: base.code.clone(),
                rule: rule_id.to_string(),
                reason: "no cross_pattern rule with this id".to_string(),
            });
        }
    };

    let mut jobs = Vec::new();
    for &fast in fast_periods {
        for &slow in slow_periods {
            if fast >= slow {
                continue;
            }
            let mut instrument = base.clone();
            if let RuleKind::CrossPattern(params) = &mut instrument.rules[index].kind {
                params.fast_period = fast;
                params.slow_period = slow;
            }
            jobs.push(SweepJob {
                label: format!("{}:{}:{}/{}", base.code, rule_id, fast, slow),
                instrument,
            });
        }
    }
    Ok(jobs)
}

pub struct ParamSweep {
    parallel: bool,
}

impl Default for ParamSweep {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamSweep {
    pub fn new() -> Self {
        Self { parallel: true }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn run(
        &self,
        config: &BacktestConfig,
        jobs: &[SweepJob],
        series: &HashMap<String, Vec<OhlcvBar>>,
        stop: Option<&AtomicBool>,
    ) -> Vec<SweepResult> {
        info!(jobs = jobs.len(), parallel = self.parallel, "starting sweep");

        let run_one = |job: &SweepJob| -> SweepResult {
            if stop.is_some_and(|f| f.load(Ordering::Relaxed)) {
                return SweepResult {
                    label: job.label.clone(),
                    outcome: SweepOutcome::NotStarted,
                };
            }
            let outcome =
                match run_on_series(config, std::slice::from_ref(&job.instrument), series) {
                    Ok(report) => SweepOutcome::Completed(Box::new(report.metrics)),
                    Err(e) => SweepOutcome::Failed(e.to_string()),
                };
            debug!(job = %job.label, "sweep job finished");
            SweepResult {
                label: job.label.clone(),
                outcome,
            }
        };

        let results: Vec<SweepResult> = if self.parallel {
            jobs.par_iter().map(run_one).collect()
        } else {
            jobs.iter().map(run_one).collect()
        };

        let completed = results.iter().filter(|r| r.metrics().is_some()).count();
        info!(completed, total = results.len(), "sweep finished");
        results
    }
}
