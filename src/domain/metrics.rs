//! Performance metrics over a finished equity curve.
//!
//! Daily returns are the percentage change of the curve; annualization uses
//! 252 trading days throughout. The cumulative series is anchored at 1.0 on
//! the first date so drawdowns can start from day one.

use chrono::{Datelike, NaiveDate};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::ledger::Trade;
use super::portfolio::EquityPoint;
use super::rule::Direction;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Cumulative values this close are the same level; absorbs compounding error.
const LEVEL_TOLERANCE: f64 = 1e-12;

/// How the maximum drawdown ended.
///
/// `days` is the index distance from the trough bar to the recovery bar, not
/// an inclusive bar count: [100, 120, 90, 80, 110, 130] recovers in 2 days.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Recovery {
    Recovered { date: NaiveDate, days: usize },
    Unrecovered,
}

/// The maximum drawdown as peak, trough and recovery.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawdownEpisode {
    pub peak_date: NaiveDate,
    pub trough_date: NaiveDate,
    pub recovery: Recovery,
    /// Negative fraction, e.g. -0.25 for a 25% drawdown.
    pub magnitude: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub trading_days: usize,
    pub total_return: f64,
    pub annualized_return: f64,
    pub annualized_volatility: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub max_drawdown: f64,
    pub drawdown: Option<DrawdownEpisode>,
    pub current_drawdown: f64,
    pub longest_underwater: usize,
    /// Completed drawdown periods, in calendar days from first dip to recovery.
    pub drawdown_periods: usize,
    pub avg_drawdown_duration: f64,
    pub max_drawdown_duration: i64,
    pub var_95: f64,
    pub var_99: f64,
    pub cvar_95: f64,
    pub cvar_99: f64,
    pub skewness: f64,
    /// Excess kurtosis (0 for a normal distribution).
    pub kurtosis: f64,
    pub best_day: f64,
    pub worst_day: f64,
    pub best_month: f64,
    pub worst_month: f64,
    pub positive_days: usize,
    pub negative_days: usize,
    pub daily_win_rate: f64,
    pub avg_win_day: f64,
    pub avg_loss_day: f64,
    pub trade_count: usize,
    pub buy_count: usize,
    pub sell_count: usize,
    pub total_commission: f64,
    pub turnover: f64,
    pub benchmark: Option<BenchmarkMetrics>,
}

/// Performance relative to a benchmark price curve, over the dates both
/// return series share.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkMetrics {
    pub common_days: usize,
    pub alpha: f64,
    pub beta: f64,
    pub correlation: f64,
    pub tracking_error: f64,
    pub information_ratio: f64,
    /// Strategy total return minus benchmark total return.
    pub excess_return: f64,
    pub benchmark_return: f64,
}

/// A single entry of `Metrics::to_map`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Number(f64),
    Count(usize),
    Date(NaiveDate),
    Flag(bool),
}

impl Metrics {
    pub fn compute(
        equity_curve: &[EquityPoint],
        trades: &[Trade],
        risk_free_rate: f64,
        benchmark: Option<&[EquityPoint]>,
    ) -> Self {
        let returns = daily_returns(equity_curve);
        let n = returns.len();

        let total_return = returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;
        let annualized_return = annualize(total_return, n);

        let volatility = sample_std(&returns);
        let annualized_volatility = volatility * TRADING_DAYS_PER_YEAR.sqrt();
        let sharpe_ratio = if annualized_volatility > 0.0 {
            (annualized_return - risk_free_rate) / annualized_volatility
        } else {
            0.0
        };

        let negatives: Vec<f64> = returns.iter().copied().filter(|r| *r < 0.0).collect();
        let positives: Vec<f64> = returns.iter().copied().filter(|r| *r > 0.0).collect();
        let downside = sample_std(&negatives) * TRADING_DAYS_PER_YEAR.sqrt();
        let sortino_ratio = if downside > 0.0 {
            (annualized_return - risk_free_rate) / downside
        } else {
            0.0
        };

        let cum = cumulative(&returns);
        let underwater = underwater(&cum);
        let max_drawdown = match underwater.iter().copied().fold(0.0, f64::min) {
            dd if dd > -LEVEL_TOLERANCE => 0.0,
            dd => dd,
        };
        let calmar_ratio = if max_drawdown < 0.0 {
            annualized_return / max_drawdown.abs()
        } else {
            0.0
        };
        let dates: Vec<NaiveDate> = equity_curve.iter().map(|p| p.date).collect();
        let drawdown = drawdown_episode(&dates, &cum);

        let mut longest_underwater = 0usize;
        let mut stretch = 0usize;
        for dd in &underwater {
            if *dd < -LEVEL_TOLERANCE {
                stretch += 1;
                longest_underwater = longest_underwater.max(stretch);
            } else {
                stretch = 0;
            }
        }

        let durations = drawdown_durations(&dates, &underwater);
        let monthly = monthly_returns(&dated_returns(equity_curve));

        let mut sorted = returns.clone();
        sorted.sort_by(f64::total_cmp);
        let var_95 = quantile(&sorted, 0.05);
        let var_99 = quantile(&sorted, 0.01);

        let buy_count = trades.iter().filter(|t| t.direction == Direction::Buy).count();
        let traded_notional: f64 = trades.iter().map(|t| t.notional).sum();
        let mean_equity = mean(&equity_curve.iter().map(|p| p.equity).collect::<Vec<_>>());

        Metrics {
            trading_days: n,
            total_return,
            annualized_return,
            annualized_volatility,
            sharpe_ratio,
            sortino_ratio,
            calmar_ratio,
            max_drawdown,
            drawdown,
            current_drawdown: underwater.last().copied().unwrap_or(0.0),
            longest_underwater,
            drawdown_periods: durations.len(),
            avg_drawdown_duration: if durations.is_empty() {
                0.0
            } else {
                durations.iter().sum::<i64>() as f64 / durations.len() as f64
            },
            max_drawdown_duration: durations.iter().copied().max().unwrap_or(0),
            var_95,
            var_99,
            cvar_95: tail_mean(&sorted, var_95),
            cvar_99: tail_mean(&sorted, var_99),
            skewness: skewness(&returns),
            kurtosis: kurtosis(&returns),
            best_day: returns.iter().copied().reduce(f64::max).unwrap_or(0.0),
            worst_day: returns.iter().copied().reduce(f64::min).unwrap_or(0.0),
            best_month: monthly.iter().copied().reduce(f64::max).unwrap_or(0.0),
            worst_month: monthly.iter().copied().reduce(f64::min).unwrap_or(0.0),
            positive_days: positives.len(),
            negative_days: negatives.len(),
            daily_win_rate: if n > 0 {
                positives.len() as f64 / n as f64
            } else {
                0.0
            },
            avg_win_day: mean(&positives),
            avg_loss_day: mean(&negatives),
            trade_count: trades.len(),
            buy_count,
            sell_count: trades.len() - buy_count,
            total_commission: trades.iter().map(|t| t.commission).sum(),
            turnover: if mean_equity > 0.0 {
                traded_notional / mean_equity
            } else {
                0.0
            },
            benchmark: benchmark
                .and_then(|curve| BenchmarkMetrics::compute(equity_curve, curve, risk_free_rate)),
        }
    }

    /// Flat name/value view for reporting. Recovery keys are omitted when the
    /// drawdown never recovered; `drawdown_recovered` distinguishes the cases.
    pub fn to_map(&self) -> BTreeMap<String, MetricValue> {
        use MetricValue::{Count, Date, Flag, Number};

        let mut map = BTreeMap::new();
        let mut put = |key: &str, value: MetricValue| {
            map.insert(key.to_string(), value);
        };

        put("trading_days", Count(self.trading_days));
        put("total_return", Number(self.total_return));
        put("annualized_return", Number(self.annualized_return));
        put("annualized_volatility", Number(self.annualized_volatility));
        put("sharpe_ratio", Number(self.sharpe_ratio));
        put("sortino_ratio", Number(self.sortino_ratio));
        put("calmar_ratio", Number(self.calmar_ratio));
        put("max_drawdown", Number(self.max_drawdown));
        put("current_drawdown", Number(self.current_drawdown));
        put("longest_underwater", Count(self.longest_underwater));
        put("drawdown_periods", Count(self.drawdown_periods));
        put("avg_drawdown_duration", Number(self.avg_drawdown_duration));
        put("max_drawdown_duration", Number(self.max_drawdown_duration as f64));
        put("var_95", Number(self.var_95));
        put("var_99", Number(self.var_99));
        put("cvar_95", Number(self.cvar_95));
        put("cvar_99", Number(self.cvar_99));
        put("skewness", Number(self.skewness));
        put("kurtosis", Number(self.kurtosis));
        put("best_day", Number(self.best_day));
        put("worst_day", Number(self.worst_day));
        put("best_month", Number(self.best_month));
        put("worst_month", Number(self.worst_month));
        put("positive_days", Count(self.positive_days));
        put("negative_days", Count(self.negative_days));
        put("daily_win_rate", Number(self.daily_win_rate));
        put("avg_win_day", Number(self.avg_win_day));
        put("avg_loss_day", Number(self.avg_loss_day));
        put("trade_count", Count(self.trade_count));
        put("buy_count", Count(self.buy_count));
        put("sell_count", Count(self.sell_count));
        put("total_commission", Number(self.total_commission));
        put("turnover", Number(self.turnover));

        if let Some(episode) = &self.drawdown {
            put("drawdown_peak_date", Date(episode.peak_date));
            put("drawdown_trough_date", Date(episode.trough_date));
            match episode.recovery {
                Recovery::Recovered { date, days } => {
                    put("drawdown_recovered", Flag(true));
                    put("drawdown_recovery_date", Date(date));
                    put("drawdown_recovery_days", Count(days));
                }
                Recovery::Unrecovered => put("drawdown_recovered", Flag(false)),
            }
        }

        if let Some(bench) = &self.benchmark {
            put("benchmark_common_days", Count(bench.common_days));
            put("alpha", Number(bench.alpha));
            put("beta", Number(bench.beta));
            put("correlation", Number(bench.correlation));
            put("tracking_error", Number(bench.tracking_error));
            put("information_ratio", Number(bench.information_ratio));
            put("excess_return", Number(bench.excess_return));
            put("benchmark_return", Number(bench.benchmark_return));
        }

        map
    }
}

impl BenchmarkMetrics {
    /// `None` when the two curves share no return dates.
    ///
    /// Beta falls back to 1 and correlation to 0 when a variance is zero.
    pub fn compute(
        equity_curve: &[EquityPoint],
        benchmark: &[EquityPoint],
        risk_free_rate: f64,
    ) -> Option<Self> {
        let bench_by_date: HashMap<NaiveDate, f64> = dated_returns(benchmark).into_iter().collect();
        let (strategy, bench): (Vec<f64>, Vec<f64>) = dated_returns(equity_curve)
            .into_iter()
            .filter_map(|(date, r)| bench_by_date.get(&date).map(|b| (r, *b)))
            .unzip();
        if strategy.is_empty() {
            return None;
        }

        let excess: Vec<f64> = strategy.iter().zip(&bench).map(|(s, b)| s - b).collect();
        let tracking_error = sample_std(&excess) * TRADING_DAYS_PER_YEAR.sqrt();
        let information_ratio = if tracking_error > 0.0 {
            mean(&excess) * TRADING_DAYS_PER_YEAR / tracking_error
        } else {
            0.0
        };

        let covariance = sample_cov(&strategy, &bench);
        let bench_var = sample_cov(&bench, &bench);
        let strategy_var = sample_cov(&strategy, &strategy);
        let beta = if bench_var > 0.0 { covariance / bench_var } else { 1.0 };
        let correlation = if bench_var > 0.0 && strategy_var > 0.0 {
            covariance / (bench_var * strategy_var).sqrt()
        } else {
            0.0
        };

        let strategy_annual = mean(&strategy) * TRADING_DAYS_PER_YEAR;
        let bench_annual = mean(&bench) * TRADING_DAYS_PER_YEAR;
        let alpha = strategy_annual - (risk_free_rate + beta * (bench_annual - risk_free_rate));

        let compound = |rs: &[f64]| rs.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;
        let benchmark_return = compound(&bench);

        Some(BenchmarkMetrics {
            common_days: strategy.len(),
            alpha,
            beta,
            correlation,
            tracking_error,
            information_ratio,
            excess_return: compound(&strategy) - benchmark_return,
            benchmark_return,
        })
    }
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Number(v) => write!(f, "{}", v),
            MetricValue::Count(v) => write!(f, "{}", v),
            MetricValue::Date(d) => write!(f, "{}", d),
            MetricValue::Flag(b) => write!(f, "{}", b),
        }
    }
}

/// Percentage change of the curve; a non-positive prior value yields 0.
pub fn daily_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| {
            let prev = w[0].equity;
            if prev > 0.0 {
                (w[1].equity - prev) / prev
            } else {
                0.0
            }
        })
        .collect()
}

/// Daily returns keyed by the date they end on.
fn dated_returns(equity_curve: &[EquityPoint]) -> Vec<(NaiveDate, f64)> {
    equity_curve
        .iter()
        .skip(1)
        .map(|p| p.date)
        .zip(daily_returns(equity_curve))
        .collect()
}

/// Compounded return per calendar month, in date order.
fn monthly_returns(returns: &[(NaiveDate, f64)]) -> Vec<f64> {
    let mut months: Vec<((i32, u32), f64)> = Vec::new();
    for (date, r) in returns {
        let key = (date.year(), date.month());
        match months.last_mut() {
            Some((last, growth)) if *last == key => *growth *= 1.0 + r,
            _ => months.push((key, 1.0 + r)),
        }
    }
    months.into_iter().map(|(_, growth)| growth - 1.0).collect()
}

/// Calendar-day lengths of drawdowns that returned to their peak. A drawdown
/// still open on the last date is not counted.
fn drawdown_durations(dates: &[NaiveDate], underwater: &[f64]) -> Vec<i64> {
    let mut durations = Vec::new();
    let mut started: Option<NaiveDate> = None;
    for (date, dd) in dates.iter().zip(underwater) {
        let below = *dd < -LEVEL_TOLERANCE;
        match started {
            None if below => started = Some(*date),
            Some(start) if !below => {
                durations.push((*date - start).num_days());
                started = None;
            }
            _ => {}
        }
    }
    durations
}

/// Linearly interpolated quantile of an ascending slice; 0 when empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Mean of the values at or below `cutoff`; `cutoff` itself when there are none.
fn tail_mean(sorted: &[f64], cutoff: f64) -> f64 {
    let tail: Vec<f64> = sorted.iter().copied().take_while(|r| *r <= cutoff).collect();
    if tail.is_empty() { cutoff } else { mean(&tail) }
}

/// Bias-adjusted sample skewness; 0 below three values or with no spread.
fn skewness(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 3 {
        return 0.0;
    }
    let m = mean(values);
    let m2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
    let m3 = values.iter().map(|v| (v - m).powi(3)).sum::<f64>() / n;
    if m2 <= 0.0 {
        return 0.0;
    }
    m3 / m2.powf(1.5) * (n * (n - 1.0)).sqrt() / (n - 2.0)
}

/// Bias-adjusted sample excess kurtosis; 0 below four values or with no spread.
fn kurtosis(values: &[f64]) -> f64 {
    let n = values.len() as f64;
    if values.len() < 4 {
        return 0.0;
    }
    let m = mean(values);
    let s2 = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    let s4 = values.iter().map(|v| (v - m).powi(4)).sum::<f64>();
    if s2 <= 0.0 {
        return 0.0;
    }
    n * (n + 1.0) * (n - 1.0) * s4 / ((n - 2.0) * (n - 3.0) * s2 * s2)
        - 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0))
}

/// Sample covariance (n - 1); 0 with fewer than two pairs.
fn sample_cov(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() < 2 {
        return 0.0;
    }
    let (mx, my) = (mean(xs), mean(ys));
    xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum::<f64>() / (xs.len() - 1) as f64
}

fn annualize(total_return: f64, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let growth = 1.0 + total_return;
    if growth <= 0.0 {
        return -1.0;
    }
    growth.powf(TRADING_DAYS_PER_YEAR / n as f64) - 1.0
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n - 1); 0 with fewer than two values.
fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// Cumulative growth, one entry per curve date, starting at 1.0.
fn cumulative(returns: &[f64]) -> Vec<f64> {
    let mut cum = Vec::with_capacity(returns.len() + 1);
    cum.push(1.0);
    for r in returns {
        let last = cum[cum.len() - 1];
        cum.push(last * (1.0 + r));
    }
    cum
}

/// cum / running peak - 1 per date.
fn underwater(cum: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    cum.iter()
        .map(|&c| {
            peak = peak.max(c);
            if peak > 0.0 { c / peak - 1.0 } else { 0.0 }
        })
        .collect()
}

/// Peak, trough and recovery of the maximum drawdown; `None` when there is none.
///
/// Trough: first date attaining the minimum. Peak: first date at or before
/// the trough attaining the running peak. Recovery: first date after the
/// trough whose cumulative value is back at the peak's.
pub fn drawdown_episode(dates: &[NaiveDate], cum: &[f64]) -> Option<DrawdownEpisode> {
    let underwater = underwater(cum);
    let (trough, magnitude) = underwater
        .iter()
        .copied()
        .enumerate()
        .fold((0usize, 0.0f64), |best, (i, dd)| if dd < best.1 { (i, dd) } else { best });

    if magnitude > -LEVEL_TOLERANCE {
        return None;
    }

    let peak_value = cum[..=trough].iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let peak = cum[..=trough].iter().position(|c| *c == peak_value)?;

    let recovered_level = cum[peak] * (1.0 - LEVEL_TOLERANCE);
    let recovery = match (trough + 1..cum.len()).find(|&i| cum[i] >= recovered_level) {
        Some(r) => Recovery::Recovered {
            date: *dates.get(r)?,
            days: r - trough,
        },
        None => Recovery::Unrecovered,
    };

    Some(DrawdownEpisode {
        peak_date: *dates.get(peak)?,
        trough_date: *dates.get(trough)?,
        recovery,
        magnitude,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ledger::TradeOrigin;
    use approx::assert_relative_eq;

    fn make_equity_curve(values: &[f64]) -> Vec<EquityPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| EquityPoint {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Duration::days(i as i64),
                equity: v,
            })
            .collect()
    }

    fn make_trade(shares: i64, price: f64, commission: f64) -> Trade {
        Trade {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            instrument: "TEST".into(),
            shares,
            price,
            notional: (shares as f64 * price).abs(),
            commission,
            direction: if shares > 0 {
                Direction::Buy
            } else {
                Direction::Sell
            },
            origin: TradeOrigin::Signal,
        }
    }

    fn day(i: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i)
    }

    #[test]
    fn metrics_empty_curve() {
        let m = Metrics::compute(&[], &[], 0.02, None);
        assert_eq!(m.trading_days, 0);
        assert_eq!(m.total_return, 0.0);
        assert_eq!(m.annualized_return, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert!(m.drawdown.is_none());
    }

    #[test]
    fn metrics_total_return_compounds() {
        let m = Metrics::compute(&make_equity_curve(&[100.0, 110.0, 99.0]), &[], 0.0, None);
        assert_relative_eq!(m.total_return, -0.01, epsilon = 1e-12);
        assert_eq!(m.trading_days, 2);
    }

    #[test]
    fn metrics_annualized_return_over_one_year() {
        let mut values = vec![100.0];
        for i in 1..=252 {
            values.push(100.0 + 10.0 * i as f64 / 252.0);
        }
        let m = Metrics::compute(&make_equity_curve(&values), &[], 0.0, None);
        assert_relative_eq!(m.annualized_return, 0.10, epsilon = 1e-9);
    }

    #[test]
    fn flat_curve_has_zero_risk() {
        let m = Metrics::compute(&make_equity_curve(&[100.0; 10]), &[], 0.02, None);
        assert_eq!(m.annualized_volatility, 0.0);
        assert_eq!(m.sharpe_ratio, 0.0);
        assert_eq!(m.sortino_ratio, 0.0);
        assert_eq!(m.max_drawdown, 0.0);
        assert!(m.drawdown.is_none());
    }

    #[test]
    fn volatility_uses_sample_std() {
        let m = Metrics::compute(&make_equity_curve(&[100.0, 110.0, 99.0]), &[], 0.0, None);
        let r = [0.1, -0.1];
        let expected = sample_std(&r) * 252f64.sqrt();
        assert_relative_eq!(m.annualized_volatility, expected, epsilon = 1e-12);
        assert_relative_eq!(sample_std(&r), (0.02f64).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn sharpe_subtracts_risk_free_rate() {
        let curve = make_equity_curve(&[100.0, 101.0, 100.5, 102.0, 101.0, 103.0]);
        let m = Metrics::compute(&curve, &[], 0.03, None);
        assert_relative_eq!(
            m.sharpe_ratio,
            (m.annualized_return - 0.03) / m.annualized_volatility,
            epsilon = 1e-12
        );
    }

    #[test]
    fn drawdown_recovers_after_two_bars() {
        let curve = make_equity_curve(&[100.0, 120.0, 90.0, 80.0, 110.0, 130.0]);
        let m = Metrics::compute(&curve, &[], 0.0, None);

        assert_relative_eq!(m.max_drawdown, 80.0 / 120.0 - 1.0, epsilon = 1e-12);
        let episode = m.drawdown.unwrap();
        assert_eq!(episode.peak_date, day(1));
        assert_eq!(episode.trough_date, day(3));
        assert_eq!(
            episode.recovery,
            Recovery::Recovered {
                date: day(5),
                days: 2
            }
        );
    }

    #[test]
    fn drawdown_never_recovers() {
        let curve = make_equity_curve(&[100.0, 120.0, 80.0, 90.0]);
        let m = Metrics::compute(&curve, &[], 0.0, None);

        let episode = m.drawdown.clone().unwrap();
        assert_eq!(episode.trough_date, day(2));
        assert_eq!(episode.recovery, Recovery::Unrecovered);

        let map = m.to_map();
        assert_eq!(map.get("drawdown_recovered"), Some(&MetricValue::Flag(false)));
        assert!(!map.contains_key("drawdown_recovery_days"));
    }

    #[test]
    fn drawdown_from_first_date() {
        let curve = make_equity_curve(&[100.0, 90.0, 100.0]);
        let episode = Metrics::compute(&curve, &[], 0.0, None).drawdown.unwrap();
        assert_eq!(episode.peak_date, day(0));
        assert_eq!(
            episode.recovery,
            Recovery::Recovered {
                date: day(2),
                days: 1
            }
        );
    }

    #[test]
    fn underwater_stats() {
        let curve = make_equity_curve(&[100.0, 90.0, 95.0, 100.0, 98.0]);
        let m = Metrics::compute(&curve, &[], 0.0, None);
        assert_eq!(m.longest_underwater, 2);
        assert_relative_eq!(m.current_drawdown, -0.02, epsilon = 1e-12);
    }

    #[test]
    fn day_statistics() {
        let curve = make_equity_curve(&[100.0, 110.0, 99.0, 99.0]);
        let m = Metrics::compute(&curve, &[], 0.0, None);
        assert_eq!(m.positive_days, 1);
        assert_eq!(m.negative_days, 1);
        assert_relative_eq!(m.best_day, 0.1, epsilon = 1e-12);
        assert_relative_eq!(m.worst_day, -0.1, epsilon = 1e-12);
        assert_relative_eq!(m.daily_win_rate, 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(m.avg_win_day, 0.1, epsilon = 1e-12);
        assert_relative_eq!(m.avg_loss_day, -0.1, epsilon = 1e-12);
    }

    #[test]
    fn zero_prior_value_yields_zero_return() {
        let curve = make_equity_curve(&[0.0, 100.0, 110.0]);
        let returns = daily_returns(&curve);
        assert_eq!(returns[0], 0.0);
        assert_relative_eq!(returns[1], 0.1, epsilon = 1e-12);
    }

    #[test]
    fn trade_statistics() {
        let trades = vec![
            make_trade(10, 10.0, 0.1),
            make_trade(-5, 12.0, 0.06),
            make_trade(3, 11.0, 0.033),
        ];
        let m = Metrics::compute(&make_equity_curve(&[200.0, 200.0]), &trades, 0.0, None);
        assert_eq!(m.trade_count, 3);
        assert_eq!(m.buy_count, 2);
        assert_eq!(m.sell_count, 1);
        assert_relative_eq!(m.total_commission, 0.193, epsilon = 1e-12);
        assert_relative_eq!(m.turnover, (100.0 + 60.0 + 33.0) / 200.0, epsilon = 1e-12);
    }

    #[test]
    fn to_map_includes_recovery_when_recovered() {
        let curve = make_equity_curve(&[100.0, 120.0, 90.0, 80.0, 110.0, 130.0]);
        let map = Metrics::compute(&curve, &[], 0.0, None).to_map();
        assert_eq!(map.get("drawdown_recovered"), Some(&MetricValue::Flag(true)));
        assert_eq!(
            map.get("drawdown_recovery_days"),
            Some(&MetricValue::Count(2))
        );
        assert_eq!(map.get("trading_days"), Some(&MetricValue::Count(5)));
    }

    fn dated_curve(points: &[(NaiveDate, f64)]) -> Vec<EquityPoint> {
        points
            .iter()
            .map(|&(date, equity)| EquityPoint { date, equity })
            .collect()
    }

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn best_and_worst_month_compound_daily_returns() {
        let curve = dated_curve(&[
            (ymd(2024, 1, 30), 100.0),
            (ymd(2024, 1, 31), 110.0),
            (ymd(2024, 2, 1), 99.0),
            (ymd(2024, 2, 2), 108.9),
        ]);
        let m = Metrics::compute(&curve, &[], 0.0, None);
        assert_relative_eq!(m.best_month, 0.1, epsilon = 1e-12);
        assert_relative_eq!(m.worst_month, 0.9 * 1.1 - 1.0, epsilon = 1e-12);
    }

    #[test]
    fn value_at_risk_interpolates_lower_tail() {
        let mut r = vec![-0.05, -0.02, 0.01, 0.03, 0.0, 0.02, -0.01, 0.04, -0.03, 0.01];
        r.sort_by(f64::total_cmp);
        assert_relative_eq!(quantile(&r, 0.05), -0.041, epsilon = 1e-12);
        assert_relative_eq!(quantile(&r, 0.01), -0.0482, epsilon = 1e-12);
        assert_relative_eq!(tail_mean(&r, -0.041), -0.05, epsilon = 1e-12);
        assert_relative_eq!(tail_mean(&r, -0.015), -0.1 / 3.0, epsilon = 1e-12);
        assert_eq!(quantile(&[], 0.05), 0.0);
    }

    #[test]
    fn var_and_cvar_from_curve() {
        let curve = make_equity_curve(&[100.0, 110.0, 99.0, 99.0, 108.9]);
        let m = Metrics::compute(&curve, &[], 0.0, None);
        // Sorted returns: -0.1, 0, 0.1, 0.1.
        assert_relative_eq!(m.var_95, -0.1 + 0.1 * 0.15, epsilon = 1e-12);
        assert_relative_eq!(m.cvar_95, -0.1, epsilon = 1e-12);
        assert!(m.var_99 <= m.var_95);
        assert!(m.cvar_99 <= m.var_99);
    }

    #[test]
    fn skewness_and_kurtosis_are_bias_adjusted() {
        let x = [1.0, 2.0, 3.0, 4.0, 10.0];
        assert_relative_eq!(skewness(&x), 1.697_056_274_847_714, epsilon = 1e-9);
        assert_relative_eq!(kurtosis(&x), 3.152, epsilon = 1e-9);

        assert_eq!(skewness(&[1.0, 2.0]), 0.0);
        assert_eq!(kurtosis(&[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(skewness(&[2.0; 5]), 0.0);
        assert_eq!(kurtosis(&[2.0; 5]), 0.0);
    }

    #[test]
    fn drawdown_duration_stats() {
        let curve = dated_curve(&[
            (ymd(2024, 1, 1), 100.0),
            (ymd(2024, 1, 2), 90.0),
            (ymd(2024, 1, 5), 100.0),
            (ymd(2024, 1, 6), 95.0),
            (ymd(2024, 1, 8), 101.0),
            (ymd(2024, 1, 9), 99.0),
        ]);
        let m = Metrics::compute(&curve, &[], 0.0, None);
        // 1/2 -> 1/5 and 1/6 -> 1/8; the dip on 1/9 is still open.
        assert_eq!(m.drawdown_periods, 2);
        assert_eq!(m.max_drawdown_duration, 3);
        assert_relative_eq!(m.avg_drawdown_duration, 2.5, epsilon = 1e-12);

        let map = m.to_map();
        assert_eq!(map.get("drawdown_periods"), Some(&MetricValue::Count(2)));
        assert_eq!(map.get("max_drawdown_duration"), Some(&MetricValue::Number(3.0)));
    }

    #[test]
    fn no_drawdown_has_no_periods() {
        let m = Metrics::compute(&make_equity_curve(&[100.0, 101.0, 102.0]), &[], 0.0, None);
        assert_eq!(m.drawdown_periods, 0);
        assert_eq!(m.avg_drawdown_duration, 0.0);
        assert_eq!(m.max_drawdown_duration, 0);
    }

    fn curve_from_returns(returns: &[f64]) -> Vec<EquityPoint> {
        let mut values = vec![100.0];
        for r in returns {
            let last = values[values.len() - 1];
            values.push(last * (1.0 + r));
        }
        make_equity_curve(&values)
    }

    #[test]
    fn leveraged_curve_against_benchmark() {
        let bench_returns = [0.01, -0.02, 0.03, 0.01, -0.005];
        let doubled: Vec<f64> = bench_returns.iter().map(|r| r * 2.0).collect();
        let benchmark = curve_from_returns(&bench_returns);
        let curve = curve_from_returns(&doubled);

        let m = Metrics::compute(&curve, &[], 0.0, Some(&benchmark));
        let bench = m.benchmark.clone().unwrap();

        assert_eq!(bench.common_days, 5);
        assert_relative_eq!(bench.beta, 2.0, epsilon = 1e-9);
        assert_relative_eq!(bench.correlation, 1.0, epsilon = 1e-9);
        assert_relative_eq!(bench.alpha, 0.0, epsilon = 1e-9);
        assert_relative_eq!(
            bench.tracking_error,
            sample_std(&bench_returns) * 252f64.sqrt(),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            bench.information_ratio,
            mean(&bench_returns) * 252.0 / bench.tracking_error,
            epsilon = 1e-9
        );
        let bench_total = bench_returns.iter().fold(1.0, |acc, r| acc * (1.0 + r)) - 1.0;
        assert_relative_eq!(bench.benchmark_return, bench_total, epsilon = 1e-9);
        assert_relative_eq!(bench.excess_return, m.total_return - bench_total, epsilon = 1e-9);

        let map = m.to_map();
        assert!(map.contains_key("alpha"));
        assert_eq!(map.get("benchmark_common_days"), Some(&MetricValue::Count(5)));
    }

    #[test]
    fn alpha_measures_return_beyond_beta() {
        let bench_returns = [0.01, -0.01, 0.02, -0.02];
        let shifted: Vec<f64> = bench_returns.iter().map(|r| r + 0.001).collect();
        let m = Metrics::compute(
            &curve_from_returns(&shifted),
            &[],
            0.02,
            Some(&curve_from_returns(&bench_returns)),
        );
        let bench = m.benchmark.unwrap();
        assert_relative_eq!(bench.beta, 1.0, epsilon = 1e-9);
        assert_relative_eq!(bench.alpha, 0.001 * 252.0, epsilon = 1e-9);
        assert_relative_eq!(bench.correlation, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn benchmark_uses_common_dates_only() {
        let curve = make_equity_curve(&[100.0, 110.0, 99.0, 108.9]);
        let benchmark = dated_curve(&[(day(1), 50.0), (day(2), 55.0), (day(3), 55.0)]);
        let bench = Metrics::compute(&curve, &[], 0.0, Some(&benchmark))
            .benchmark
            .unwrap();
        // Benchmark returns exist for day 2 and day 3 only.
        assert_eq!(bench.common_days, 2);
        assert_relative_eq!(bench.benchmark_return, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn benchmark_without_shared_dates_is_omitted() {
        let curve = make_equity_curve(&[100.0, 110.0]);
        let benchmark = dated_curve(&[(ymd(2023, 1, 1), 50.0), (ymd(2023, 1, 2), 55.0)]);
        let m = Metrics::compute(&curve, &[], 0.0, Some(&benchmark));
        assert!(m.benchmark.is_none());
        assert!(!m.to_map().contains_key("beta"));
    }

    #[test]
    fn flat_benchmark_defaults_beta_and_correlation() {
        let curve = make_equity_curve(&[100.0, 110.0, 99.0]);
        let benchmark = make_equity_curve(&[50.0, 50.0, 50.0]);
        let bench = Metrics::compute(&curve, &[], 0.0, Some(&benchmark))
            .benchmark
            .unwrap();
        assert_eq!(bench.beta, 1.0);
        assert_eq!(bench.correlation, 0.0);
    }
}
