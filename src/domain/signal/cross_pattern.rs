//! MACD cross and divergence patterns.
//!
//! Crosses compare a bar with the previous bar that has a valid MACD point,
//! so the first tradable bar never fires. Bars without a tradable close never
//! fire. The rule fires if any selected pattern is detected on the bar.

use crate::domain::indicator::calculate_macd;
use crate::domain::ohlcv::OhlcvBar;
use crate::domain::rule::{CrossPattern, CrossPatternParams};
use crate::domain::signal::SignalRule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cross {
    Golden,
    Death,
}

/// Crosses between consecutive valid points; invalid bars are stepped over.
fn crosses(points: &[Option<(f64, f64)>]) -> Vec<Option<Cross>> {
    let mut out = vec![None; points.len()];
    let mut prev: Option<(f64, f64)> = None;
    for (i, point) in points.iter().enumerate() {
        let Some((line, signal)) = *point else {
            continue;
        };
        if let Some((prev_line, prev_signal)) = prev {
            if prev_line <= prev_signal && line > signal {
                out[i] = Some(Cross::Golden);
            } else if prev_line >= prev_signal && line < signal {
                out[i] = Some(Cross::Death);
            }
        }
        prev = Some((line, signal));
    }
    out
}

/// A cross of `kind` at `i` with another one in the previous `lookback` bars.
fn double_cross(crosses: &[Option<Cross>], i: usize, kind: Cross, lookback: usize) -> bool {
    if crosses[i] != Some(kind) || i == 0 {
        return false;
    }
    let from = i.saturating_sub(lookback);
    crosses[from..i].contains(&Some(kind))
}

/// Index of the extreme close in the `lookback` bars before `i`, if the
/// whole window has valid MACD values. Ties resolve to the earliest bar.
fn window_extreme(
    bars: &[OhlcvBar],
    points: &[Option<(f64, f64)>],
    i: usize,
    lookback: usize,
    lowest: bool,
) -> Option<usize> {
    if lookback == 0 || i < lookback {
        return None;
    }
    let window = (i - lookback)..i;
    if window.clone().any(|k| points[k].is_none()) {
        return None;
    }
    window.reduce(|best, k| {
        let better = if lowest {
            bars[k].close < bars[best].close
        } else {
            bars[k].close > bars[best].close
        };
        if better { k } else { best }
    })
}

fn divergence(
    bars: &[OhlcvBar],
    points: &[Option<(f64, f64)>],
    i: usize,
    lookback: usize,
    bullish: bool,
) -> bool {
    let Some((line, _)) = points[i] else {
        return false;
    };
    let Some(j) = window_extreme(bars, points, i, lookback, bullish) else {
        return false;
    };
    let Some((line_j, _)) = points[j] else {
        return false;
    };
    if bullish {
        bars[i].close < bars[j].close && line > line_j
    } else {
        bars[i].close > bars[j].close && line < line_j
    }
}

impl SignalRule for CrossPatternParams {
    fn fires(&self, bars: &[OhlcvBar]) -> Vec<bool> {
        let macd = calculate_macd(bars, self.fast_period, self.slow_period, self.signal_period);
        let points: Vec<Option<(f64, f64)>> = (0..bars.len()).map(|i| macd.macd_at(i)).collect();
        let crosses = crosses(&points);

        (0..bars.len())
            .map(|i| {
                self.patterns.iter().any(|pattern| match pattern {
                    CrossPattern::GoldenCross => crosses[i] == Some(Cross::Golden),
                    CrossPattern::DeathCross => crosses[i] == Some(Cross::Death),
                    CrossPattern::DoubleGoldenCross => {
                        double_cross(&crosses, i, Cross::Golden, self.double_cross_lookback)
                    }
                    CrossPattern::DoubleDeathCross => {
                        double_cross(&crosses, i, Cross::Death, self.double_cross_lookback)
                    }
                    CrossPattern::BullishDivergence => {
                        divergence(bars, &points, i, self.divergence_lookback, true)
                    }
                    CrossPattern::BearishDivergence => {
                        divergence(bars, &points, i, self.divergence_lookback, false)
                    }
                })
            })
            .collect()
    }
}
