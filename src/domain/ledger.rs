//! Per-instrument ledger: cash, integer holdings, trade log and daily rows.
//!
//! The ledger is opened once (optional opening buy), stepped once per bar in
//! date order, then consumed into an `InstrumentResult`. Every row satisfies
//! portfolio_value == cash + holdings * mark_price.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use super::error::StratfolioError;
use super::instrument::Instrument;
use super::ohlcv::{OhlcvBar, validate_series};
use super::rule::Direction;
use super::signal::{NetSignal, net_signals};
use super::sizing::{buy_shares, calculate_commission, cash_delta, sell_shares, size_order};

/// How a date with both buy and sell intent is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameDayPolicy {
    /// Trade only the net of buy and sell totals.
    #[default]
    Net,
    /// Sell the sell total first, then buy the buy total, as two trades.
    BothLegs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOrigin {
    Opening,
    Signal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub date: NaiveDate,
    pub instrument: String,
    /// Signed share delta: positive for buys, negative for sells.
    pub shares: i64,
    pub price: f64,
    pub notional: f64,
    pub commission: f64,
    pub direction: Direction,
    pub origin: TradeOrigin,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerRow {
    pub date: NaiveDate,
    pub mark_price: f64,
    pub cash: f64,
    pub holdings: i64,
    pub holdings_value: f64,
    pub portfolio_value: f64,
    pub signal: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentResult {
    pub code: String,
    pub rows: Vec<LedgerRow>,
    pub trades: Vec<Trade>,
    pub signals: Vec<NetSignal>,
    /// Bars whose close could not be traded or marked.
    pub skipped_days: usize,
}

#[derive(Debug, Clone, PartialEq)]
struct LedgerState {
    pub cash: f64,
    pub holdings: i64,
}

#[derive(Debug)]
pub struct Ledger<'a> {
    instrument: &'a Instrument,
    policy: SameDayPolicy,
    state: LedgerState,
    last_mark: f64,
    rows: Vec<LedgerRow>,
    trades: Vec<Trade>,
    skipped_days: usize,
}

impl<'a> Ledger<'a> {
    /// Start with the full cash pool and, if configured, buy the opening position
    /// at the first bar's close.
    pub fn open(instrument: &'a Instrument, first_bar: &OhlcvBar, policy: SameDayPolicy) -> Self {
        let mut ledger = Ledger {
            instrument,
            policy,
            state: LedgerState {
                cash: instrument.max_investment,
                holdings: 0,
            },
            last_mark: 0.0,
            rows: Vec::new(),
            trades: Vec::new(),
            skipped_days: 0,
        };

        if instrument.initial_investment > 0.0 && first_bar.is_tradable() {
            let shares = buy_shares(
                instrument.initial_investment,
                first_bar.close,
                instrument.fee_rate,
                ledger.state.cash,
            );
            ledger.execute(first_bar.date, shares, first_bar.close, TradeOrigin::Opening);
        }

        ledger
    }

    /// Apply one date: trade the signal if the bar is usable, then record the row.
    pub fn step(&mut self, bar: &OhlcvBar, signal: &NetSignal) {
        debug_assert_eq!(bar.date, signal.date);

        let mark = if bar.is_tradable() {
            self.trade_signal(bar, signal);
            self.last_mark = bar.close;
            bar.close
        } else {
            self.skipped_days += 1;
            debug!(
                instrument = %self.instrument.code,
                date = %bar.date,
                close = bar.close,
                "skipping bar without a usable close"
            );
            self.last_mark
        };

        let holdings_value = self.state.holdings as f64 * mark;
        self.rows.push(LedgerRow {
            date: bar.date,
            mark_price: mark,
            cash: self.state.cash,
            holdings: self.state.holdings,
            holdings_value,
            portfolio_value: self.state.cash + holdings_value,
            signal: signal.net(),
        });
    }

    pub fn finish(self, signals: Vec<NetSignal>) -> InstrumentResult {
        InstrumentResult {
            code: self.instrument.code.clone(),
            rows: self.rows,
            trades: self.trades,
            signals,
            skipped_days: self.skipped_days,
        }
    }

    fn trade_signal(&mut self, bar: &OhlcvBar, signal: &NetSignal) {
        let fee = self.instrument.fee_rate;
        match self.policy {
            SameDayPolicy::Net => {
                let shares = size_order(
                    signal.net(),
                    bar.close,
                    fee,
                    self.state.cash,
                    self.state.holdings,
                );
                self.execute(bar.date, shares, bar.close, TradeOrigin::Signal);
            }
            SameDayPolicy::BothLegs => {
                if signal.sell_amount > 0.0 {
                    let sold = sell_shares(signal.sell_amount, bar.close, self.state.holdings);
                    self.execute(bar.date, -sold, bar.close, TradeOrigin::Signal);
                }
                if signal.buy_amount > 0.0 {
                    let bought = buy_shares(signal.buy_amount, bar.close, fee, self.state.cash);
                    self.execute(bar.date, bought, bar.close, TradeOrigin::Signal);
                }
            }
        }
    }

    fn execute(&mut self, date: NaiveDate, shares: i64, price: f64, origin: TradeOrigin) {
        if shares == 0 {
            return;
        }
        let fee = self.instrument.fee_rate;
        self.state.cash += cash_delta(shares, price, fee);
        self.state.holdings += shares;
        self.trades.push(Trade {
            date,
            instrument: self.instrument.code.clone(),
            shares,
            price,
            notional: (shares as f64 * price).abs(),
            commission: calculate_commission(shares, price, fee),
            direction: if shares > 0 {
                Direction::Buy
            } else {
                Direction::Sell
            },
            origin,
        });
    }
}

/// Generate signals and replay the whole series for one instrument.
pub fn simulate(
    instrument: &Instrument,
    bars: &[OhlcvBar],
    policy: SameDayPolicy,
) -> Result<InstrumentResult, StratfolioError> {
    validate_series(&instrument.code, bars)?;
    let signals = net_signals(instrument, bars);
    Ok(replay(instrument, bars, signals, policy))
}

/// Replay precomputed signals. `bars` must be non-empty and aligned with `signals`.
pub(crate) fn replay(
    instrument: &Instrument,
    bars: &[OhlcvBar],
    signals: Vec<NetSignal>,
    policy: SameDayPolicy,
) -> InstrumentResult {
    let Some(first) = bars.first() else {
        return InstrumentResult {
            code: instrument.code.clone(),
            rows: Vec::new(),
            trades: Vec::new(),
            signals,
            skipped_days: 0,
        };
    };

    let mut ledger = Ledger::open(instrument, first, policy);
    for (bar, signal) in bars.iter().zip(&signals) {
        ledger.step(bar, signal);
    }
    ledger.finish(signals)
}
