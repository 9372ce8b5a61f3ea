//! Order sizing: net notional to whole-share trades.
//!
//! Buys are bounded by intent and by cash, both grossed up by the fee.
//! Sells are bounded by intent and by current holdings. Intent floors allow a
//! `SHARE_EPSILON` tolerance so a notional built as shares*P*(1+f) maps back
//! to exactly `shares`. The cash bound has no tolerance: a buy never costs
//! more than the cash on hand.

pub const SHARE_EPSILON: f64 = 1e-9;

/// Whole shares in `x`, tolerant of representation error just below an integer.
pub fn floor_shares(x: f64) -> i64 {
    if !x.is_finite() || x <= 0.0 {
        return 0;
    }
    (x + SHARE_EPSILON).floor() as i64
}

fn affordable(x: f64) -> i64 {
    if !x.is_finite() || x <= 0.0 {
        return 0;
    }
    x.floor() as i64
}

/// commission = |shares * price| * fee_rate
pub fn calculate_commission(shares: i64, price: f64, fee_rate: f64) -> f64 {
    (shares as f64 * price).abs() * fee_rate
}

/// Shares bought for a buy intent of `magnitude`.
pub fn buy_shares(magnitude: f64, price: f64, fee_rate: f64, cash: f64) -> i64 {
    let unit_cost = price * (1.0 + fee_rate);
    if unit_cost <= 0.0 {
        return 0;
    }
    let by_intent = floor_shares(magnitude / unit_cost);
    let mut by_cash = affordable(cash / unit_cost);
    while by_cash > 0
        && by_cash as f64 * price + calculate_commission(by_cash, price, fee_rate) > cash
    {
        by_cash -= 1;
    }
    by_intent.min(by_cash).max(0)
}

/// Shares sold (as a positive count) for a sell intent of `magnitude`.
pub fn sell_shares(magnitude: f64, price: f64, holdings: i64) -> i64 {
    if price <= 0.0 {
        return 0;
    }
    holdings.min(floor_shares(magnitude / price)).max(0)
}

/// Signed share delta for a signed net notional.
pub fn size_order(net: f64, price: f64, fee_rate: f64, cash: f64, holdings: i64) -> i64 {
    if net > 0.0 {
        buy_shares(net, price, fee_rate, cash)
    } else if net < 0.0 {
        -sell_shares(-net, price, holdings)
    } else {
        0
    }
}

/// Change in cash for a signed share delta, commission included.
pub fn cash_delta(shares: i64, price: f64, fee_rate: f64) -> f64 {
    -(shares as f64 * price) - calculate_commission(shares, price, fee_rate)
}
