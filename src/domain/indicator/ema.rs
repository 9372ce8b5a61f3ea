//! Exponential Moving Average.
//!
//! k = 2/(n+1), EMA[0] = x[0], EMA[i] = x[i]*k + EMA[i-1]*(1-k). No warmup:
//! the first present input seeds the average.

/// EMA of an input slice with gaps; a `None` input leaves the state
/// untouched and yields `None`.
///
/// Every position is `None` for `period == 0`.
pub(crate) fn ema_of(input: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; input.len()];
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema: Option<f64> = None;

    input
        .iter()
        .map(|x| {
            let x = (*x)?;
            let next = match ema {
                Some(prev) => x * k + prev * (1.0 - k),
                None => x,
            };
            ema = Some(next);
            Some(next)
        })
        .collect()
}
