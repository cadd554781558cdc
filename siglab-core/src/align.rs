//! Calendar alignment — the anti-look-ahead front door of the pipeline.
//!
//! Shifts the raw signal by the configured delay, joins it onto the price
//! calendar, and enforces "no trading on asset holidays": a signal may not
//! change on a day the asset did not trade, it carries over from the last
//! tradable day.

use thiserror::Error;

use crate::frame::Frame;

/// Fatal alignment errors.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("price and signal matrices share no dates")]
    NoOverlap,
    #[error("price matrix has {prices} columns but signal matrix has {signals}")]
    ColumnMismatch { prices: usize, signals: usize },
}

/// Aligned pipeline inputs, all on the price matrix's date axis.
#[derive(Debug, Clone)]
pub struct Aligned {
    /// Prices, forward-filled across non-trading gaps.
    pub prices: Frame,
    /// Executable signal: delayed, joined, holiday-masked, forward-filled.
    pub signal: Frame,
    /// Contract values per unit, joined and forward-filled, if supplied.
    pub contract_values: Option<Frame>,
    /// Column-major holiday mask: `true` where the asset did not trade.
    /// Retained so downstream stages that rewrite the signal can re-apply
    /// the same holiday rule.
    pub non_trading: Vec<Vec<bool>>,
}

/// Align price, signal and optional contract-value matrices onto the
/// price calendar. Signal columns correspond to price columns by position.
pub fn align(
    prices: &Frame,
    signal: &Frame,
    contract_values: Option<&Frame>,
    signal_delay: usize,
) -> Result<Aligned, AlignError> {
    if prices.n_cols() != signal.n_cols() {
        return Err(AlignError::ColumnMismatch {
            prices: prices.n_cols(),
            signals: signal.n_cols(),
        });
    }
    if !has_common_date(prices, signal) {
        return Err(AlignError::NoOverlap);
    }

    // Delay, left-join onto the price calendar, fill the join gaps.
    let delayed = signal.shift(signal_delay);
    let joined = delayed.reindex(prices.dates()).ffill();

    // Holiday mask from undefined prices.
    let non_trading: Vec<Vec<bool>> = (0..prices.n_cols())
        .map(|c| prices.column_at(c).iter().map(|v| v.is_none()).collect())
        .collect();

    let signal = apply_non_trading_mask(&joined, &non_trading);

    let contract_values = contract_values.map(|cv| cv.reindex(prices.dates()).ffill());

    Ok(Aligned {
        prices: prices.ffill(),
        signal,
        contract_values,
        non_trading,
    })
}

/// Undefine signal cells on holidays, then forward-fill so the position
/// carries over from the last tradable day. Re-used after any stage that
/// rewrites the signal (the stop/take overlay).
pub fn apply_non_trading_mask(signal: &Frame, non_trading: &[Vec<bool>]) -> Frame {
    let mut columns = Vec::with_capacity(signal.n_cols());
    for (c, (name, col)) in signal.iter().enumerate() {
        let masked: Vec<Option<f64>> = col
            .iter()
            .zip(non_trading[c].iter())
            .map(|(v, holiday)| if *holiday { None } else { *v })
            .collect();
        columns.push((name.to_string(), crate::frame::ffill_series(&masked)));
    }
    // The axis was validated when the signal frame was built.
    Frame::from_columns(signal.dates().to_vec(), columns).expect("signal axis already validated")
}

fn has_common_date(a: &Frame, b: &Frame) -> bool {
    let (mut i, mut j) = (0, 0);
    let (da, db) = (a.dates(), b.dates());
    while i < da.len() && j < db.len() {
        match da[i].cmp(&db[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}
