//! Stop-loss / take-profit overlay.
//!
//! Reconstructs the cumulative return of each asset's current open trade
//! (reset whenever the upstream signal changes) and forces the signal flat
//! from the first breach of either threshold until the upstream signal
//! next changes. A forced exit still respects holiday rules: the
//! non-trading mask and forward-fill are re-applied afterwards.

use crate::align::apply_non_trading_mask;
use crate::frame::{Frame, Series};

/// Apply the overlay to an aligned executable signal.
///
/// `asset_returns` is the per-asset simple-return matrix on the same axis.
/// `stop_loss` is a negative threshold, `take_profit` a positive one, on
/// the open trade's cumulative compounded return.
pub fn apply_stop_take(
    signal: &Frame,
    asset_returns: &Frame,
    stop_loss: f64,
    take_profit: f64,
    non_trading: &[Vec<bool>],
) -> Frame {
    let columns = signal
        .iter()
        .enumerate()
        .map(|(c, (name, col))| {
            (
                name.to_string(),
                overlay_column(col, asset_returns.column_at(c), stop_loss, take_profit),
            )
        })
        .collect();
    let forced = Frame::from_columns(signal.dates().to_vec(), columns)
        .expect("signal axis already validated");
    apply_non_trading_mask(&forced, non_trading)
}

fn overlay_column(
    signal: &Series,
    asset_returns: &Series,
    stop_loss: f64,
    take_profit: f64,
) -> Series {
    let n = signal.len();
    let mut out: Series = vec![None; n];
    let mut prev: Option<f64> = None;
    let mut trade_return = 0.0;
    let mut forced = false;

    for t in 0..n {
        let cur = signal[t];
        if cur != prev {
            // New trade: the force lifts and the trade return restarts.
            forced = false;
            trade_return = 0.0;
        } else if let (Some(s), Some(r)) = (cur, asset_returns[t]) {
            // Same trade: compound the position-signed period return.
            // Undefined returns (holidays) carry the accumulator unchanged.
            trade_return = (1.0 + trade_return) * (1.0 + s * r) - 1.0;
        }

        if !forced && (trade_return < stop_loss || trade_return > take_profit) {
            forced = true;
        }

        out[t] = if forced { Some(0.0) } else { cur };
        prev = cur;
    }

    out
}
