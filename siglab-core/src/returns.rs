//! Return aggregation and cost model.
//!
//! One column at a time: the position held since the previous period earns
//! the period's asset return, turnover is charged the pre-halved
//! transaction cost, and the held position is charged the pre-halved roll
//! cost. The cumulative index rebases the stream to 100 under either the
//! multiplicative or the additive convention.

use crate::config::CumIndex;
use crate::frame::{Frame, Series};

/// Cost-adjusted return for a single signal/asset column:
/// `ret(t) = signal(t-1)·r(t) − tc·|signal(t) − signal(t-1)| − rc·|signal(t)|`.
///
/// An undefined prior signal is treated as flat (no position, no prior
/// holding) for both the earning and the turnover term; an undefined
/// current signal or asset return makes the period's P&L undefined.
pub fn return_with_cost(
    signal: &Series,
    asset_returns: &Series,
    transaction_cost: f64,
    roll_cost: f64,
) -> Series {
    let n = signal.len();
    debug_assert_eq!(n, asset_returns.len());
    let mut out: Series = vec![None; n];
    for t in 0..n {
        let cur = match signal[t] {
            Some(s) => s,
            None => continue,
        };
        let prev = if t == 0 { 0.0 } else { signal[t - 1].unwrap_or(0.0) };
        let r = if t == 0 {
            // No prior period: position P&L is zero by construction, but an
            // entry trade on day 0 still pays transaction cost.
            0.0
        } else {
            match asset_returns[t] {
                Some(r) => r,
                None => continue,
            }
        };
        let position_pnl = prev * r;
        let turnover = (cur - prev).abs() * transaction_cost;
        let holding = cur.abs() * roll_cost;
        out[t] = Some(position_pnl - turnover - holding);
    }
    out
}

/// Cost-adjusted returns for every column of a signal frame, with output
/// columns renamed to `labels`.
pub fn returns_with_cost(
    signal: &Frame,
    asset_returns: &Frame,
    labels: &[String],
    transaction_cost: f64,
    roll_cost: f64,
) -> Frame {
    debug_assert_eq!(signal.n_cols(), asset_returns.n_cols());
    debug_assert_eq!(signal.n_cols(), labels.len());
    let columns = (0..signal.n_cols())
        .map(|c| {
            (
                labels[c].clone(),
                return_with_cost(
                    signal.column_at(c),
                    asset_returns.column_at(c),
                    transaction_cost,
                    roll_cost,
                ),
            )
        })
        .collect();
    Frame::from_columns(signal.dates().to_vec(), columns).expect("signal axis already validated")
}

/// Cumulative index, base 100. Undefined per-period returns leave the
/// level unchanged so warm-up gaps do not poison the series.
pub fn cumulative_index(returns: &Series, convention: CumIndex) -> Series {
    let mut out: Series = Vec::with_capacity(returns.len());
    let mut level = 100.0;
    let mut running_sum = 0.0;
    for (t, ret) in returns.iter().enumerate() {
        if t == 0 {
            out.push(Some(100.0));
            continue;
        }
        match convention {
            CumIndex::Mult => {
                if let Some(r) = ret {
                    level *= 1.0 + r;
                }
                out.push(Some(level));
            }
            CumIndex::Add => {
                if let Some(r) = ret {
                    running_sum += r;
                }
                out.push(Some(100.0 + 100.0 * running_sum));
            }
        }
    }
    out
}

/// Cumulative index per column.
pub fn cumulative_index_frame(returns: &Frame, convention: CumIndex) -> Frame {
    let columns = returns
        .iter()
        .map(|(name, col)| (name.to_string(), cumulative_index(col, convention)))
        .collect();
    Frame::from_columns(returns.dates().to_vec(), columns).expect("returns axis already validated")
}

/// Number of trades in a signal column: count of periods where the
/// executable position changes (an undefined cell counts as flat).
pub fn trade_count(signal: &Series) -> usize {
    let mut count = 0;
    let mut prev = 0.0;
    for cell in signal {
        let cur = cell.unwrap_or(0.0);
        if cur != prev {
            count += 1;
        }
        prev = cur;
    }
    count
}
