//! Portfolio weight construction.
//!
//! Applies signal-level vol-targeting leverage, computes per-asset P&L net
//! of cost, combines it into a single portfolio return under the
//! configured `Combination` policy, and applies portfolio-level
//! vol-targeting leverage to both the unweighted and the
//! combination-weighted signals.

use crate::config::{Combination, PipelineConfig};
use crate::frame::{Frame, Series};
use crate::returns::returns_with_cost;
use crate::risk::{leverage, LeverageInput};

/// Result of the weight-construction stage.
#[derive(Debug, Clone)]
pub struct Optimized {
    /// Per-asset signals after signal-level and portfolio-level leverage,
    /// before combination weighting. Used for component-level reporting.
    pub signal_before_weighting: Frame,
    /// Combination-weighted, fully leveraged per-asset signals.
    pub final_signal: Frame,
    /// Portfolio-level vol-targeting leverage, if enabled.
    pub portfolio_leverage: Option<Series>,
    /// Combined portfolio return before portfolio-level leverage.
    pub pre_leverage_portfolio_return: Series,
    /// Per-asset vol-targeting leverage, if enabled.
    pub asset_leverage: Option<Frame>,
    /// Per-asset cost-adjusted P&L, columns named by the P&L labels.
    pub asset_pnl: Frame,
}

/// Run the weight-construction stage.
pub fn optimize(
    asset_returns: &Frame,
    signal: &Frame,
    pnl_labels: &[String],
    config: &PipelineConfig,
) -> Optimized {
    let dates = signal.dates().to_vec();

    // 1. Signal-level vol targeting.
    let (leveraged_signal, asset_leverage) = match &config.signal_vol_target {
        Some(vt) => {
            let lev_columns: Vec<(String, Series)> = asset_returns
                .iter()
                .map(|(name, col)| {
                    (
                        name.to_string(),
                        leverage(&dates, col, LeverageInput::Returns, vt),
                    )
                })
                .collect();
            let lev = Frame::from_columns(dates.clone(), lev_columns)
                .expect("returns axis already validated");
            (signal.mul_elementwise(&lev), Some(lev))
        }
        None => (signal.clone(), None),
    };

    // 2. Per-asset P&L net of cost.
    let asset_pnl = returns_with_cost(
        &leveraged_signal,
        asset_returns,
        pnl_labels,
        config.transaction_cost,
        config.roll_cost,
    );

    // 3. Cross-sectional combination.
    let combined = combine(&asset_pnl, &config.combination);

    // Combination-weighted signals: each asset scaled by its per-date
    // effective weight.
    let weighted_columns: Vec<(String, Series)> = leveraged_signal
        .iter()
        .enumerate()
        .map(|(c, (name, col))| {
            let weighted: Series = col
                .iter()
                .zip(combined.weights[c].iter())
                .map(|(s, w)| crate::frame::mul(*s, *w))
                .collect();
            (name.to_string(), weighted)
        })
        .collect();
    let weighted_signal = Frame::from_columns(dates.clone(), weighted_columns)
        .expect("signal axis already validated");

    // 4. Portfolio-level vol targeting, applied to both signal sets.
    match &config.portfolio_vol_target {
        Some(vt) => {
            let lev = leverage(
                &dates,
                &combined.aggregate,
                LeverageInput::Returns,
                vt,
            );
            Optimized {
                signal_before_weighting: leveraged_signal.scale_rows(&lev),
                final_signal: weighted_signal.scale_rows(&lev),
                portfolio_leverage: Some(lev),
                pre_leverage_portfolio_return: combined.aggregate,
                asset_leverage,
                asset_pnl,
            }
        }
        None => Optimized {
            signal_before_weighting: leveraged_signal,
            final_signal: weighted_signal,
            portfolio_leverage: None,
            pre_leverage_portfolio_return: combined.aggregate,
            asset_leverage,
            asset_pnl,
        },
    }
}

/// Combine a frame of return columns into one series under a policy.
/// Exposed for callers that aggregate member portfolios into a composite.
pub fn combine_returns(returns: &Frame, policy: &Combination) -> Series {
    combine(returns, policy).aggregate
}

struct Combined {
    aggregate: Series,
    /// Per-asset effective weight per date (column-major, same order as
    /// the P&L frame's columns).
    weights: Vec<Series>,
}

/// Combine per-asset P&L into one portfolio return under the policy.
///
/// An asset is active on a date iff its P&L is defined there. A date with
/// no active assets yields an undefined aggregate, never zero: the
/// zero-weight guard substitutes 1.0 as the divisor (avoiding a division
/// by zero) and the aggregate cell is then explicitly overwritten to
/// undefined.
fn combine(asset_pnl: &Frame, policy: &Combination) -> Combined {
    let n = asset_pnl.n_rows();
    let k = asset_pnl.n_cols();
    let mut aggregate: Series = vec![None; n];
    let mut weights: Vec<Series> = vec![vec![None; n]; k];

    let base: Vec<f64> = match policy {
        Combination::Sum | Combination::Mean => vec![1.0; k],
        Combination::Weighted { weights } | Combination::WeightedSum { weights } => asset_pnl
            .names()
            .iter()
            .map(|name| weights.get(name).copied().unwrap_or(0.0))
            .collect(),
    };
    let normalize = matches!(policy, Combination::Mean | Combination::Weighted { .. });

    for t in 0..n {
        let active: Vec<Option<f64>> = (0..k).map(|c| asset_pnl.column_at(c)[t]).collect();
        let raw: Vec<f64> = (0..k)
            .map(|c| if active[c].is_some() { base[c] } else { 0.0 })
            .collect();
        let weight_sum: f64 = raw.iter().sum();
        let any_active = active.iter().any(|v| v.is_some()) && weight_sum != 0.0;

        let divisor = if normalize {
            if weight_sum == 0.0 {
                1.0
            } else {
                weight_sum
            }
        } else {
            1.0
        };

        let mut acc = 0.0;
        for c in 0..k {
            let w = raw[c] / divisor;
            weights[c][t] = Some(w);
            if let Some(pnl) = active[c] {
                acc += w * pnl;
            }
        }
        aggregate[t] = if any_active { Some(acc) } else { None };
    }

    Combined { aggregate, weights }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn frame(cols: &[(&str, &[Option<f64>])]) -> Frame {
        let n = cols[0].1.len();
        let dates: Vec<NaiveDate> = (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2024, 6, 3).unwrap() + chrono::Duration::days(i as i64))
            .collect();
        Frame::from_columns(
            dates,
            cols.iter()
                .map(|(n, v)| (n.to_string(), v.to_vec()))
                .collect(),
        )
        .unwrap()
    }

    fn combine_policy(pnl: &Frame, policy: Combination) -> Series {
        combine(pnl, &policy).aggregate
    }

    #[test]
    fn mean_averages_active_assets() {
        let pnl = frame(&[
            ("a", &[Some(0.02), Some(0.04), None]),
            ("b", &[Some(0.00), None, None]),
        ]);
        let out = combine_policy(&pnl, Combination::Mean);
        assert!((out[0].unwrap() - 0.01).abs() < 1e-12);
        // Only 'a' active: full weight on it.
        assert!((out[1].unwrap() - 0.04).abs() < 1e-12);
        // No active assets: undefined, never zero.
        assert_eq!(out[2], None);
    }

    #[test]
    fn sum_adds_without_normalizing() {
        let pnl = frame(&[
            ("a", &[Some(0.02), Some(0.04)]),
            ("b", &[Some(0.01), None]),
        ]);
        let out = combine_policy(&pnl, Combination::Sum);
        assert!((out[0].unwrap() - 0.03).abs() < 1e-12);
        assert!((out[1].unwrap() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn weighted_renormalizes_to_active_assets() {
        let mut w = BTreeMap::new();
        w.insert("a".to_string(), 3.0);
        w.insert("b".to_string(), 1.0);
        let pnl = frame(&[
            ("a", &[Some(0.04), None]),
            ("b", &[Some(0.00), Some(0.02)]),
        ]);
        let out = combine_policy(&pnl, Combination::Weighted { weights: w });
        // Both active: 0.75 * 0.04 + 0.25 * 0.00
        assert!((out[0].unwrap() - 0.03).abs() < 1e-12);
        // Only 'b' active: its weight renormalizes to 1.
        assert!((out[1].unwrap() - 0.02).abs() < 1e-12);
    }

    #[test]
    fn weighted_sum_shrinks_with_inactive_assets() {
        let mut w = BTreeMap::new();
        w.insert("a".to_string(), 0.5);
        w.insert("b".to_string(), 0.5);
        let pnl = frame(&[
            ("a", &[Some(0.04), None]),
            ("b", &[Some(0.02), Some(0.02)]),
        ]);
        let out = combine_policy(&pnl, Combination::WeightedSum { weights: w });
        assert!((out[0].unwrap() - 0.03).abs() < 1e-12);
        // 'a' inactive: no renormalization, the aggregate is proportionally
        // smaller.
        assert!((out[1].unwrap() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn unknown_label_gets_zero_weight() {
        let mut w = BTreeMap::new();
        w.insert("a".to_string(), 1.0);
        let pnl = frame(&[
            ("a", &[Some(0.04)]),
            ("mystery", &[Some(1.0)]),
        ]);
        let out = combine_policy(&pnl, Combination::Weighted { weights: w });
        assert!((out[0].unwrap() - 0.04).abs() < 1e-12);
    }

    #[test]
    fn optimize_without_vol_targets_is_plain_combination() {
        let returns = frame(&[
            ("a", &[None, Some(0.01), Some(0.02)]),
            ("b", &[None, Some(-0.01), Some(0.00)]),
        ]);
        let signal = frame(&[
            ("a", &[Some(1.0), Some(1.0), Some(1.0)]),
            ("b", &[Some(-1.0), Some(-1.0), Some(-1.0)]),
        ]);
        let config = PipelineConfig::builder(0.0, 0.0).build();
        let labels = vec!["pnl_a".to_string(), "pnl_b".to_string()];
        let out = optimize(&returns, &signal, &labels, &config);

        assert!(out.asset_leverage.is_none());
        assert!(out.portfolio_leverage.is_none());
        assert_eq!(out.asset_pnl.names(), &["pnl_a", "pnl_b"]);
        // t=1: mean(1·0.01, −1·(−0.01)) = 0.01
        assert!((out.pre_leverage_portfolio_return[1].unwrap() - 0.01).abs() < 1e-12);
        // Mean weighting halves each final signal.
        assert_eq!(out.final_signal.column("a").unwrap()[1], Some(0.5));
        assert_eq!(out.signal_before_weighting.column("a").unwrap()[1], Some(1.0));
    }

    #[test]
    fn signal_vol_target_scales_signal_and_reports_leverage() {
        let n = 30;
        let dates: Vec<NaiveDate> = (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64))
            .collect();
        let rets: Series = (0..n)
            .map(|t| {
                if t == 0 {
                    None
                } else {
                    Some(if t % 2 == 0 { 0.01 } else { -0.01 })
                }
            })
            .collect();
        let ones: Series = vec![Some(1.0); n];
        let returns =
            Frame::from_columns(dates.clone(), vec![("a".to_string(), rets)]).unwrap();
        let signal = Frame::from_columns(dates, vec![("a".to_string(), ones)]).unwrap();

        let config = PipelineConfig::builder(0.0, 0.0)
            .signal_vol_target(crate::config::VolTarget::new(0.10, 10))
            .build();
        let out = optimize(&returns, &signal, &["pnl_a".to_string()], &config);

        let lev = out.asset_leverage.unwrap();
        let lev_col = lev.column("a").unwrap();
        assert!(lev_col[5].is_none(), "warm-up");
        let t = 15;
        let expected = lev_col[t].unwrap();
        // The leveraged signal is reflected in the P&L magnitude at t+1.
        let pnl = out.asset_pnl.column("pnl_a").unwrap()[t + 1].unwrap();
        assert!((pnl.abs() - expected * 0.01).abs() < 1e-9);
    }
}
