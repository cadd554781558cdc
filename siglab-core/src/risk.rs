//! Risk engine — two independent numeric services.
//!
//! 1. `leverage()`: volatility-targeting leverage factor from a rolling
//!    realized-vol estimate, capped, lagged, optionally held constant
//!    between rebalance dates.
//! 2. `clip()`: position-limit adjustment in (0, 1] that shrinks (never
//!    amplifies) signals and portfolio leverage when net or absolute
//!    exposure breaches a hard limit.

use chrono::NaiveDate;

use crate::config::{PositionClip, VolTarget};
use crate::frame::{resample_ffill, rolling_std, shift_series, Series};

/// Whether the leverage input series holds returns or price levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeverageInput {
    Returns,
    Prices,
}

/// Volatility-targeting leverage factor, aligned to the input index.
///
/// `leverage(t) = vol_target / (rolling_std(returns, window) · sqrt(obs_per_year))`,
/// capped at `max_leverage` (no floor), shifted by `period_shift` beyond
/// the rolling window's inherent lag. The first `window` positions are
/// undefined regardless of shift: the rolling statistic has insufficient
/// history there. With a rebalance calendar, leverage only changes on
/// rebalance dates.
pub fn leverage(
    dates: &[NaiveDate],
    input: &Series,
    kind: LeverageInput,
    vt: &VolTarget,
) -> Series {
    let returns: Series = match kind {
        LeverageInput::Returns => input.clone(),
        LeverageInput::Prices => {
            let mut out: Series = vec![None; input.len()];
            for t in 1..input.len() {
                out[t] = match (input[t - 1], input[t]) {
                    (Some(prev), Some(cur)) if prev != 0.0 => Some(cur / prev - 1.0),
                    _ => None,
                };
            }
            out
        }
    };

    let annualize = vt.obs_per_year.sqrt();
    let mut lev: Series = rolling_std(&returns, vt.window)
        .iter()
        .map(|vol| match vol {
            Some(v) if *v > 0.0 => {
                let raw = vt.vol_target / (v * annualize);
                Some(match vt.max_leverage {
                    Some(cap) => raw.min(cap),
                    None => raw,
                })
            }
            _ => None,
        })
        .collect();

    if vt.period_shift > 0 {
        lev = shift_series(&lev, vt.period_shift);
    }

    // Warm-up: insufficient history for the rolling statistic.
    let warm_up = vt.window.min(lev.len());
    for cell in lev.iter_mut().take(warm_up) {
        *cell = None;
    }

    match vt.rebalance {
        Some((freq, agg)) => resample_ffill(dates, &lev, freq, agg),
        None => lev,
    }
}

/// Position-limit adjustment from exposure series. Values are in (0, 1]:
/// the adjustment shrinks exposure toward the limit, never amplifies it.
///
/// The net-exposure rule runs first; where an absolute-exposure limit is
/// also configured, its rule overwrites (does not compose with) the
/// net-derived value on the dates it triggers.
pub fn clip(
    dates: &[NaiveDate],
    net_exposure: &Series,
    total_exposure: &Series,
    cfg: &PositionClip,
) -> Series {
    let n = net_exposure.len();
    debug_assert_eq!(n, total_exposure.len());
    let mut adjustment: Series = vec![Some(1.0); n];

    if let Some(max_net) = cfg.max_net_exposure {
        let lagged = shift_series(net_exposure, cfg.period_shift);
        for (adj, exp) in adjustment.iter_mut().zip(lagged.iter()) {
            if let Some(e) = exp {
                if e.abs() > max_net {
                    *adj = Some(max_net / e.abs());
                }
            }
        }
    }

    if let Some(max_abs) = cfg.max_abs_exposure {
        let lagged = shift_series(total_exposure, cfg.period_shift);
        for (adj, exp) in adjustment.iter_mut().zip(lagged.iter()) {
            if let Some(e) = exp {
                if e.abs() > max_abs {
                    *adj = Some(max_abs / e.abs());
                }
            }
        }
    }

    match cfg.rebalance {
        Some((freq, agg)) => resample_ffill(dates, &adjustment, freq, agg),
        None => adjustment,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    fn weekdays(n: usize) -> Vec<NaiveDate> {
        let mut out = Vec::with_capacity(n);
        let mut cur = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        while out.len() < n {
            if cur.weekday().number_from_monday() <= 5 {
                out.push(cur);
            }
            cur = cur.succ_opt().unwrap();
        }
        out
    }

    fn alternating_returns(n: usize) -> Series {
        (0..n)
            .map(|t| Some(if t % 2 == 0 { 0.01 } else { -0.01 }))
            .collect()
    }

    #[test]
    fn warm_up_prefix_is_undefined() {
        let n = 30;
        let vt = VolTarget::new(0.10, 10);
        let lev = leverage(&weekdays(n), &alternating_returns(n), LeverageInput::Returns, &vt);
        for (t, cell) in lev.iter().enumerate().take(10) {
            assert!(cell.is_none(), "expected undefined leverage at t={t}");
        }
        assert!(lev[10].is_some(), "first defined value at t=window");
    }

    #[test]
    fn warm_up_holds_regardless_of_shift() {
        let n = 30;
        let mut vt = VolTarget::new(0.10, 10);
        vt.period_shift = 3;
        let lev = leverage(&weekdays(n), &alternating_returns(n), LeverageInput::Returns, &vt);
        for cell in lev.iter().take(10) {
            assert!(cell.is_none());
        }
    }

    #[test]
    fn ceiling_caps_and_never_negative() {
        let n = 40;
        // Tiny realized vol drives raw leverage sky-high.
        let returns: Series = (0..n).map(|t| Some(1e-6 * (t % 2) as f64)).collect();
        let mut vt = VolTarget::new(0.10, 10);
        vt.max_leverage = Some(5.0);
        let lev = leverage(&weekdays(n), &returns, LeverageInput::Returns, &vt);
        for cell in lev.iter().flatten() {
            assert!(*cell <= 5.0);
            assert!(*cell >= 0.0);
        }
        assert!(lev[12].unwrap() >= 4.999, "cap should bind with near-zero vol");
    }

    #[test]
    fn no_floor_allows_tiny_leverage() {
        let n = 40;
        // Huge realized vol drives leverage toward zero; no floor applies.
        let returns: Series = (0..n)
            .map(|t| Some(if t % 2 == 0 { 0.5 } else { -0.5 }))
            .collect();
        let vt = VolTarget::new(0.01, 10);
        let lev = leverage(&weekdays(n), &returns, LeverageInput::Returns, &vt);
        assert!(lev[20].unwrap() < 0.01);
    }

    #[test]
    fn period_shift_lags_the_series() {
        let n = 40;
        let mut returns = alternating_returns(n);
        // Perturb late returns so the leverage series is not constant.
        returns[25] = Some(0.05);
        let base = leverage(
            &weekdays(n),
            &returns,
            LeverageInput::Returns,
            &VolTarget::new(0.10, 10),
        );
        let mut vt = VolTarget::new(0.10, 10);
        vt.period_shift = 2;
        let shifted = leverage(&weekdays(n), &returns, LeverageInput::Returns, &vt);
        for t in 12..n {
            assert_eq!(shifted[t], base[t - 2], "mismatch at t={t}");
        }
    }

    #[test]
    fn price_input_is_differenced_first() {
        let n = 30;
        let prices: Series = (0..n)
            .map(|t| Some(100.0 * 1.01_f64.powi(t as i32 % 2)))
            .collect();
        let vt = VolTarget::new(0.10, 10);
        let from_prices = leverage(&weekdays(n), &prices, LeverageInput::Prices, &vt);
        assert!(from_prices[15].is_some());
    }

    #[test]
    fn rebalance_holds_leverage_between_bucket_ends() {
        use crate::frame::{Frequency, Resample};
        let n = 60;
        let mut returns = alternating_returns(n);
        // Perturb mid-series so bucket aggregates actually differ.
        returns[20] = Some(0.03);
        returns[40] = Some(-0.04);
        let dates = weekdays(n);
        let mut vt = VolTarget::new(0.10, 10);
        vt.rebalance = Some((Frequency::Monthly, Resample::Last));
        let lev = leverage(&dates, &returns, LeverageInput::Returns, &vt);

        for (t, cell) in lev.iter().enumerate().take(10) {
            assert!(cell.is_none(), "warm-up survives rebalancing at t={t}");
        }
        // Held constant inside a bucket: the value may only change on the
        // last in-index date of a month.
        for t in 1..n {
            let bucket_end = t + 1 == n || dates[t + 1].month() != dates[t].month();
            if !bucket_end {
                assert_eq!(lev[t], lev[t - 1], "value changed mid-bucket at t={t}");
            }
        }
        // And it does change across bucket boundaries.
        let defined: Vec<f64> = lev.iter().flatten().copied().collect();
        assert!(defined.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn clip_is_identity_when_within_limits() {
        let n = 5;
        let net: Series = vec![Some(0.5); n];
        let total: Series = vec![Some(0.5); n];
        let cfg = PositionClip {
            max_net_exposure: Some(1.0),
            max_abs_exposure: None,
            period_shift: 0,
            rebalance: None,
        };
        let adj = clip(&weekdays(n), &net, &total, &cfg);
        assert_eq!(adj, vec![Some(1.0); n]);
    }

    #[test]
    fn clip_shrinks_net_breach() {
        let n = 3;
        let net: Series = vec![Some(2.0), Some(-4.0), Some(1.0)];
        let total: Series = vec![Some(2.0), Some(4.0), Some(1.0)];
        let cfg = PositionClip {
            max_net_exposure: Some(1.0),
            max_abs_exposure: None,
            period_shift: 0,
            rebalance: None,
        };
        let adj = clip(&weekdays(n), &net, &total, &cfg);
        assert_eq!(adj, vec![Some(0.5), Some(0.25), Some(1.0)]);
    }

    #[test]
    fn abs_rule_overwrites_net_rule() {
        let n = 2;
        // Net rule would give 0.5; abs rule triggers too and must win.
        let net: Series = vec![Some(2.0), Some(2.0)];
        let total: Series = vec![Some(8.0), Some(8.0)];
        let cfg = PositionClip {
            max_net_exposure: Some(1.0),
            max_abs_exposure: Some(2.0),
            period_shift: 0,
            rebalance: None,
        };
        let adj = clip(&weekdays(n), &net, &total, &cfg);
        assert_eq!(adj, vec![Some(0.25), Some(0.25)]);
    }

    #[test]
    fn clip_lags_exposure_by_period_shift() {
        let n = 3;
        let net: Series = vec![Some(4.0), Some(0.5), Some(0.5)];
        let total: Series = vec![Some(4.0), Some(0.5), Some(0.5)];
        let cfg = PositionClip {
            max_net_exposure: Some(1.0),
            max_abs_exposure: None,
            period_shift: 1,
            rebalance: None,
        };
        let adj = clip(&weekdays(n), &net, &total, &cfg);
        // The breach at t=0 bites at t=1; t=0 has no lagged observation.
        assert_eq!(adj, vec![Some(1.0), Some(0.25), Some(1.0)]);
    }

    #[test]
    fn clip_values_never_exceed_one() {
        let n = 50;
        let net: Series = (0..n).map(|t| Some((t as f64 - 25.0) / 5.0)).collect();
        let total: Series = (0..n).map(|t| Some(t as f64 / 5.0)).collect();
        let cfg = PositionClip {
            max_net_exposure: Some(1.5),
            max_abs_exposure: Some(3.0),
            period_shift: 1,
            rebalance: None,
        };
        let adj = clip(&weekdays(n), &net, &total, &cfg);
        for cell in adj.iter().flatten() {
            assert!(*cell > 0.0 && *cell <= 1.0);
        }
    }
}
