//! Performance metrics — pure functions over the pipeline's return stream
//! and cumulative index. No dependency on the pool or export layers.

use serde::{Deserialize, Serialize};

use siglab_core::frame::Series;

/// Aggregate performance metrics for one run or composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub annualized_vol: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub hit_rate: f64,
    /// Defined observations in the return stream.
    pub observations: usize,
}

impl PerformanceMetrics {
    /// Compute all metrics from the return stream and its index. The
    /// index is assumed base-100; undefined cells are skipped.
    pub fn compute(returns: &Series, index: &Series, obs_per_year: f64) -> Self {
        let defined: Vec<f64> = returns.iter().filter_map(|v| *v).collect();
        Self {
            total_return: total_return(index),
            cagr: cagr(&defined, obs_per_year),
            annualized_vol: annualized_vol(&defined, obs_per_year),
            sharpe: sharpe(&defined, obs_per_year),
            max_drawdown: max_drawdown(index),
            hit_rate: hit_rate(&defined),
            observations: defined.len(),
        }
    }
}

/// Last defined index level over the first, minus one.
fn total_return(index: &Series) -> f64 {
    let levels: Vec<f64> = index.iter().filter_map(|v| *v).collect();
    match (levels.first(), levels.last()) {
        (Some(first), Some(last)) if *first != 0.0 => last / first - 1.0,
        _ => 0.0,
    }
}

fn cagr(returns: &[f64], obs_per_year: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let growth: f64 = returns.iter().map(|r| 1.0 + r).product();
    let years = returns.len() as f64 / obs_per_year;
    if years <= 0.0 || growth <= 0.0 {
        return 0.0;
    }
    growth.powf(1.0 / years) - 1.0
}

fn annualized_vol(returns: &[f64], obs_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>()
        / (returns.len() as f64 - 1.0);
    var.sqrt() * obs_per_year.sqrt()
}

fn sharpe(returns: &[f64], obs_per_year: f64) -> f64 {
    let vol = annualized_vol(returns, obs_per_year);
    if vol == 0.0 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    mean * obs_per_year / vol
}

/// Deepest peak-to-trough loss of the index, as a negative fraction.
fn max_drawdown(index: &Series) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0_f64;
    for level in index.iter().filter_map(|v| *v) {
        peak = peak.max(level);
        if peak > 0.0 {
            worst = worst.min(level / peak - 1.0);
        }
    }
    worst
}

/// Share of defined periods with a strictly positive return.
fn hit_rate(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
}
