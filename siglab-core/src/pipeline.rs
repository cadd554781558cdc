//! Pipeline orchestration — the full signal-to-P&L control flow.
//!
//! Aligner → optional stop/take overlay → portfolio weight construction →
//! exposure calculator → position clip → re-apply clip to signals and
//! leverage → recompute exposures → final portfolio return and indices.
//!
//! A run is a deterministic, single-pass numeric computation: no I/O, no
//! blocking, no shared mutable state. Identical inputs and configuration
//! produce bit-identical outputs.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::align::{align, AlignError};
use crate::config::PipelineConfig;
use crate::exposure::{self, ExposureSummary};
use crate::fingerprint::ConfigHash;
use crate::frame::{mul, Frame, Series};
use crate::overlay::apply_stop_take;
use crate::portfolio::optimize;
use crate::returns::{cumulative_index, cumulative_index_frame, trade_count};
use crate::risk::clip;

/// Errors from a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("alignment error: {0}")]
    Align(#[from] AlignError),
    #[error("got {got} P&L labels for {expected} assets")]
    LabelCount { expected: usize, got: usize },
}

/// Raw market inputs for a run, as supplied by the data loader.
#[derive(Debug, Clone)]
pub struct MarketInputs {
    /// One price column per traded asset.
    pub prices: Frame,
    /// Raw signal matrix, one column per asset (same column order as
    /// prices).
    pub signal: Frame,
    /// Optional contract-value-per-unit matrix.
    pub contract_values: Option<Frame>,
    /// Labels for the per-asset P&L columns. Defaults to the signal
    /// column names when empty; otherwise must supply one label per
    /// asset.
    pub pnl_labels: Vec<String>,
}

/// Read-only named outputs of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestOutputs {
    /// The common date axis of every series below.
    pub dates: Vec<NaiveDate>,
    /// Per-asset cost-adjusted P&L before portfolio-level adjustment.
    pub asset_pnl: Frame,
    /// Per-asset P&L after portfolio leverage and position clip.
    pub asset_pnl_adjusted: Frame,
    /// Final portfolio return stream.
    pub portfolio_return: Series,
    /// Cumulative portfolio index, base 100.
    pub portfolio_index: Series,
    /// Cumulative index per asset P&L column, base 100.
    pub asset_index: Frame,
    /// Portfolio-level leverage after the position clip, if vol targeting
    /// was enabled.
    pub portfolio_leverage: Option<Series>,
    /// Per-asset vol-targeting leverage, if enabled.
    pub asset_leverage: Option<Frame>,
    /// Fully adjusted, combination-weighted per-asset signals.
    pub final_signal: Frame,
    /// Per-asset signals before combination weighting (component-level
    /// reporting).
    pub signal_before_weighting: Frame,
    /// Final signals scaled to notional positions, if a notional was
    /// configured.
    pub notional_positions: Option<Frame>,
    /// Notional positions divided by contract value, if both were
    /// supplied.
    pub contract_positions: Option<Frame>,
    /// Exposure summary of the final (clipped) signals.
    pub exposure: ExposureSummary,
    /// Position-clip adjustment actually applied, in (0, 1].
    pub clip_adjustment: Series,
    /// Signal changes per asset on the executable (post-overlay) signal.
    pub trade_counts: BTreeMap<String, usize>,
    /// Fingerprint of the configuration that produced this run.
    pub config_hash: ConfigHash,
}

/// Run the full pipeline over one set of market inputs.
pub fn run(inputs: &MarketInputs, config: &PipelineConfig) -> Result<BacktestOutputs, PipelineError> {
    let aligned = align(
        &inputs.prices,
        &inputs.signal,
        inputs.contract_values.as_ref(),
        config.signal_delay,
    )?;
    let dates = aligned.prices.dates().to_vec();
    let asset_returns = aligned.prices.simple_returns();

    // Optional stop/take overlay, then the executable signal is frozen.
    let executable = if config.overlay_active() {
        apply_stop_take(
            &aligned.signal,
            &asset_returns,
            config.stop_loss.unwrap_or(f64::NEG_INFINITY),
            config.take_profit.unwrap_or(f64::INFINITY),
            &aligned.non_trading,
        )
    } else {
        aligned.signal.clone()
    };

    let labels: Vec<String> = if inputs.pnl_labels.is_empty() {
        executable.names().to_vec()
    } else if inputs.pnl_labels.len() == executable.n_cols() {
        inputs.pnl_labels.clone()
    } else {
        return Err(PipelineError::LabelCount {
            expected: executable.n_cols(),
            got: inputs.pnl_labels.len(),
        });
    };

    let optimized = optimize(&asset_returns, &executable, &labels, config);

    // First exposure pass feeds the position clip.
    let pre_clip_exposure = exposure::summarize(&optimized.final_signal);
    let clip_adjustment: Series = match &config.position_clip {
        Some(pc) => clip(
            &dates,
            &pre_clip_exposure.net_exposure,
            &pre_clip_exposure.total_exposure,
            pc,
        ),
        None => vec![Some(1.0); dates.len()],
    };

    // Re-apply the clip to every per-asset signal and to the portfolio
    // leverage, then recompute exposures.
    let final_signal = optimized.final_signal.scale_rows(&clip_adjustment);
    let signal_before_weighting = optimized
        .signal_before_weighting
        .scale_rows(&clip_adjustment);
    let portfolio_leverage = optimized.portfolio_leverage.as_ref().map(|lev| {
        lev.iter()
            .zip(clip_adjustment.iter())
            .map(|(l, a)| mul(*l, *a))
            .collect::<Series>()
    });
    let exposure = exposure::summarize(&final_signal);

    // Final leverage multiplier on the combined return stream: portfolio
    // vol-target leverage (already lagged via its period shift) times the
    // clip adjustment.
    let multiplier: Series = match &portfolio_leverage {
        Some(lev) => lev.clone(),
        None => clip_adjustment.clone(),
    };
    let portfolio_return: Series = optimized
        .pre_leverage_portfolio_return
        .iter()
        .zip(multiplier.iter())
        .map(|(r, m)| mul(*r, *m))
        .collect();
    let asset_pnl_adjusted = optimized.asset_pnl.scale_rows(&multiplier);

    let portfolio_index = cumulative_index(&portfolio_return, config.cum_index);
    let asset_index = cumulative_index_frame(&optimized.asset_pnl, config.cum_index);

    let notional_positions = config
        .notional
        .map(|n| exposure::notional_positions(&final_signal, n));
    let contract_positions = match (&notional_positions, &aligned.contract_values) {
        (Some(notional), Some(cv)) => Some(exposure::contract_positions(notional, cv)),
        _ => None,
    };

    let trade_counts: BTreeMap<String, usize> = executable
        .iter()
        .map(|(name, col)| (name.to_string(), trade_count(col)))
        .collect();

    let outputs = BacktestOutputs {
        dates,
        asset_pnl: optimized.asset_pnl,
        asset_pnl_adjusted,
        portfolio_return,
        portfolio_index,
        asset_index,
        portfolio_leverage,
        asset_leverage: optimized.asset_leverage,
        final_signal,
        signal_before_weighting,
        notional_positions,
        contract_positions,
        exposure,
        clip_adjustment,
        trade_counts,
        config_hash: ConfigHash::of(config),
    };

    Ok(restrict_outputs(outputs, config.display_range))
}

/// Display-only trim of every output series to the configured date range.
/// The computation itself always runs over the full aligned calendar.
fn restrict_outputs(
    outputs: BacktestOutputs,
    range: (Option<NaiveDate>, Option<NaiveDate>),
) -> BacktestOutputs {
    let (from, to) = range;
    if from.is_none() && to.is_none() {
        return outputs;
    }

    let keep: Vec<usize> = outputs
        .dates
        .iter()
        .enumerate()
        .filter(|(_, d)| from.map_or(true, |f| **d >= f) && to.map_or(true, |t| **d <= t))
        .map(|(i, _)| i)
        .collect();
    let take = |s: &Series| -> Series { keep.iter().map(|&i| s[i]).collect() };

    BacktestOutputs {
        dates: keep.iter().map(|&i| outputs.dates[i]).collect(),
        asset_pnl: outputs.asset_pnl.restrict(from, to),
        asset_pnl_adjusted: outputs.asset_pnl_adjusted.restrict(from, to),
        portfolio_return: take(&outputs.portfolio_return),
        portfolio_index: take(&outputs.portfolio_index),
        asset_index: outputs.asset_index.restrict(from, to),
        portfolio_leverage: outputs.portfolio_leverage.as_ref().map(&take),
        asset_leverage: outputs.asset_leverage.map(|f| f.restrict(from, to)),
        final_signal: outputs.final_signal.restrict(from, to),
        signal_before_weighting: outputs.signal_before_weighting.restrict(from, to),
        notional_positions: outputs.notional_positions.map(|f| f.restrict(from, to)),
        contract_positions: outputs.contract_positions.map(|f| f.restrict(from, to)),
        exposure: ExposureSummary {
            total_longs: take(&outputs.exposure.total_longs),
            total_shorts: take(&outputs.exposure.total_shorts),
            net_exposure: take(&outputs.exposure.net_exposure),
            total_exposure: take(&outputs.exposure.total_exposure),
        },
        clip_adjustment: take(&outputs.clip_adjustment),
        trade_counts: outputs.trade_counts,
        config_hash: outputs.config_hash,
    }
}
