//! Basket orchestration — one pipeline run per sub-strategy, in parallel.
//!
//! Members are dispatched to the worker pool and recombined strictly in
//! submission order, so composite columns match the input basket ordering
//! no matter which worker finishes first. A failing member's error
//! surfaces when its slot is collected; sibling runs are not cancelled.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use siglab_core::config::{Combination, CumIndex, PipelineConfig};
use siglab_core::frame::{Frame, Series};
use siglab_core::pipeline::{run, BacktestOutputs, MarketInputs};
use siglab_core::portfolio::combine_returns;
use siglab_core::returns::cumulative_index;

use crate::pool::WorkerPool;

/// One sub-strategy of a composite portfolio.
#[derive(Debug, Clone)]
pub struct BasketMember {
    pub name: String,
    pub inputs: MarketInputs,
    pub config: PipelineConfig,
}

/// Composite result: per-member outputs in submission order plus the
/// combined portfolio return and index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BasketResult {
    /// Member names and their outputs, in the original basket order.
    pub members: Vec<(String, BacktestOutputs)>,
    /// Union calendar of all member runs.
    pub dates: Vec<NaiveDate>,
    /// Member portfolio returns combined under the basket policy.
    pub composite_return: Series,
    /// Cumulative composite index, base 100.
    pub composite_index: Series,
}

/// Run every member through the pool and recombine in submission order.
pub fn run_basket(
    pool: &WorkerPool,
    members: Vec<BasketMember>,
    combination: &Combination,
    cum_index: CumIndex,
) -> Result<BasketResult> {
    // Dispatch everything first so workers stay busy, then collect in
    // submission order.
    let handles: Vec<_> = members
        .into_iter()
        .map(|member| {
            let name = member.name.clone();
            let handle = pool.submit(move || run(&member.inputs, &member.config));
            (name, handle)
        })
        .collect();

    let mut collected: Vec<(String, BacktestOutputs)> = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let outputs = handle
            .collect()
            .with_context(|| format!("basket member '{name}' was lost"))?
            .with_context(|| format!("basket member '{name}' failed"))?;
        collected.push((name, outputs));
    }

    let dates = union_calendar(&collected);
    let member_returns = member_return_frame(&collected, &dates)?;
    let composite_return = combine_returns(&member_returns, combination);
    let composite_index = cumulative_index(&composite_return, cum_index);

    Ok(BasketResult {
        members: collected,
        dates,
        composite_return,
        composite_index,
    })
}

fn union_calendar(members: &[(String, BacktestOutputs)]) -> Vec<NaiveDate> {
    let mut all: BTreeSet<NaiveDate> = BTreeSet::new();
    for (_, outputs) in members {
        all.extend(outputs.dates.iter().copied());
    }
    all.into_iter().collect()
}

/// Member portfolio returns as one frame on the union calendar, columns
/// in basket order.
fn member_return_frame(
    members: &[(String, BacktestOutputs)],
    dates: &[NaiveDate],
) -> Result<Frame> {
    let mut frame = Frame::new(dates.to_vec()).context("invalid union calendar")?;
    for (name, outputs) in members {
        let member = Frame::from_columns(
            outputs.dates.clone(),
            vec![(name.clone(), outputs.portfolio_return.clone())],
        )
        .with_context(|| format!("member '{name}' has an invalid calendar"))?;
        let joined = member.reindex(dates);
        let column = joined
            .column(name)
            .with_context(|| format!("member '{name}' column lost in reindex"))?
            .clone();
        frame
            .push_column(name.clone(), column)
            .with_context(|| format!("member '{name}' column length mismatch"))?;
    }
    Ok(frame)
}
