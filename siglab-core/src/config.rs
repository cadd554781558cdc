//! Pipeline configuration — one immutable record per backtest run.
//!
//! Policy strings from the outside world ("mult", "mean", ...) are parsed
//! once into closed enums; everything downstream dispatches by `match`.
//! Transaction and roll costs are converted from one-way basis points to
//! the pre-halved per-turnover fraction at construction time, because the
//! round trip is charged on both entry and exit turnover.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::frame::{Frequency, Resample};

/// Fatal configuration errors, rejected before any computation starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unrecognized cumulative index convention '{0}' (expected 'mult' or 'add')")]
    UnknownCumIndex(String),
    #[error("unrecognized portfolio combination '{0}' (expected 'sum', 'mean', 'weighted' or 'weighted-sum')")]
    UnknownCombination(String),
    #[error("combination '{0}' requires a name -> weight mapping")]
    MissingWeights(&'static str),
}

/// Cumulative index convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CumIndex {
    /// `index(t) = index(t-1) * (1 + ret(t))`, base 100.
    #[default]
    Mult,
    /// `index(t) = 100 + 100 * sum of returns`, base 100.
    Add,
}

impl FromStr for CumIndex {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mult" => Ok(CumIndex::Mult),
            "add" => Ok(CumIndex::Add),
            other => Err(ConfigError::UnknownCumIndex(other.to_string())),
        }
    }
}

/// Cross-sectional policy for combining per-asset P&L into one portfolio
/// return. `Weighted`/`WeightedSum` carry their base weights by P&L label;
/// labels absent from the map get base weight zero.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum Combination {
    /// Unweighted row-sum of the defined per-asset P&L cells.
    Sum,
    /// Row-mean over the assets active (defined) on each date.
    #[default]
    Mean,
    /// Caller-supplied base weights, renormalized per date so the weights
    /// of active assets sum to 1.
    Weighted { weights: BTreeMap<String, f64> },
    /// Caller-supplied base weights applied as-is, without renormalizing.
    WeightedSum { weights: BTreeMap<String, f64> },
}

impl Combination {
    /// Parse the external string form, pairing the policy name with an
    /// optional weight map.
    pub fn parse(
        name: Option<&str>,
        weights: Option<BTreeMap<String, f64>>,
    ) -> Result<Self, ConfigError> {
        match name {
            None | Some("mean") => Ok(Combination::Mean),
            Some("sum") => Ok(Combination::Sum),
            Some("weighted") => Ok(Combination::Weighted {
                weights: weights.ok_or(ConfigError::MissingWeights("weighted"))?,
            }),
            Some("weighted-sum") => Ok(Combination::WeightedSum {
                weights: weights.ok_or(ConfigError::MissingWeights("weighted-sum"))?,
            }),
            Some(other) => Err(ConfigError::UnknownCombination(other.to_string())),
        }
    }
}

/// Volatility-targeting parameters for the leverage calculation. Used at
/// both the per-asset and the portfolio level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolTarget {
    /// Target annualized volatility (e.g. 0.10 for 10%).
    pub vol_target: f64,
    /// Cap on the leverage factor. No floor exists.
    pub max_leverage: Option<f64>,
    /// Rolling window length, in periods, for the realized-vol estimate.
    pub window: usize,
    /// Observations per year used to annualize the rolling vol (252 for
    /// daily data).
    pub obs_per_year: f64,
    /// Extra lag applied to the finished leverage series, on top of the
    /// rolling window's inherent lag.
    pub period_shift: usize,
    /// Coarser calendar on which leverage is allowed to change, with the
    /// aggregation used per bucket. `None` means leverage may change daily.
    pub rebalance: Option<(Frequency, Resample)>,
}

impl VolTarget {
    /// Daily vol targeting with a 10% target and no cap, rebalance or
    /// extra shift. A convenient base for tests and callers.
    pub fn new(vol_target: f64, window: usize) -> Self {
        Self {
            vol_target,
            max_leverage: None,
            window,
            obs_per_year: 252.0,
            period_shift: 0,
            rebalance: None,
        }
    }
}

/// Hard position-limit parameters for the clip adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionClip {
    /// Clip threshold on |net exposure|.
    pub max_net_exposure: Option<f64>,
    /// Clip threshold on total (absolute) exposure. Where both limits are
    /// configured, this rule overwrites the net-exposure rule.
    pub max_abs_exposure: Option<f64>,
    /// Lag applied to the exposure series before comparison.
    pub period_shift: usize,
    /// Coarser calendar on which the adjustment is allowed to change.
    pub rebalance: Option<(Frequency, Resample)>,
}

/// Immutable per-run pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Anti-look-ahead lag: a signal computed through day T is first
    /// actionable on day T + delay.
    pub signal_delay: usize,
    /// Pre-halved transaction cost per unit turnover. See
    /// [`PipelineConfig::builder`].
    pub transaction_cost: f64,
    /// Pre-halved roll cost per unit held.
    pub roll_cost: f64,
    /// Stop-loss threshold on the open trade's cumulative return
    /// (negative). The overlay only activates when take-profit is also set.
    pub stop_loss: Option<f64>,
    /// Take-profit threshold on the open trade's cumulative return
    /// (positive). The overlay only activates when stop-loss is also set.
    pub take_profit: Option<f64>,
    /// Per-asset (signal-level) vol targeting.
    pub signal_vol_target: Option<VolTarget>,
    /// Portfolio-level vol targeting on the combined return stream.
    pub portfolio_vol_target: Option<VolTarget>,
    /// Hard exposure limits.
    pub position_clip: Option<PositionClip>,
    /// Cross-sectional combination policy.
    pub combination: Combination,
    /// Cumulative index convention.
    pub cum_index: CumIndex,
    /// Notional amount used to scale final signals into positions.
    pub notional: Option<f64>,
    /// Display-only date-range trim applied to outputs.
    pub display_range: (Option<NaiveDate>, Option<NaiveDate>),
}

impl PipelineConfig {
    /// Start a config from one-way costs in basis points. The builder
    /// performs the bp → pre-halved-fraction conversion exactly once.
    pub fn builder(transaction_cost_bp: f64, roll_cost_bp: f64) -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: PipelineConfig {
                signal_delay: 0,
                transaction_cost: halved_cost(transaction_cost_bp),
                roll_cost: halved_cost(roll_cost_bp),
                stop_loss: None,
                take_profit: None,
                signal_vol_target: None,
                portfolio_vol_target: None,
                position_clip: None,
                combination: Combination::default(),
                cum_index: CumIndex::default(),
                notional: None,
                display_range: (None, None),
            },
        }
    }

    /// Whether the stop/take overlay runs: both thresholds must be set.
    pub fn overlay_active(&self) -> bool {
        self.stop_loss.is_some() && self.take_profit.is_some()
    }
}

/// One-way bp cost → pre-halved per-turnover fraction. The round trip is
/// charged on both entry and exit turnover, hence the division by 2.
fn halved_cost(bp: f64) -> f64 {
    bp / (2.0 * 100.0 * 100.0)
}

/// Builder for [`PipelineConfig`].
#[derive(Debug, Clone)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn signal_delay(mut self, periods: usize) -> Self {
        self.config.signal_delay = periods;
        self
    }

    pub fn stop_take(mut self, stop_loss: f64, take_profit: f64) -> Self {
        self.config.stop_loss = Some(stop_loss);
        self.config.take_profit = Some(take_profit);
        self
    }

    pub fn signal_vol_target(mut self, vt: VolTarget) -> Self {
        self.config.signal_vol_target = Some(vt);
        self
    }

    pub fn portfolio_vol_target(mut self, vt: VolTarget) -> Self {
        self.config.portfolio_vol_target = Some(vt);
        self
    }

    pub fn position_clip(mut self, clip: PositionClip) -> Self {
        self.config.position_clip = Some(clip);
        self
    }

    pub fn combination(mut self, combination: Combination) -> Self {
        self.config.combination = combination;
        self
    }

    pub fn cum_index(mut self, cum_index: CumIndex) -> Self {
        self.config.cum_index = cum_index;
        self
    }

    pub fn notional(mut self, notional: f64) -> Self {
        self.config.notional = Some(notional);
        self
    }

    pub fn display_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.config.display_range = (from, to);
        self
    }

    pub fn build(self) -> PipelineConfig {
        self.config
    }
}
