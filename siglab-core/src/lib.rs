//! SigLab Core — signal-to-P&L transformation pipeline for backtesting
//! systematic strategies.
//!
//! The pipeline turns a raw trading signal and an asset price series into
//! a risk-adjusted, transaction-cost-aware, portfolio-level return stream:
//! - Calendar alignment with anti-look-ahead signal delay and holiday rules
//! - Optional per-trade stop-loss / take-profit overlay
//! - Risk engine: vol-targeting leverage and hard position-limit clips
//! - Cross-sectional combination policies (sum / mean / weighted variants)
//! - Transaction- and roll-cost-adjusted cumulative index construction
//!
//! A run is pure and deterministic; parallel orchestration of independent
//! runs lives in `siglab-runner`.

pub mod align;
pub mod config;
pub mod exposure;
pub mod fingerprint;
pub mod frame;
pub mod overlay;
pub mod pipeline;
pub mod portfolio;
pub mod returns;
pub mod risk;

pub use align::{align, Aligned, AlignError};
pub use config::{
    Combination, ConfigError, CumIndex, PipelineConfig, PositionClip, VolTarget,
};
pub use exposure::ExposureSummary;
pub use fingerprint::ConfigHash;
pub use frame::{Frame, FrameError, Frequency, Resample, Series};
pub use pipeline::{run, BacktestOutputs, MarketInputs, PipelineError};
