//! Artifact export — JSON and CSV generation for completed runs.
//!
//! All persisted artifacts carry a `schema_version` field; artifacts from
//! a newer schema than this build understands are rejected on import.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use siglab_core::frame::{Frame, Series};
use siglab_core::pipeline::BacktestOutputs;

use crate::metrics::PerformanceMetrics;

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Persisted form of a completed run: named outputs plus summary metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunArtifact {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub name: String,
    pub metrics: PerformanceMetrics,
    pub outputs: BacktestOutputs,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl RunArtifact {
    /// Wrap pipeline outputs with summary metrics for persistence.
    pub fn new(name: impl Into<String>, outputs: BacktestOutputs, obs_per_year: f64) -> Self {
        let metrics = PerformanceMetrics::compute(
            &outputs.portfolio_return,
            &outputs.portfolio_index,
            obs_per_year,
        );
        Self {
            schema_version: SCHEMA_VERSION,
            name: name.into(),
            metrics,
            outputs,
        }
    }
}

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `RunArtifact` to pretty JSON.
pub fn export_json(artifact: &RunArtifact) -> Result<String> {
    serde_json::to_string_pretty(artifact).context("failed to serialize RunArtifact to JSON")
}

/// Deserialize a `RunArtifact`, rejecting unknown newer schema versions.
pub fn import_json(json: &str) -> Result<RunArtifact> {
    let artifact: RunArtifact =
        serde_json::from_str(json).context("failed to deserialize RunArtifact from JSON")?;
    if artifact.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            artifact.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(artifact)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export a date-indexed single series (index curve, return stream) as
/// two-column CSV. Undefined cells become empty fields.
pub fn export_series_csv(label: &str, dates: &[NaiveDate], series: &Series) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", label])
        .context("failed to write CSV header")?;
    for (date, cell) in dates.iter().zip(series.iter()) {
        let value = cell.map(|v| v.to_string()).unwrap_or_default();
        wtr.write_record([date.to_string(), value])
            .context("failed to write CSV row")?;
    }
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

/// Export a frame (per-asset P&L, signals, indices) as CSV with one
/// column per asset. Undefined cells become empty fields.
pub fn export_frame_csv(frame: &Frame) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header: Vec<String> = vec!["date".to_string()];
    header.extend(frame.names().iter().cloned());
    wtr.write_record(&header).context("failed to write CSV header")?;

    for (t, date) in frame.dates().iter().enumerate() {
        let mut row: Vec<String> = vec![date.to_string()];
        for c in 0..frame.n_cols() {
            row.push(
                frame.column_at(c)[t]
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            );
        }
        wtr.write_record(&row).context("failed to write CSV row")?;
    }
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output was not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_csv_has_empty_fields_for_undefined() {
        let dates = vec![
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        ];
        let series: Series = vec![Some(100.0), None];
        let csv = export_series_csv("index", &dates, &series).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "date,index");
        assert_eq!(lines.next().unwrap(), "2024-01-02,100");
        assert_eq!(lines.next().unwrap(), "2024-01-03,");
    }

    #[test]
    fn frame_csv_round_layout() {
        let dates = vec![NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()];
        let frame = Frame::from_columns(
            dates,
            vec![
                ("a".to_string(), vec![Some(1.5)]),
                ("b".to_string(), vec![None]),
            ],
        )
        .unwrap();
        let csv = export_frame_csv(&frame).unwrap();
        let mut lines = csv.lines();
        assert_eq!(lines.next().unwrap(), "date,a,b");
        assert_eq!(lines.next().unwrap(), "2024-01-02,1.5,");
    }
}
