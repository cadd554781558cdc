//! Date-indexed numeric matrix — the common currency of the pipeline.
//!
//! A `Frame` is a strictly-ascending, unique `NaiveDate` axis plus named
//! columns of `Option<f64>` cells. `None` is the explicit "undefined" cell:
//! a non-trading day, a not-yet-warmed-up statistic, or a date an asset had
//! not started trading. Every arithmetic helper propagates `None` the way
//! IEEE arithmetic propagates NaN — an undefined operand yields an
//! undefined result, never zero.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single column of cells. Same length as the owning frame's date axis.
pub type Series = Vec<Option<f64>>;

/// Errors from frame construction and column access.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("dates must be strictly ascending and unique (violation at position {0})")]
    UnsortedDates(usize),
    #[error("column '{name}' has {len} cells but the date axis has {expected}")]
    LengthMismatch {
        name: String,
        len: usize,
        expected: usize,
    },
    #[error("unknown column '{0}'")]
    UnknownColumn(String),
}

/// Coarser calendar used for rebalance resampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl Frequency {
    /// Bucket key for a date: two dates share a bucket iff they fall in the
    /// same week/month/quarter/year.
    fn bucket(&self, date: NaiveDate) -> (i32, u32) {
        match self {
            Frequency::Weekly => {
                let iso = date.iso_week();
                (iso.year(), iso.week())
            }
            Frequency::Monthly => (date.year(), date.month()),
            Frequency::Quarterly => (date.year(), (date.month() - 1) / 3),
            Frequency::Annual => (date.year(), 0),
        }
    }
}

/// Aggregation applied within each rebalance bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resample {
    /// Last defined value in the bucket.
    Last,
    /// Mean of the defined values in the bucket.
    Mean,
}

/// Date-indexed, column-keyed numeric table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    dates: Vec<NaiveDate>,
    names: Vec<String>,
    columns: Vec<Series>,
}

impl Frame {
    /// An empty frame over the given date axis.
    pub fn new(dates: Vec<NaiveDate>) -> Result<Self, FrameError> {
        check_ascending(&dates)?;
        Ok(Self {
            dates,
            names: Vec::new(),
            columns: Vec::new(),
        })
    }

    /// Build a frame from named columns over a shared date axis.
    pub fn from_columns(
        dates: Vec<NaiveDate>,
        columns: Vec<(String, Series)>,
    ) -> Result<Self, FrameError> {
        let mut frame = Self::new(dates)?;
        for (name, values) in columns {
            frame.push_column(name, values)?;
        }
        Ok(frame)
    }

    /// Append a column. Its length must match the date axis.
    pub fn push_column(&mut self, name: String, values: Series) -> Result<(), FrameError> {
        if values.len() != self.dates.len() {
            return Err(FrameError::LengthMismatch {
                name,
                len: values.len(),
                expected: self.dates.len(),
            });
        }
        self.names.push(name);
        self.columns.push(values);
        Ok(())
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.dates.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Column by name.
    pub fn column(&self, name: &str) -> Result<&Series, FrameError> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
            .ok_or_else(|| FrameError::UnknownColumn(name.to_string()))
    }

    /// Column by position.
    pub fn column_at(&self, index: usize) -> &Series {
        &self.columns[index]
    }

    /// Iterate `(name, column)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.columns.iter())
    }

    /// Shift every column forward by `periods`: the value at row `t` comes
    /// from row `t - periods`. The first `periods` rows become undefined.
    pub fn shift(&self, periods: usize) -> Frame {
        self.map_columns(|col| shift_series(col, periods))
    }

    /// Forward-fill every column.
    pub fn ffill(&self) -> Frame {
        self.map_columns(ffill_series)
    }

    /// Left-join onto a target date axis: for each target date take the
    /// matching row, or an undefined row when this frame has no such date.
    /// Dates of this frame absent from the target axis are dropped.
    pub fn reindex(&self, target: &[NaiveDate]) -> Frame {
        // Both axes are sorted ascending, so walk them in lockstep.
        let mut row_for_target: Vec<Option<usize>> = Vec::with_capacity(target.len());
        let mut i = 0;
        for &date in target {
            while i < self.dates.len() && self.dates[i] < date {
                i += 1;
            }
            if i < self.dates.len() && self.dates[i] == date {
                row_for_target.push(Some(i));
            } else {
                row_for_target.push(None);
            }
        }

        let columns = self
            .columns
            .iter()
            .map(|col| {
                row_for_target
                    .iter()
                    .map(|row| row.and_then(|r| col[r]))
                    .collect()
            })
            .collect();

        Frame {
            dates: target.to_vec(),
            names: self.names.clone(),
            columns,
        }
    }

    /// Simple returns per column: `r(t) = p(t) / p(t-1) - 1`. Row 0 and any
    /// row with an undefined operand are undefined.
    pub fn simple_returns(&self) -> Frame {
        self.map_columns(|col| {
            let mut out: Series = vec![None; col.len()];
            for t in 1..col.len() {
                out[t] = match (col[t - 1], col[t]) {
                    (Some(prev), Some(cur)) if prev != 0.0 => Some(cur / prev - 1.0),
                    _ => None,
                };
            }
            out
        })
    }

    /// Multiply every column elementwise by a per-date scalar series.
    pub fn scale_rows(&self, scale: &Series) -> Frame {
        self.map_columns(|col| {
            col.iter()
                .zip(scale.iter())
                .map(|(v, s)| mul(*v, *s))
                .collect()
        })
    }

    /// Elementwise product with another frame, column by position. Both
    /// frames must share the date axis and column count.
    pub fn mul_elementwise(&self, other: &Frame) -> Frame {
        debug_assert_eq!(self.dates, other.dates);
        debug_assert_eq!(self.columns.len(), other.columns.len());
        let columns = self
            .columns
            .iter()
            .zip(other.columns.iter())
            .map(|(a, b)| a.iter().zip(b.iter()).map(|(x, y)| mul(*x, *y)).collect())
            .collect();
        Frame {
            dates: self.dates.clone(),
            names: self.names.clone(),
            columns,
        }
    }

    /// Restrict to rows within `[from, to]` (both optional bounds). Used for
    /// display-only trimming of outputs, never for computation.
    pub fn restrict(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Frame {
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| from.map_or(true, |f| **d >= f) && to.map_or(true, |t| **d <= t))
            .map(|(i, _)| i)
            .collect();
        Frame {
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            names: self.names.clone(),
            columns: self
                .columns
                .iter()
                .map(|col| keep.iter().map(|&i| col[i]).collect())
                .collect(),
        }
    }

    fn map_columns<F: Fn(&Series) -> Series>(&self, f: F) -> Frame {
        Frame {
            dates: self.dates.clone(),
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| f(c)).collect(),
        }
    }
}

fn check_ascending(dates: &[NaiveDate]) -> Result<(), FrameError> {
    for i in 1..dates.len() {
        if dates[i] <= dates[i - 1] {
            return Err(FrameError::UnsortedDates(i));
        }
    }
    Ok(())
}

// ─── Cell arithmetic ────────────────────────────────────────────────

/// Undefined-propagating product.
pub fn mul(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x * y),
        _ => None,
    }
}

/// Undefined-propagating sum of two cells.
pub fn add(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x + y),
        _ => None,
    }
}

// ─── Series operations ──────────────────────────────────────────────

/// Shift a series forward by `periods`, leaving the head undefined.
pub fn shift_series(values: &Series, periods: usize) -> Series {
    let n = values.len();
    let mut out: Series = vec![None; n];
    for t in periods..n {
        out[t] = values[t - periods];
    }
    out
}

/// Carry the last defined value forward across undefined gaps.
pub fn ffill_series(values: &Series) -> Series {
    let mut out: Series = Vec::with_capacity(values.len());
    let mut last: Option<f64> = None;
    for v in values {
        if v.is_some() {
            last = *v;
        }
        out.push(last);
    }
    out
}

/// Rolling sample standard deviation (n−1 divisor) over `window` periods.
///
/// A window containing any undefined cell yields an undefined statistic.
/// The first `window - 1` positions are undefined by construction.
pub fn rolling_std(values: &Series, window: usize) -> Series {
    let n = values.len();
    let mut out: Series = vec![None; n];
    if window < 2 || n < window {
        return out;
    }
    for t in (window - 1)..n {
        let slice = &values[t + 1 - window..=t];
        if slice.iter().any(|v| v.is_none()) {
            continue;
        }
        let mean: f64 = slice.iter().map(|v| v.unwrap_or(0.0)).sum::<f64>() / window as f64;
        let ss: f64 = slice
            .iter()
            .map(|v| {
                let d = v.unwrap_or(0.0) - mean;
                d * d
            })
            .sum();
        out[t] = Some((ss / (window as f64 - 1.0)).sqrt());
    }
    out
}

/// Resample a series to a coarser calendar and join it back onto the
/// original axis: each bucket's aggregate lands on the bucket's last
/// in-index date, and the result is forward-filled so the value only
/// changes on rebalance dates.
pub fn resample_ffill(
    dates: &[NaiveDate],
    values: &Series,
    freq: Frequency,
    agg: Resample,
) -> Series {
    debug_assert_eq!(dates.len(), values.len());
    let n = dates.len();
    let mut sparse: Series = vec![None; n];

    let mut start = 0;
    while start < n {
        let key = freq.bucket(dates[start]);
        let mut end = start + 1;
        while end < n && freq.bucket(dates[end]) == key {
            end += 1;
        }
        let bucket = &values[start..end];
        let aggregated = match agg {
            Resample::Last => bucket.iter().rev().find_map(|v| *v),
            Resample::Mean => {
                let defined: Vec<f64> = bucket.iter().filter_map(|v| *v).collect();
                if defined.is_empty() {
                    None
                } else {
                    Some(defined.iter().sum::<f64>() / defined.len() as f64)
                }
            }
        };
        sparse[end - 1] = aggregated;
        start = end;
    }

    ffill_series(&sparse)
}
