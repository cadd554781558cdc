//! Exposure calculator — long/short/net/total exposure from final signals.
//!
//! Shorts keep their negative sign through all downstream arithmetic:
//! `net = longs + shorts`, `total = longs − shorts = Σ|position|`.

use crate::frame::{Frame, Series};

/// Per-date exposure summary of a signal matrix.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ExposureSummary {
    /// Σ max(signal, 0) per date. Always ≥ 0 where defined.
    pub total_longs: Series,
    /// Σ min(signal, 0) per date. Always ≤ 0 where defined.
    pub total_shorts: Series,
    /// `total_longs + total_shorts`.
    pub net_exposure: Series,
    /// `total_longs − total_shorts`, equal to Σ|signal|.
    pub total_exposure: Series,
}

/// Summarize exposures across the columns of a signal matrix. A date where
/// every asset is undefined yields undefined sums; defined assets on a
/// partially-defined date are summed as usual.
pub fn summarize(signal: &Frame) -> ExposureSummary {
    let n = signal.n_rows();
    let mut total_longs: Series = vec![None; n];
    let mut total_shorts: Series = vec![None; n];

    for t in 0..n {
        let mut longs = 0.0;
        let mut shorts = 0.0;
        let mut any = false;
        for c in 0..signal.n_cols() {
            if let Some(s) = signal.column_at(c)[t] {
                any = true;
                longs += s.max(0.0);
                shorts += s.min(0.0);
            }
        }
        if any {
            total_longs[t] = Some(longs);
            total_shorts[t] = Some(shorts);
        }
    }

    let net_exposure: Series = total_longs
        .iter()
        .zip(total_shorts.iter())
        .map(|(l, s)| crate::frame::add(*l, *s))
        .collect();
    let total_exposure: Series = total_longs
        .iter()
        .zip(total_shorts.iter())
        .map(|(l, s)| match (l, s) {
            (Some(l), Some(s)) => Some(l - s),
            _ => None,
        })
        .collect();

    ExposureSummary {
        total_longs,
        total_shorts,
        net_exposure,
        total_exposure,
    }
}

/// Scale the final signal into notional position sizes.
pub fn notional_positions(signal: &Frame, notional: f64) -> Frame {
    signal.scale_rows(&vec![Some(notional); signal.n_rows()])
}

/// Divide notional positions by the aligned contract-value-per-unit series
/// to get contract counts. Unit consistency is the caller's concern.
pub fn contract_positions(notional: &Frame, contract_values: &Frame) -> Frame {
    let columns = notional
        .iter()
        .zip(contract_values.iter())
        .map(|((name, pos), (_, cv))| {
            let counts: Series = pos
                .iter()
                .zip(cv.iter())
                .map(|(p, v)| match (p, v) {
                    (Some(p), Some(v)) if *v != 0.0 => Some(p / v),
                    _ => None,
                })
                .collect();
            (name.to_string(), counts)
        })
        .collect();
    Frame::from_columns(notional.dates().to_vec(), columns).expect("axes already validated")
}
