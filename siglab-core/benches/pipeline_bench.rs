//! Criterion benchmarks for the pipeline hot paths.
//!
//! Benchmarks:
//! 1. Full pipeline run (align → optimize → clip → index)
//! 2. Rolling-vol leverage calculation
//! 3. Cross-sectional combination (mean policy)

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use siglab_core::config::{PipelineConfig, VolTarget};
use siglab_core::frame::{Frame, Series};
use siglab_core::pipeline::{run, MarketInputs};
use siglab_core::risk::{leverage, LeverageInput};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_dates(n: usize) -> Vec<chrono::NaiveDate> {
    let base = chrono::NaiveDate::from_ymd_opt(2015, 1, 2).unwrap();
    (0..n)
        .map(|i| base + chrono::Duration::days(i as i64))
        .collect()
}

fn make_inputs(n_dates: usize, n_assets: usize) -> MarketInputs {
    let dates = make_dates(n_dates);
    let mut price_cols = Vec::with_capacity(n_assets);
    let mut signal_cols = Vec::with_capacity(n_assets);
    for a in 0..n_assets {
        let prices: Series = (0..n_dates)
            .map(|i| Some(100.0 + ((i + a * 17) as f64 * 0.1).sin() * 10.0))
            .collect();
        let signal: Series = (0..n_dates)
            .map(|i| Some(if (i / 20 + a) % 2 == 0 { 1.0 } else { -1.0 }))
            .collect();
        price_cols.push((format!("asset_{a}"), prices));
        signal_cols.push((format!("asset_{a}"), signal));
    }
    MarketInputs {
        prices: Frame::from_columns(dates.clone(), price_cols).unwrap(),
        signal: Frame::from_columns(dates, signal_cols).unwrap(),
        contract_values: None,
        pnl_labels: vec![],
    }
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");
    for n_assets in [2, 10, 50] {
        let inputs = make_inputs(2520, n_assets);
        let config = PipelineConfig::builder(5.0, 1.0)
            .signal_delay(1)
            .signal_vol_target(VolTarget::new(0.10, 60))
            .portfolio_vol_target(VolTarget::new(0.10, 60))
            .build();
        group.bench_with_input(
            BenchmarkId::from_parameter(n_assets),
            &n_assets,
            |b, _| b.iter(|| run(black_box(&inputs), black_box(&config)).unwrap()),
        );
    }
    group.finish();
}

fn bench_leverage(c: &mut Criterion) {
    let n = 2520;
    let dates = make_dates(n);
    let returns: Series = (0..n)
        .map(|i| Some((i as f64 * 0.7).sin() * 0.01))
        .collect();
    let vt = VolTarget::new(0.10, 60);
    c.bench_function("leverage_10y_daily", |b| {
        b.iter(|| {
            leverage(
                black_box(&dates),
                black_box(&returns),
                LeverageInput::Returns,
                &vt,
            )
        })
    });
}

fn bench_combination(c: &mut Criterion) {
    let inputs = make_inputs(2520, 20);
    let config = PipelineConfig::builder(0.0, 0.0).build();
    c.bench_function("mean_combination_20_assets", |b| {
        b.iter(|| run(black_box(&inputs), black_box(&config)).unwrap())
    });
}

criterion_group!(benches, bench_full_pipeline, bench_leverage, bench_combination);
criterion_main!(benches);
