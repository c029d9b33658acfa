//! Criterion benchmarks for pipeline hot paths.
//!
//! Benchmarks:
//! 1. Indicator precompute (EMA stack, Donchian, ATR)
//! 2. Signal combination across a multi-asset panel
//! 3. Stateful filter over a dense signal matrix
//! 4. Weighting (inverse vol + caps + buffer)
//! 5. Full pipeline including execution

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use almlab_core::domain::{Bar, MarketPanel, Timeframe};
use almlab_core::filter::{FilterConfig, StatefulSignalFilter};
use almlab_core::indicators::{Atr, Donchian, Ema, Indicator};
use almlab_core::pipeline::{run_pipeline, PipelineConfig};
use almlab_core::signal::{SignalCombiner, SignalConfig};
use almlab_core::weights::{PositionWeighter, WeightConfig};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(symbol: &str, n: usize, phase: f64) -> Vec<Bar> {
    let start = chrono::DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default();
    let mut prev = 100.0;
    (0..n)
        .map(|i| {
            let close = 100.0 + ((i as f64 * 0.05) + phase).sin() * 15.0 + i as f64 * 0.01;
            let open = prev;
            prev = close;
            Bar {
                symbol: symbol.to_string(),
                timestamp: start + chrono::Duration::hours(i as i64),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 10_000.0 + ((i * 37) % 9_000) as f64,
                funding_rate: (i % 8 == 0).then_some(((i as f64) * 0.3).sin() * 0.001),
            }
        })
        .collect()
}

fn make_panel(n: usize, symbols: usize) -> MarketPanel {
    let bars = (0..symbols)
        .flat_map(|s| make_bars(&format!("SYM{s:02}-USDT-SWAP"), n, s as f64))
        .collect();
    MarketPanel::from_bars(Timeframe::H1, bars).unwrap()
}

// ── 1. Indicators ────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let mut group = c.benchmark_group("indicators");
    for &bar_count in &[720, 8760] {
        let bars = make_bars("BENCH", bar_count, 0.0);
        let stack: Vec<Box<dyn Indicator>> = vec![
            Box::new(Ema::new(20)),
            Box::new(Ema::new(50)),
            Box::new(Ema::new(200)),
            Box::new(Donchian::upper(20)),
            Box::new(Donchian::lower(20)),
            Box::new(Atr::new(14)),
        ];
        group.bench_with_input(BenchmarkId::new("full_stack_6", bar_count), &bar_count, |b, _| {
            b.iter(|| {
                for ind in &stack {
                    black_box(ind.compute(black_box(&bars)));
                }
            });
        });
    }
    group.finish();
}

// ── 2-4. Stages ──────────────────────────────────────────────────────

fn bench_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("stages");
    let panel = make_panel(8760, 10);
    let combiner = SignalCombiner::new(SignalConfig::default());
    let combined = combiner.combine(&panel, None);
    let filter = StatefulSignalFilter::new(FilterConfig::default());
    let filtered = filter.apply(&combined.direction);
    let weighter = PositionWeighter::new(WeightConfig::default());

    group.bench_function("combine_10x8760", |b| {
        b.iter(|| combiner.combine(black_box(&panel), None));
    });
    group.bench_function("filter_10x8760", |b| {
        b.iter(|| filter.apply(black_box(&combined.direction)));
    });
    group.bench_function("weights_10x8760", |b| {
        b.iter(|| weighter.weights(black_box(&panel), black_box(&filtered.actionable)));
    });
    group.finish();
}

// ── 5. Full pipeline ─────────────────────────────────────────────────

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(20);
    let config = PipelineConfig::default();
    for &symbols in &[2, 10] {
        let panel = make_panel(8760, symbols);
        group.bench_with_input(BenchmarkId::new("one_year_hourly", symbols), &symbols, |b, _| {
            b.iter(|| run_pipeline(black_box(&panel), None, black_box(&config)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_indicators, bench_stages, bench_pipeline);
criterion_main!(benches);
