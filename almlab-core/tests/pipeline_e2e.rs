//! End-to-end pipeline scenario on a hand-computable two-asset panel.
//!
//! BTC rises 2% per bar with a close above every prior high; ETH chops in a
//! ±0.01 band around 100 and never builds a score above 0.45.
//!
//! With the default configuration:
//! - BTC scores 0.70 (trend + breakout + volatility gate) from bar 1
//! - the filter needs 4 identical signals, so BTC goes long at bar 4
//! - the lone active asset gets inverse-vol weight 1.0, capped to 0.20
//! - the bar-4 weight trades at the open of bar 5

use chrono::{Duration, TimeZone, Utc};

use almlab_core::domain::{Bar, MarketPanel, Timeframe};
use almlab_core::engine::{CostModel, ExecutorConfig};
use almlab_core::filter::{FilterConfig, PositionState};
use almlab_core::fingerprint::{dataset_hash, records_digest};
use almlab_core::pipeline::{run_pipeline, PipelineConfig};

const N: usize = 10;

fn assert_approx(actual: f64, expected: f64, eps: f64) {
    assert!(
        (actual - expected).abs() < eps,
        "expected {expected}, got {actual} (diff {})",
        (actual - expected).abs()
    );
}

fn scenario() -> MarketPanel {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let mut bars = Vec::with_capacity(2 * N);
    for i in 0..N {
        let timestamp = start + Duration::hours(i as i64);

        let close = 100.0 * 1.02_f64.powi(i as i32);
        let open = if i == 0 { 100.0 } else { 100.0 * 1.02_f64.powi(i as i32 - 1) };
        bars.push(Bar {
            symbol: "BTC-USDT-SWAP".into(),
            timestamp,
            open,
            high: close * 1.001,
            low: open.min(close) * 0.999,
            close,
            volume: 5_000.0,
            funding_rate: None,
        });

        let eth_close = if i % 2 == 0 { 100.01 } else { 99.99 };
        let eth_open = if i % 2 == 0 { 99.99 } else { 100.01 };
        bars.push(Bar {
            symbol: "ETH-USDT-SWAP".into(),
            timestamp,
            open: eth_open,
            high: 100.5,
            low: 99.5,
            close: eth_close,
            volume: 3_000.0,
            funding_rate: None,
        });
    }
    MarketPanel::from_bars(Timeframe::H1, bars).unwrap()
}

#[test]
fn scores_and_directions() {
    let out = run_pipeline(&scenario(), None, &PipelineConfig::default()).unwrap();

    let btc = out.combined.score.column("BTC-USDT-SWAP").unwrap();
    assert!(btc[0].is_nan(), "no prior Donchian band on bar 0");
    for s in &btc[1..] {
        assert_approx(*s, 0.70, 1e-12);
    }

    let eth = out.combined.score.column("ETH-USDT-SWAP").unwrap();
    assert!(eth[1..].iter().all(|s| s.abs() <= 0.45 + 1e-12));
    assert_eq!(out.combined.direction.count_nonzero("ETH-USDT-SWAP"), 0);
}

#[test]
fn filter_enters_after_persistence() {
    let out = run_pipeline(&scenario(), None, &PipelineConfig::default()).unwrap();

    let actionable = out.filtered.actionable.column("BTC-USDT-SWAP").unwrap();
    assert_eq!(&actionable[..4], &[0.0; 4]);
    assert!(actionable[4..].iter().all(|a| *a == 1.0));

    assert_eq!(out.filtered.transitions.len(), 1);
    let entry = &out.filtered.transitions[0];
    assert_eq!(entry.bar_index, 4);
    assert_eq!(entry.to, PositionState::Long);
    assert_eq!(out.filtered.actionable.count_nonzero("ETH-USDT-SWAP"), 0);
}

#[test]
fn weights_are_capped_and_lag_one_bar_into_execution() {
    let out = run_pipeline(&scenario(), None, &PipelineConfig::default()).unwrap();

    for t in 0..4 {
        assert!(out.weights.at(t).unwrap().is_empty());
    }
    for t in 4..N {
        let w = out.weights.at(t).unwrap();
        assert_approx(w.get("BTC-USDT-SWAP"), 0.20, 1e-12);
        assert_eq!(w.get("ETH-USDT-SWAP"), 0.0);
    }

    let records = &out.result.records;
    assert_eq!(records.len(), N);
    for r in &records[..5] {
        assert_eq!(r.turnover, 0.0);
        assert_eq!(r.equity, 100_000.0);
    }
    assert_approx(records[5].turnover, 0.20, 1e-12);
    assert!(records[6..].iter().all(|r| r.turnover == 0.0));
}

#[test]
fn equity_path_matches_hand_computation() {
    let out = run_pipeline(&scenario(), None, &PipelineConfig::default()).unwrap();
    let records = &out.result.records;

    // bar 5: buy 0.2 at the open, earn 2% on it, pay 0.2 × 0.001 × 100k
    let mut expected = 100_000.0 * (1.0 + 0.2 * 0.02) - 20.0;
    assert_approx(records[5].cost, 20.0, 1e-9);
    assert_approx(records[5].equity, expected, 1e-6);

    for r in &records[6..] {
        expected *= 1.0 + 0.2 * 0.02;
        assert_approx(r.equity, expected, 1e-6);
        assert_approx(r.gross_exposure, 0.2, 1e-12);
    }
    assert!(out.result.is_complete());
    assert_eq!(out.result.stats.rebalance_count, 1);
    assert_approx(out.result.stats.total_cost, 20.0, 1e-9);
}

#[test]
fn frictionless_passthrough_enters_immediately() {
    let config = PipelineConfig {
        filter: FilterConfig::passthrough(),
        executor: ExecutorConfig {
            cost: CostModel::frictionless(),
            ..ExecutorConfig::default()
        },
        ..PipelineConfig::default()
    };
    let out = run_pipeline(&scenario(), None, &config).unwrap();
    let actionable = out.filtered.actionable.column("BTC-USDT-SWAP").unwrap();
    assert_eq!(actionable[0], 0.0);
    assert!(actionable[1..].iter().all(|a| *a == 1.0));
    // first weight needs two valid returns: bar 2
    assert!(out.weights.at(1).unwrap().is_empty());
    assert_approx(out.result.records[3].turnover, 0.2, 1e-12);
    assert_eq!(out.result.stats.total_cost, 0.0);
}

#[test]
fn identical_inputs_give_identical_records() {
    let panel = scenario();
    let config = PipelineConfig::default();
    let a = run_pipeline(&panel, None, &config).unwrap();
    let b = run_pipeline(&scenario(), None, &config).unwrap();

    assert_eq!(dataset_hash(&panel), dataset_hash(&scenario()));
    assert_eq!(records_digest(&a.result.records), records_digest(&b.result.records));
    assert_eq!(
        serde_json::to_string(&a.result).unwrap(),
        serde_json::to_string(&b.result).unwrap()
    );
}
