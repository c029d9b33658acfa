//! JSON and CSV artifact generation.
//!
//! - **JSON**: full `RunReport` with schema versioning
//! - **CSV**: per-bar records, long-format weights, stress rows
//!
//! Persisted reports carry a `schema_version`; newer versions are rejected
//! on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use almlab_core::domain::WeightSchedule;
use almlab_core::engine::{BacktestRecord, SCHEMA_VERSION};

use crate::runner::RunReport;
use crate::stress::StressRow;

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a `RunReport`, rejecting schema versions newer than this build.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: timestamp, equity, turnover, cost, gross_exposure
pub fn export_records_csv(records: &[BacktestRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity", "turnover", "cost", "gross_exposure"])?;
    for r in records {
        wtr.write_record([
            &r.timestamp.to_rfc3339(),
            &format!("{:.6}", r.equity),
            &format!("{:.8}", r.turnover),
            &format!("{:.6}", r.cost),
            &format!("{:.8}", r.gross_exposure),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Long format, one row per non-zero weight: timestamp, symbol, weight.
pub fn export_weights_csv(weights: &WeightSchedule) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "symbol", "weight"])?;
    for (ts, vector) in &weights.entries {
        let ts = ts.to_rfc3339();
        for (symbol, w) in vector.iter() {
            wtr.write_record([ts.as_str(), symbol.as_str(), &format!("{:.8}", w)])?;
        }
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_stress_csv(rows: &[StressRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    for row in rows {
        wtr.serialize(row)?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set of one run.
///
/// Creates `{run_id[..12]}/` under `output_dir` containing:
/// - `report.json`: the full `RunReport`
/// - `records.csv`: bar-by-bar equity, turnover and cost
/// - `weights.csv`: the executed weight schedule
///
/// Identical runs write to the same directory. Returns its path.
pub fn save_artifacts(report: &RunReport, weights: &WeightSchedule, output_dir: &Path) -> Result<PathBuf> {
    let short = report.run_id.get(..12).unwrap_or(&report.run_id);
    let run_dir = output_dir.join(short);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(run_dir.join("records.csv"), export_records_csv(&report.result.records)?)?;
    std::fs::write(run_dir.join("weights.csv"), export_weights_csv(weights)?)?;

    tracing::info!(dir = %run_dir.display(), "artifacts saved");
    Ok(run_dir)
}

/// Load a `RunReport` from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<RunReport> {
    let path = dir.join("report.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

/// Plain-text summary for terminal output.
pub fn format_summary(report: &RunReport) -> String {
    let s = &report.result.stats;
    let mut out = String::with_capacity(1024);
    let short = report.run_id.get(..12).unwrap_or(&report.run_id);
    out.push_str(&format!("run        {} ({short})\n", report.name));
    if report.has_synthetic {
        out.push_str("data       SYNTHETIC\n");
    }
    out.push_str(&format!("timeframe  {}", report.timeframe));
    if let Some(coarse) = report.coarse_timeframe {
        out.push_str(&format!(" (trend {coarse})"));
    }
    out.push('\n');
    if !report.result.is_complete() {
        out.push_str(&format!("status     {:?}\n", report.result.status));
    }
    out.push_str(&format!("bars       {}\n", s.bar_count));
    out.push_str(&format!("return     {:.2}% total, {:.2}% annual\n", s.total_return * 100.0, s.annual_return * 100.0));
    out.push_str(&format!("sharpe     {:.3}\n", s.sharpe));
    out.push_str(&format!("sortino    {:.3}\n", s.sortino));
    out.push_str(&format!("max dd     {:.2}%\n", s.max_drawdown * 100.0));
    out.push_str(&format!("calmar     {:.3}\n", s.calmar));
    out.push_str(&format!("var 95     {:.4}%\n", s.var_95 * 100.0));
    out.push_str(&format!("turnover   {:.1}x annual, {} rebalances\n", s.annual_turnover, s.rebalance_count));
    out.push_str(&format!("costs      {:.2}\n", s.total_cost));
    out.push_str(&format!("transitions {}\n", report.transitions));
    for w in &report.warnings {
        out.push_str(&format!("warning    {w}\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::data_loader::synthetic_panel;
    use crate::runner::run_backtest;
    use almlab_core::domain::Timeframe;
    use chrono::{TimeZone, Utc};

    fn run() -> crate::runner::RunOutput {
        let symbols = vec!["BTC-USDT-SWAP".to_string(), "ETH-USDT-SWAP".to_string()];
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let data = synthetic_panel(&symbols, Timeframe::H1, 200, start, 3).unwrap();
        run_backtest(&RunConfig::default(), &data, None).unwrap()
    }

    #[test]
    fn json_roundtrip() {
        let out = run();
        let json = export_json(&out.report).unwrap();
        let back = import_json(&json).unwrap();
        assert_eq!(back.run_id, out.report.run_id);
        assert_eq!(back.result, out.report.result);
    }

    #[test]
    fn newer_schema_rejected() {
        let out = run();
        let mut value: serde_json::Value = serde_json::from_str(&export_json(&out.report).unwrap()).unwrap();
        value["schema_version"] = serde_json::json!(SCHEMA_VERSION + 1);
        let err = import_json(&value.to_string()).unwrap_err();
        assert!(err.to_string().contains("unsupported schema version"));
    }

    #[test]
    fn missing_schema_version_defaults() {
        let out = run();
        let mut value: serde_json::Value = serde_json::from_str(&export_json(&out.report).unwrap()).unwrap();
        value.as_object_mut().unwrap().remove("schema_version");
        let back = import_json(&value.to_string()).unwrap();
        assert_eq!(back.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn records_csv_has_row_per_bar() {
        let out = run();
        let csv = export_records_csv(&out.report.result.records).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "timestamp,equity,turnover,cost,gross_exposure");
        assert_eq!(lines.len(), 201);
    }

    #[test]
    fn weights_csv_is_long_format() {
        let out = run();
        let csv = export_weights_csv(&out.weights).unwrap();
        let expected: usize = out.weights.entries.iter().map(|(_, v)| v.len()).sum();
        assert_eq!(csv.lines().count(), expected + 1);
        assert!(csv.starts_with("timestamp,symbol,weight"));
    }

    #[test]
    fn stress_csv_header_from_fields() {
        let row = StressRow {
            cost_rate: 0.001,
            total_return: 0.1,
            annual_return: 0.2,
            sharpe: 1.0,
            sortino: 1.5,
            max_drawdown: -0.05,
            calmar: 4.0,
            annual_turnover: 12.0,
            total_cost: 30.0,
            var_95: -0.01,
            halted: false,
        };
        let csv = export_stress_csv(&[row]).unwrap();
        assert!(csv.starts_with("cost_rate,total_return,annual_return,sharpe"));
        assert_eq!(csv.lines().count(), 2);
    }

    #[test]
    fn artifacts_saved_and_loaded() {
        let out = run();
        let dir = tempfile::tempdir().unwrap();
        let run_dir = save_artifacts(&out.report, &out.weights, dir.path()).unwrap();
        assert!(run_dir.join("records.csv").exists());
        assert!(run_dir.join("weights.csv").exists());
        let loaded = load_artifacts(&run_dir).unwrap();
        assert_eq!(loaded.records_digest, out.report.records_digest);
    }

    #[test]
    fn summary_mentions_synthetic() {
        let out = run();
        let text = format_summary(&out.report);
        assert!(text.contains("SYNTHETIC"));
        assert!(text.contains("sharpe"));
    }
}
