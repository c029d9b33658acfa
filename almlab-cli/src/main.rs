//! ALM Lab CLI: run, stress, compare and synthetic data commands.
//!
//! Commands:
//! - `run`: one backtest from a TOML config, saving JSON/CSV artifacts
//! - `stress`: replay the same schedule under a range of cost rates
//! - `compare`: configured filter and buffer vs. an unfiltered baseline
//! - `synthetic`: write a deterministic synthetic panel as CSV

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};

use almlab_core::domain::{MarketPanel, Timeframe};
use almlab_runner::export::{export_stress_csv, format_summary};
use almlab_runner::{
    compare_filtering, init_tracing, load_panel_csv, run_backtest, run_cost_stress,
    save_artifacts, synthetic_panel, write_panel_csv, LoadedPanel, RunConfig, OKX_PERPETUALS,
};

#[derive(Parser)]
#[command(
    name = "almlab",
    about = "ALM Lab CLI: multi-timeframe crypto perpetual backtesting"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one backtest and save its artifacts.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Output directory for artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,
    },
    /// Replay one weight schedule under several cost rates.
    Stress {
        #[command(flatten)]
        data: DataArgs,

        /// Cost rates to test. Defaults to stress.cost_scenarios from the config.
        #[arg(long, value_delimiter = ',')]
        costs: Vec<f64>,

        /// Write the rows as CSV to this path instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compare the configured filter against acting on every raw signal.
    Compare {
        #[command(flatten)]
        data: DataArgs,
    },
    /// Write a deterministic synthetic panel as CSV.
    Synthetic {
        /// Symbols to generate. Defaults to the OKX perpetual universe.
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,

        #[arg(long, default_value = "H1")]
        timeframe: Timeframe,

        #[arg(long, default_value_t = 8760)]
        bars: usize,

        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// First bar timestamp (RFC 3339).
        #[arg(long, default_value = "2024-01-01T00:00:00Z")]
        start: DateTime<Utc>,

        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args)]
struct DataArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fine-timeframe panel CSV (timestamp,symbol,open,high,low,close,volume[,funding_rate]).
    #[arg(long)]
    data: Option<PathBuf>,

    /// Coarse-timeframe panel CSV for the trend component.
    #[arg(long)]
    coarse_data: Option<PathBuf>,

    /// Use synthetic data when no --data is given.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Bars of synthetic data.
    #[arg(long, default_value_t = 8760)]
    bars: usize,
}

/// Config plus fine and optional coarse panels.
struct Inputs {
    config: RunConfig,
    fine: LoadedPanel,
    coarse: Option<MarketPanel>,
}

impl DataArgs {
    fn load(&self) -> Result<Inputs> {
        let config = match &self.config {
            Some(path) => RunConfig::load(path)?,
            None => RunConfig::default(),
        };

        let fine = match (&self.data, self.synthetic) {
            (Some(path), _) => load_panel_csv(path, config.run.timeframe)
                .with_context(|| format!("failed to load {}", path.display()))?,
            (None, true) => {
                let symbols: Vec<String> = OKX_PERPETUALS.iter().map(|s| s.to_string()).collect();
                let start = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")?.with_timezone(&Utc);
                synthetic_panel(&symbols, config.run.timeframe, self.bars, start, config.run.seed)?
            }
            (None, false) => bail!("one of --data or --synthetic is required"),
        };

        let coarse = match &self.coarse_data {
            Some(path) => {
                let Some(tf) = config.run.coarse_timeframe else {
                    bail!("--coarse-data requires run.coarse_timeframe in the config");
                };
                let loaded = load_panel_csv(path, tf)
                    .with_context(|| format!("failed to load {}", path.display()))?;
                Some(loaded.panel)
            }
            None => None,
        };

        Ok(Inputs {
            config,
            fine,
            coarse,
        })
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { data, output_dir } => run_cmd(&data, output_dir),
        Commands::Stress { data, costs, out } => stress_cmd(&data, costs, out),
        Commands::Compare { data } => compare_cmd(&data),
        Commands::Synthetic {
            symbols,
            timeframe,
            bars,
            seed,
            start,
            out,
        } => synthetic_cmd(symbols, timeframe, bars, seed, start, out),
    }
}

fn run_cmd(data: &DataArgs, output_dir: PathBuf) -> Result<()> {
    let inputs = data.load()?;
    let output = match run_backtest(&inputs.config, &inputs.fine, inputs.coarse.as_ref()) {
        Ok(output) => output,
        Err(e) => {
            if let Some(partial) = e.partial() {
                eprintln!(
                    "Run halted after {} bars (final equity {:.2})",
                    partial.records.len(),
                    partial.final_equity()
                );
            }
            return Err(e.into());
        }
    };

    print!("{}", format_summary(&output.report));

    let run_dir = save_artifacts(&output.report, &output.weights, &output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn stress_cmd(data: &DataArgs, costs: Vec<f64>, out: Option<PathBuf>) -> Result<()> {
    let inputs = data.load()?;
    let scenarios = if costs.is_empty() {
        inputs.config.stress.cost_scenarios.clone()
    } else {
        costs
    };
    let rows = run_cost_stress(&inputs.config, &inputs.fine, inputs.coarse.as_ref(), &scenarios)?;

    match out {
        Some(path) => {
            std::fs::write(&path, export_stress_csv(&rows)?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Stress results saved to: {}", path.display());
        }
        None => {
            println!(
                "{:>8} {:>10} {:>10} {:>8} {:>9} {:>10} {:>12}",
                "cost", "return", "annual", "sharpe", "max dd", "turnover", "costs"
            );
            println!("{}", "-".repeat(73));
            for r in &rows {
                println!(
                    "{:>7.2}% {:>9.2}% {:>9.2}% {:>8.3} {:>8.2}% {:>9.1}x {:>12.2}{}",
                    r.cost_rate * 100.0,
                    r.total_return * 100.0,
                    r.annual_return * 100.0,
                    r.sharpe,
                    r.max_drawdown * 100.0,
                    r.annual_turnover,
                    r.total_cost,
                    if r.halted { "  HALTED" } else { "" }
                );
            }
        }
    }
    Ok(())
}

fn compare_cmd(data: &DataArgs) -> Result<()> {
    let inputs = data.load()?;
    let cmp = compare_filtering(&inputs.config, &inputs.fine, inputs.coarse.as_ref())?;

    println!("{:<18} {:>12} {:>12}", "", "baseline", "filtered");
    println!("{}", "-".repeat(44));
    let rows = [
        ("total return %", cmp.baseline.total_return * 100.0, cmp.filtered.total_return * 100.0),
        ("sharpe", cmp.baseline.sharpe, cmp.filtered.sharpe),
        ("max drawdown %", cmp.baseline.max_drawdown * 100.0, cmp.filtered.max_drawdown * 100.0),
        ("annual turnover", cmp.baseline.annual_turnover, cmp.filtered.annual_turnover),
        ("total cost", cmp.baseline.total_cost, cmp.filtered.total_cost),
    ];
    for (label, base, filtered) in rows {
        println!("{label:<18} {base:>12.3} {filtered:>12.3}");
    }
    println!(
        "{:<18} {:>12} {:>12}",
        "rebalances", cmp.baseline.rebalance_count, cmp.filtered.rebalance_count
    );
    println!();
    println!("Turnover reduction: {:.1}%", cmp.turnover_reduction() * 100.0);
    println!("Cost saved: {:.2}", cmp.cost_saved());
    Ok(())
}

fn synthetic_cmd(
    symbols: Vec<String>,
    timeframe: Timeframe,
    bars: usize,
    seed: u64,
    start: DateTime<Utc>,
    out: PathBuf,
) -> Result<()> {
    let symbols = if symbols.is_empty() {
        OKX_PERPETUALS.iter().map(|s| s.to_string()).collect()
    } else {
        symbols
    };
    let loaded = synthetic_panel(&symbols, timeframe, bars, start, seed)?;
    let file = File::create(&out).with_context(|| format!("failed to create {}", out.display()))?;
    write_panel_csv(&loaded.panel, file)?;
    println!(
        "Wrote {} bars x {} symbols to {} (dataset {})",
        bars,
        symbols.len(),
        out.display(),
        loaded.dataset_hash
    );
    Ok(())
}
