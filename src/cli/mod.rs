//! holdcv CLI Module
//!
//! Command-line interface for tuning rounds, holdout/cross-validation
//! comparisons and search space inspection.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::config::TuningConfig;
use crate::coordinator::TuningCoordinator;
use crate::data::DataSplit;
use crate::family::FamilyKind;
use crate::optimizer::{Parameter, ParameterType};
use crate::snapshot::TuningSnapshot;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) -> String {
    format!("{} {}", muted(key), val.white())
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "holdcv")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Hyperparameter tuning under holdout and k-fold cross-validation")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Tune all four families on a stored split
    Tune {
        /// Split file (JSON-serialised train/test arrays)
        #[arg(short, long)]
        data: PathBuf,

        /// Number of folds (1 = holdout with sequential search)
        #[arg(short, long, default_value = "1")]
        folds: usize,

        /// Tuning configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Base seed, overriding the configuration
        #[arg(long)]
        seed: Option<u64>,

        /// Output snapshot file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Tune with holdout and with k-fold cross-validation
    Compare {
        /// Split file (JSON-serialised train/test arrays)
        #[arg(short, long)]
        data: PathBuf,

        /// Number of folds for the cross-validated round
        #[arg(short, long, default_value = "5")]
        folds: usize,

        /// Tuning configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Base seed, overriding the configuration
        #[arg(long)]
        seed: Option<u64>,

        /// Output report file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the search space of every family
    Spaces {
        /// Tuning configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

// ─── Loading ───────────────────────────────────────────────────────────────────

fn load_config(path: Option<&Path>, seed: Option<u64>) -> anyhow::Result<TuningConfig> {
    let config = match path {
        Some(path) => TuningConfig::from_json_file(path)?,
        None => TuningConfig::default(),
    };
    Ok(match seed {
        Some(seed) => config.with_seed(seed),
        None => config,
    })
}

fn load_split(path: &Path) -> anyhow::Result<Arc<DataSplit>> {
    step_run("Loading split");
    let start = Instant::now();
    let split = DataSplit::from_json_file(path)?;
    step_done(&format!(
        "{} train + {} test rows × {} features in {:?}",
        split.n_train(),
        split.n_test(),
        split.n_features(),
        start.elapsed()
    ));
    Ok(Arc::new(split))
}

fn print_snapshot(snapshot: &TuningSnapshot) {
    println!();
    println!("  {:<16} {}", muted("Family"), muted("Configuration"));
    println!("  {}", dim(&"─".repeat(56)));
    for kind in FamilyKind::ALL {
        println!("  {:<16} {}", kind.key(), snapshot.get(kind).to_string().white());
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_tune(
    data_path: &Path,
    folds: usize,
    config_path: Option<&Path>,
    seed: Option<u64>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let strategy = if folds == 1 { "holdout" } else { "cross-validation" };
    section(&format!("Tune ({})", strategy));

    let coordinator = TuningCoordinator::new(load_config(config_path, seed)?)?;
    let split = load_split(data_path)?;

    step_run(&format!("Tuning with {} fold(s)", folds.to_string().cyan()));
    let start = Instant::now();
    let snapshot = coordinator.tune(split, folds)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_snapshot(&snapshot);

    if let Some(path) = output {
        snapshot.save_json(path)?;
        println!();
        println!("  {}", kv("Saved", &path.display().to_string()));
    }

    println!();
    Ok(())
}

pub fn cmd_compare(
    data_path: &Path,
    folds: usize,
    config_path: Option<&Path>,
    seed: Option<u64>,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    section("Compare");

    let coordinator = TuningCoordinator::new(load_config(config_path, seed)?)?;
    let split = load_split(data_path)?;

    step_run(&format!("Tuning holdout and {}-fold", folds.to_string().cyan()));
    let start = Instant::now();
    let report = coordinator.compare(split, folds)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!(
        "  {:<10} {:<32} {}",
        muted("Family"),
        muted("Holdout"),
        muted(&format!("{}-fold", report.n_folds))
    );
    println!("  {}", dim(&"─".repeat(72)));
    for kind in FamilyKind::ALL {
        let holdout = report.holdout.get(kind).to_string();
        let cross_validated = report.cross_validation.get(kind).to_string();
        let marker = if holdout == cross_validated { ok("=") } else { accent("≠") };
        println!("  {:<10} {:<32} {} {}", kind.key(), holdout, marker, cross_validated.white());
    }

    if let Some(path) = output {
        std::fs::write(path, serde_json::to_string_pretty(&report)?)?;
        println!();
        println!("  {}", kv("Saved", &path.display().to_string()));
    }

    println!();
    Ok(())
}

pub fn cmd_spaces(config_path: Option<&Path>) -> anyhow::Result<()> {
    section("Search spaces");

    let config = load_config(config_path, None)?;

    for family in config.ranges.families() {
        let space = family.search_space()?;
        let grid_size: usize = space.parameters().iter().map(grid_points).product();

        println!();
        println!(
            "  {} {}",
            family.kind().key().white().bold(),
            dim(&format!("({} grid candidates)", grid_size))
        );
        for param in space.parameters() {
            println!("    {:<16} {}", muted(&param.name), describe(param));
        }
    }

    println!();
    println!(
        "  {}",
        kv("Sequential budget", &config.search.max_evals.to_string())
    );
    println!();
    Ok(())
}

fn grid_points(param: &Parameter) -> usize {
    match &param.param_type {
        ParameterType::Float { grid_samples, .. } => *grid_samples,
        ParameterType::Int { low, high, step } => ((high - low) / step + 1).max(0) as usize,
        ParameterType::Categorical { choices } => choices.len(),
    }
}

fn describe(param: &Parameter) -> String {
    match &param.param_type {
        ParameterType::Float { low, high, log_scale, grid_samples } => format!(
            "[{}, {}]{} × {} draws",
            low,
            high,
            if *log_scale { " log" } else { "" },
            grid_samples
        ),
        ParameterType::Int { low, high, step } if *step == 1 => format!("{}..={}", low, high),
        ParameterType::Int { low, high, step } => format!("{}..={} step {}", low, high, step),
        ParameterType::Categorical { choices } => format!("{{{}}}", choices.join(", ")),
    }
}
