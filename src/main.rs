// Entry point and high-level CLI flow.
//
// A run loads both source tables, reconciles them, writes the reconciled
// table plus state averages and a JSON summary, and prints short previews of
// the calibration ratios and anything that needs manual review.
use anyhow::{Context, Result};
use clap::Parser;
use rainfall_reconcile::output;
use rainfall_reconcile::reports;
use rainfall_reconcile::util;
use rainfall_reconcile::{ImputationStrategy, PipelineConfig, RunOutput};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "rainfall-reconcile",
    about = "Reconcile daily and yearly rainfall sources into one per-state, per-year table"
)]
struct Cli {
    /// Daily observation CSV (State, Year, Rainfall (mm), optional Date).
    #[arg(long)]
    daily: PathBuf,

    /// Yearly observation CSV (State, Year, Total Rainfall in millimetres, optional station).
    #[arg(long)]
    yearly: PathBuf,

    /// Reconciled table output.
    #[arg(long, default_value = "rainfall_reconciled.csv")]
    output: PathBuf,

    /// Per-state averages output.
    #[arg(long)]
    averages: Option<PathBuf>,

    /// JSON run summary output.
    #[arg(long)]
    summary: Option<PathBuf>,

    /// TOML file overriding the built-in configuration.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Strategy for estimating missing yearly totals.
    #[arg(long, value_enum)]
    strategy: Option<ImputationStrategy>,

    /// Rows shown in each console preview.
    #[arg(long, default_value_t = 10)]
    preview: usize,

    /// Enable debug logging.
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(strategy) = cli.strategy {
        config.imputation.strategy = strategy;
    }
    Ok(config)
}

/// Print load counts and the calibration used for this run.
fn print_run_overview(run: &RunOutput, preview: usize) {
    println!(
        "Processing dataset... ({} daily rows, {} yearly rows loaded)",
        util::format_int(run.daily_report.total_rows),
        util::format_int(run.yearly_report.total_rows)
    );
    let skipped = run.daily_report.skipped_rows + run.yearly_report.skipped_rows;
    let missing = run.daily_report.missing_values + run.yearly_report.missing_values;
    println!(
        "Note: {} rows skipped, {} numeric cells treated as missing.\n",
        util::format_int(skipped),
        util::format_int(missing)
    );

    let calibration = &run.result.calibration;
    if calibration.is_empty() {
        println!("Warning: no plausible yearly/daily ratio found; yearly totals were not estimated from daily totals.\n");
    } else {
        output::preview_table(
            "Median scale factor (Yearly / Daily) per Year",
            Some(&format!(
                "{} ratios used, {} rejected as implausible",
                util::format_int(calibration.accepted_count()),
                util::format_int(calibration.rejected_count())
            )),
            &reports::calibration_rows(calibration),
            preview.max(calibration.median_ratio_by_year().len()),
        );
    }
}

/// Print anything a reviewer should look at by hand.
fn print_review_items(run: &RunOutput, threshold_mm: f64, preview: usize) {
    let diagnostics = &run.result.diagnostics;
    if !diagnostics.unrecoverable.is_empty() {
        println!("Rows without a recoverable yearly total:");
        for gap in diagnostics.unrecoverable.iter().take(preview) {
            println!("  {} {}: {}", gap.state, gap.year, gap.reason);
        }
        println!();
    }
    if !diagnostics.extreme_rows.is_empty() {
        output::preview_table(
            "Extremely large yearly totals remain (review)",
            Some(&format!("> {} mm", util::format_number(threshold_mm, 0))),
            &diagnostics.extreme_rows,
            preview,
        );
    }
}

fn write_outputs(cli: &Cli, run: &RunOutput, config: &PipelineConfig) -> Result<()> {
    let rows = run.result.table.to_rows();
    write_with_context(&cli.output, || output::write_csv(&cli.output, &rows))?;
    output::preview_table(
        "Reconciled rainfall",
        Some(&format!("{} rows", util::format_int(rows.len()))),
        &rows,
        cli.preview,
    );
    println!("(Full table exported to {})\n", cli.output.display());

    if let Some(path) = &cli.averages {
        let averages = reports::generate_state_averages(&run.result.table);
        write_with_context(path, || output::write_csv(path, &averages))?;
        output::preview_table("State averages", None, &averages, cli.preview);
        println!("(Full table exported to {})\n", path.display());
    }

    if let Some(path) = &cli.summary {
        let summary = reports::generate_summary(&run.result, config);
        write_with_context(path, || output::write_json(path, &summary))?;
        println!("Summary saved to {}\n", path.display());
    }
    Ok(())
}

fn write_with_context<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce() -> rainfall_reconcile::Result<()>,
{
    write().with_context(|| format!("Failed to write {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli)?;
    info!(strategy = %config.imputation.strategy, "Configuration loaded");

    // Both inputs are read before anything is written.
    let run = rainfall_reconcile::run(&cli.daily, &cli.yearly, &config)
        .context("Failed to load input tables")?;

    print_run_overview(&run, cli.preview);
    print_review_items(&run, config.diagnostics.extreme_yearly_mm, cli.preview);
    write_outputs(&cli, &run, &config)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_flag_accepts_config_names() {
        let cli = Cli::try_parse_from([
            "rainfall-reconcile",
            "--daily",
            "daily.csv",
            "--yearly",
            "yearly.csv",
            "--strategy",
            "linear-interpolation",
        ])
        .unwrap();
        assert_eq!(cli.strategy, Some(ImputationStrategy::LinearInterpolation));
        let config = load_config(&cli).unwrap();
        assert_eq!(
            config.imputation.strategy,
            ImputationStrategy::LinearInterpolation
        );
    }

    #[test]
    fn test_strategy_flag_rejects_short_names() {
        let parsed = Cli::try_parse_from([
            "rainfall-reconcile",
            "--daily",
            "daily.csv",
            "--yearly",
            "yearly.csv",
            "--strategy",
            "interpolate",
        ]);
        assert!(parsed.is_err());
    }
}
