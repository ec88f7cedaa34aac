//! CLI entry point for the student risk preprocessing pipeline.

use anyhow::{Result, anyhow};
use clap::Parser;
use dotenv::dotenv;
use risk_processing::{
    DEFAULT_SEED, Orchestrator, PipelineConfig, PipelineEvent, ResultsSummary, StepStatus,
};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(
    author = "Student Risk Analytics Team",
    version,
    about = "Preprocessing pipeline for student at-risk prediction",
    long_about = "Cleans raw student records, engineers risk features, and writes stratified, \
                  scaled and balanced train/validation/test splits with models, reports and plots.\n\n\
                  ENVIRONMENT VARIABLES:\n  \
                  RUST_LOG    Overrides --log-level (e.g. RUST_LOG=risk_processing=debug)\n\n\
                  EXAMPLES:\n  \
                  # Default paths (data/students.csv -> ./outputs)\n  \
                  risk-processing\n\n  \
                  # Custom input, output and seed\n  \
                  risk-processing -i records.csv -o results/ --seed 7\n\n  \
                  # Machine-readable summary\n  \
                  risk-processing -i records.csv --json | jq .validation"
)]
struct Args {
    /// Path to the raw student records CSV
    #[arg(short, long, default_value = "data/students.csv")]
    input: String,

    /// Output directory for the latest run's artifacts
    #[arg(short, long, default_value = "./outputs")]
    output: String,

    /// Seed for split shuffling and synthetic sample generation
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Fraction of each class assigned to train
    #[arg(long, default_value = "0.70")]
    train_ratio: f64,

    /// Fraction of each class assigned to validation
    #[arg(long, default_value = "0.15")]
    val_ratio: f64,

    /// Fraction of each class assigned to test
    #[arg(long, default_value = "0.15")]
    test_ratio: f64,

    /// Allowed drift of the positive-class share per split (absolute fraction)
    #[arg(long, default_value = "0.02")]
    tolerance: f64,

    /// Number of same-class neighbours used for oversampling
    #[arg(long, default_value = "5")]
    smote_k: usize,

    /// Target minority/majority ratio in train after balancing
    #[arg(long, default_value = "1.0")]
    balance_ratio: f64,

    /// Lower winsorization percentile (0.0 - 1.0)
    #[arg(long, default_value = "0.01")]
    lower_percentile: f64,

    /// Upper winsorization percentile (0.0 - 1.0)
    #[arg(long, default_value = "0.99")]
    upper_percentile: f64,

    /// Skip rendering diagnostic plots
    #[arg(long)]
    no_plots: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show warnings, errors and the final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output the results summary as JSON to stdout instead of a readable summary
    ///
    /// Disables all logs so stdout only contains the JSON document.
    #[arg(long)]
    json: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    // Load environment variables from .env file
    dotenv().ok();

    let config = PipelineConfig::builder()
        .input_path(&args.input)
        .output_dir(&args.output)
        .seed(args.seed)
        .split_ratios(args.train_ratio, args.val_ratio, args.test_ratio)
        .stratify_tolerance(args.tolerance)
        .smote_k(args.smote_k)
        .balance_ratio(args.balance_ratio)
        .percentiles(args.lower_percentile, args.upper_percentile)
        .generate_plots(!args.no_plots)
        .build()?;
    debug!("Configuration: {:?}", config);

    let orchestrator = Orchestrator::builder()
        .config(config)
        .on_event(|event| {
            if let PipelineEvent::Progress {
                step,
                label,
                status: StepStatus::Complete,
                detail,
            } = event
            {
                debug!("[{}/9] {} done: {}", step, label, detail);
            }
        })
        .build()?;

    info!("{}", "=".repeat(80));
    info!("Starting student risk preprocessing pipeline...");
    info!("{}", "=".repeat(80));

    let summary = orchestrator.run_blocking().map_err(|e| {
        error!("Pipeline failed [{}]: {}", e.error_code(), e);
        anyhow!("Pipeline failed: {}", e)
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(summary.as_ref())?);
    } else {
        print_human_readable_summary(&summary, &args);
    }

    Ok(())
}

/// Print a human-readable summary of the run.
fn print_human_readable_summary(summary: &ResultsSummary, args: &Args) {
    println!();
    println!("{}", "=".repeat(80));
    println!("PREPROCESSING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    println!(
        "Input:  {} ({} rows x {} columns)",
        args.input, summary.raw_rows, summary.raw_columns
    );
    println!("Output: {}", summary.output_dir.display());
    println!();

    println!("Processing Summary:");
    println!("  Duration: {}ms", summary.duration_ms);
    println!(
        "  Rows: {} -> {} ({} removed, {} duplicates)",
        summary.raw_rows, summary.clean_rows, summary.dropped_rows, summary.duplicates_removed
    );
    println!(
        "  Features: {} ({} engineered)",
        summary.feature_count,
        summary.engineered_features.len()
    );
    println!(
        "  Splits: train {} ({} synthetic), val {}, test {}",
        summary.split_sizes.train,
        summary.split_sizes.train_synthetic,
        summary.split_sizes.val,
        summary.split_sizes.test
    );
    let before = summary.class_distribution_before_balancing;
    let after = summary.class_distribution_after_balancing;
    println!(
        "  Train classes: {}/{} -> {}/{} (at risk / not at risk)",
        before.positive, before.negative, after.positive, after.negative
    );
    if !summary.imputed_values.is_empty() {
        println!("  Imputed columns: {}", summary.imputed_values.len());
    }
    println!();

    println!(
        "Validation: {}/{} checks passed",
        summary.validation.passed, summary.validation.total
    );
    for check in summary.validation.failed() {
        println!("  ! {}: {}", check.name, check.detail);
    }
    if !summary.zero_variance_features.is_empty() {
        println!(
            "  ! zero-variance features: {}",
            summary.zero_variance_features.join(", ")
        );
    }
    println!();

    if !summary.plots.is_empty() {
        println!("Plots: {}", summary.plots.join(", "));
    }
    println!("Use --json for machine-readable output");
    println!("{}", "=".repeat(80));
}
