//! Process command - extract and reconcile a single card image.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use pokedata_core::models::config::{FallbackPolicy, PokedataConfig, ReconcileOptions};

use super::output::{format_record, OutputFormat};
use super::pipeline::{build_engine, is_card_image, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input card image
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    #[command(flatten)]
    engine: EngineArgs,

    /// Show quality score and processing time
    #[arg(long)]
    show_confidence: bool,
}

/// Options shared by `process` and `batch`.
#[derive(Args, Clone)]
pub struct EngineArgs {
    /// OCR model directory
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// Layout hint for region cropping (creature, trainer, annotated)
    #[arg(long)]
    pub layout: Option<String>,

    /// Skip the remote vision service
    #[arg(long)]
    pub no_remote: bool,

    /// Remote confidence threshold (0.0 - 1.0)
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Record weak-remote fallbacks as suggestions instead of applying them
    #[arg(long)]
    pub suggest: bool,
}

impl EngineArgs {
    /// Per-invocation options: config first, then flags.
    pub fn options(&self, config: &PokedataConfig) -> ReconcileOptions {
        let mut options = config.reconcile_options(self.layout.clone());
        if self.no_remote {
            options = options.with_remote_enabled(false);
        }
        if let Some(threshold) = self.threshold {
            options = options.with_threshold(threshold);
        }
        if self.suggest {
            options = options.with_fallback_policy(FallbackPolicy::Suggest);
        }
        options
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    if !is_card_image(&args.input) {
        anyhow::bail!("Unsupported file format: {}", args.input.display());
    }

    info!("Processing card: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")?);

    pb.set_message("Loading engines...");
    let engine = build_engine(&config, args.engine.model_dir.clone())?;
    let options = args.engine.options(&config);

    pb.set_message("Extracting fields...");
    let bytes = fs::read(&args.input)?;
    let record = engine.extract_and_reconcile_bytes(&bytes, &options).await?;

    pb.finish_and_clear();

    let output = format_record(&record, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.show_confidence {
        eprintln!();
        eprintln!(
            "{} Quality score: {:.1}%",
            style("ℹ").blue(),
            record.quality_score() * 100.0
        );
        eprintln!(
            "{} Processing time: {}ms",
            style("ℹ").blue(),
            start.elapsed().as_millis()
        );
    }

    if !record.warnings().is_empty() {
        eprintln!(
            "{} {} warning(s): {}",
            style("!").yellow(),
            record.warnings().len(),
            record.warning_codes().join(", ")
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}
