//! Batch processing command for multiple card images.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use pokedata_core::{Field, ReconciledRecord, Warning};

use super::output::{csv_header, csv_row, format_record, OutputFormat};
use super::pipeline::{build_engine, is_card_image, load_config};
use super::process::EngineArgs;

const SUMMARY_FILE: &str = "summary.csv";

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

/// Outcome for one card. A failed card never stops the batch.
struct CardOutcome {
    path: PathBuf,
    record: Option<ReconciledRecord>,
    error: Option<String>,
    processing_time_ms: u64,
    processed_at: DateTime<Utc>,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let config = load_config(config_path)?;

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_card_image(p))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} cards to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let engine = build_engine(&config, args.engine.model_dir.clone())?;
    let options = args.engine.options(&config);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} cards",
        )?
        .progress_chars("=>-"),
    );

    // Cards run one at a time; each record is independent of the others.
    let mut outcomes = Vec::with_capacity(files.len());
    for path in files {
        let card_start = Instant::now();
        let result = match fs::read(&path) {
            Ok(bytes) => engine
                .extract_and_reconcile_bytes(&bytes, &options)
                .await
                .map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        let processing_time_ms = card_start.elapsed().as_millis() as u64;

        let (record, error) = match result {
            Ok(record) => (Some(record), None),
            Err(e) => {
                warn!("Failed to process {}: {}", path.display(), e);
                (None, Some(e))
            }
        };
        outcomes.push(CardOutcome {
            path,
            record,
            error,
            processing_time_ms,
            processed_at: Utc::now(),
        });

        pb.inc(1);
    }

    pb.finish_and_clear();

    if let Some(output_dir) = &args.output_dir {
        let mut taken = HashSet::new();
        if args.summary {
            taken.insert(SUMMARY_FILE.to_string());
        }
        for outcome in &outcomes {
            let Some(record) = &outcome.record else {
                continue;
            };
            let stem = outcome
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("card");
            let output_path =
                output_dir.join(unique_output_name(stem, args.format.extension(), &mut taken));
            fs::write(&output_path, format_record(record, args.format)?)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join(SUMMARY_FILE))
            .unwrap_or_else(|| PathBuf::from(SUMMARY_FILE));

        write_summary(&summary_path, &outcomes)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<&CardOutcome> = outcomes.iter().filter(|o| o.error.is_some()).collect();
    let review_count = outcomes
        .iter()
        .filter_map(|o| o.record.as_ref())
        .filter(|r| needs_review(r))
        .count();

    println!();
    println!(
        "{} Processed {} cards in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed, {} need review",
        style(outcomes.len() - failed.len()).green(),
        style(failed.len()).red(),
        style(review_count).yellow()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed cards:").red());
        for outcome in &failed {
            println!(
                "  - {}: {}",
                outcome.path.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// `stem.ext`, or `stem_2.ext`, `stem_3.ext`... when the name is taken.
fn unique_output_name(stem: &str, extension: &str, taken: &mut HashSet<String>) -> String {
    let mut name = format!("{}.{}", stem, extension);
    let mut n = 2;
    while taken.contains(&name) {
        name = format!("{}_{}.{}", stem, n, extension);
        n += 1;
    }
    taken.insert(name.clone());
    name
}

fn needs_review(record: &ReconciledRecord) -> bool {
    record
        .warnings()
        .iter()
        .any(|w| matches!(w, Warning::MissingRequired(_) | Warning::ClassificationUnknown))
}

fn write_summary(path: &Path, outcomes: &[CardOutcome]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    let mut header = vec![
        "filename".to_string(),
        "status".to_string(),
        "processed_at".to_string(),
        "processing_time_ms".to_string(),
        "error".to_string(),
    ];
    header.extend(csv_header());
    wtr.write_record(&header)?;

    for outcome in outcomes {
        let filename = outcome
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_string();
        let status = if outcome.record.is_some() { "success" } else { "error" };

        let mut row = vec![
            filename,
            status.to_string(),
            outcome.processed_at.to_rfc3339(),
            outcome.processing_time_ms.to_string(),
            outcome.error.clone().unwrap_or_default(),
        ];
        match &outcome.record {
            Some(record) => row.extend(csv_row(record)),
            None => row.extend(std::iter::repeat_n(String::new(), Field::ALL.len() + 3)),
        }
        wtr.write_record(&row)?;
    }

    wtr.flush()?;
    Ok(())
}
