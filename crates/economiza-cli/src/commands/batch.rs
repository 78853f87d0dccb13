//! Batch extraction command for multiple bill files.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use futures_util::stream::{self, StreamExt};
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};

use economiza_core::{DocumentTextExtractor, ProcessedUpload, UploadProcessor};

use super::extract::{build_processor, format_processed, read_text, OutputFormat};
use super::load_config;

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

    /// Number of files processed concurrently
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    /// Use only the rule-based parser
    #[arg(long)]
    no_ai: bool,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    processed: Option<ProcessedUpload>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(
                ext.to_lowercase().as_str(),
                "pdf" | "txt" | "png" | "jpg" | "jpeg" | "webp" | "tif" | "tiff"
            )
        })
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let processor = build_processor(&config, args.no_ai);
    let reader = DocumentTextExtractor::from_config(&config);
    let jobs = args.jobs.max(1);

    let mut pending = stream::iter(files)
        .map(|path| process_single_file(path, &processor, &reader))
        .buffer_unordered(jobs);

    let mut results = Vec::new();
    while let Some(result) = pending.next().await {
        overall_pb.inc(1);

        if let Some(message) = &result.error {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", result.path.display(), message);
            } else {
                error!("Failed to process {}: {}", result.path.display(), message);
                overall_pb.abandon();
                anyhow::bail!("Processing failed: {}", message);
            }
        }
        results.push(result);
    }

    overall_pb.finish_and_clear();
    results.sort_by(|a, b| a.path.cmp(&b.path));

    let successful: Vec<_> = results.iter().filter(|r| r.processed.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    if let Some(output_dir) = &args.output_dir {
        for result in &successful {
            if let Some(processed) = &result.processed {
                let output_name = result
                    .path
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("bill");
                let output_path =
                    output_dir.join(format!("{}.{}", output_name, args.format.extension()));

                fs::write(&output_path, format_processed(processed, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

async fn process_single_file(
    path: PathBuf,
    processor: &UploadProcessor,
    reader: &DocumentTextExtractor,
) -> ProcessResult {
    let file_start = Instant::now();
    let outcome = extract_file(&path, processor, reader).await;
    let processing_time_ms = file_start.elapsed().as_millis() as u64;

    match outcome {
        Ok(processed) => ProcessResult {
            path,
            processed: Some(processed),
            error: None,
            processing_time_ms,
        },
        Err(e) => ProcessResult {
            path,
            processed: None,
            error: Some(e.to_string()),
            processing_time_ms,
        },
    }
}

async fn extract_file(
    path: &Path,
    processor: &UploadProcessor,
    reader: &DocumentTextExtractor,
) -> anyhow::Result<ProcessedUpload> {
    let bytes = tokio::fs::read(path).await?;
    let text = read_text(path, &bytes, reader).await;
    if text.trim().is_empty() {
        anyhow::bail!("No text could be read");
    }

    let mut metadata = BTreeMap::new();
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        metadata.insert("filename".to_string(), name.to_string());
    }
    Ok(processor.process_upload(&text, None, metadata).await)
}

fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "issuer",
        "amount",
        "due_date",
        "barcode",
        "confidence",
        "bill_status",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result
            .path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("");

        if let Some(processed) = &result.processed {
            let fields = &processed.fields;
            wtr.write_record([
                filename,
                "success",
                fields.issuer.as_deref().unwrap_or(""),
                &fields.amount.map(|a| a.to_string()).unwrap_or_default(),
                &fields.due_date.map(|d| d.to_string()).unwrap_or_default(),
                fields.barcode.as_deref().unwrap_or(""),
                &format!("{:.2}", fields.confidence),
                processed.bill_status.as_str(),
                &result.processing_time_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                "",
                "",
                "",
                &result.processing_time_ms.to_string(),
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}
