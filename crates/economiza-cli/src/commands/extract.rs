//! Extract command - read bill fields from a single file.

use std::collections::BTreeMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use economiza_core::models::EconomizaConfig;
use economiza_core::{DocumentTextExtractor, OcrProvider, ProcessedUpload, UploadProcessor};

use super::{content_type_for, load_config};

/// Arguments for the extract command.
#[derive(Args)]
pub struct ExtractArgs {
    /// Input file (text or PDF), or "-" for stdin
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Use only the rule-based parser
    #[arg(long)]
    no_ai: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

/// The upload processor for `config`, without AI providers when `no_ai`.
pub fn build_processor(config: &EconomizaConfig, no_ai: bool) -> UploadProcessor {
    if no_ai {
        UploadProcessor::from_config_with_providers(config, Vec::new())
    } else {
        UploadProcessor::from_config(config)
    }
}

/// Read a file's text the way an uploaded document would be read.
pub async fn read_text(path: &Path, bytes: &[u8], reader: &DocumentTextExtractor) -> String {
    let content_type = if path == Path::new("-") {
        "text/plain"
    } else {
        content_type_for(path)
    };
    reader.extract_text(bytes, content_type).await.text
}

pub async fn run(args: ExtractArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let bytes = if args.input == Path::new("-") {
        let mut buf = Vec::new();
        std::io::stdin().read_to_end(&mut buf)?;
        buf
    } else {
        if !args.input.exists() {
            anyhow::bail!("Input file not found: {}", args.input.display());
        }
        fs::read(&args.input)?
    };

    info!("Extracting from {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.set_message("Reading document...");

    let reader = DocumentTextExtractor::from_config(&config);
    let text = read_text(&args.input, &bytes, &reader).await;
    if text.trim().is_empty() {
        pb.finish_and_clear();
        anyhow::bail!("No text could be read from {}", args.input.display());
    }

    pb.set_message("Extracting fields...");
    let processor = build_processor(&config, args.no_ai);
    let mut metadata = BTreeMap::new();
    if let Some(name) = args.input.file_name().and_then(|n| n.to_str()) {
        metadata.insert("filename".to_string(), name.to_string());
    }
    let processed = processor.process_upload(&text, None, metadata).await;
    pb.finish_and_clear();

    let output = format_processed(&processed, args.format)?;

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

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_processed(processed: &ProcessedUpload, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(processed)?),
        OutputFormat::Csv => format_csv(processed),
        OutputFormat::Text => Ok(format_text(processed)),
    }
}

fn format_csv(processed: &ProcessedUpload) -> anyhow::Result<String> {
    let fields = &processed.fields;
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "issuer",
        "amount",
        "currency",
        "due_date",
        "barcode",
        "confidence",
        "status",
        "notes",
    ])?;

    wtr.write_record([
        fields.issuer.as_deref().unwrap_or(""),
        &fields.amount.map(|a| a.to_string()).unwrap_or_default(),
        &fields.currency,
        &fields.due_date.map(|d| d.to_string()).unwrap_or_default(),
        fields.barcode.as_deref().unwrap_or(""),
        &format!("{:.2}", fields.confidence),
        processed.bill_status.as_str(),
        &fields.notes,
    ])?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(processed: &ProcessedUpload) -> String {
    let fields = &processed.fields;
    let missing = "-".to_string();
    let mut output = String::new();

    output.push_str(&format!(
        "Issuer:     {}\n",
        fields.issuer.as_ref().unwrap_or(&missing)
    ));
    output.push_str(&format!(
        "Amount:     {}\n",
        fields
            .amount
            .map(|a| format!("{} {}", a, fields.currency))
            .unwrap_or_else(|| missing.clone())
    ));
    output.push_str(&format!(
        "Due date:   {}\n",
        fields
            .due_date
            .map(|d| d.format("%d/%m/%Y").to_string())
            .unwrap_or_else(|| missing.clone())
    ));
    output.push_str(&format!(
        "Barcode:    {}\n",
        fields.barcode.as_ref().unwrap_or(&missing)
    ));
    output.push_str(&format!("Confidence: {:.2}\n", fields.confidence));
    output.push_str(&format!("Status:     {}\n", processed.bill_status));
    if !fields.notes.is_empty() {
        output.push_str(&format!("Notes:      {}\n", fields.notes));
    }

    output
}
