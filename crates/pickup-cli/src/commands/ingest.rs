//! Ingest command - run local files through the intake pipeline.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use tracing::{debug, warn};

use pickup_core::error::{Stage, StageFailure};
use pickup_core::extraction::{BackendKind, StandardProvider};
use pickup_core::intake::{AdmissionProfile, UploadCandidate};
use pickup_core::models::config::PickupConfig;
use pickup_core::pipeline::{BatchOutcome, IngestOutcome, IntakePipeline};
use pickup_core::session::ExtractionSession;

use super::{OutputFormat, ProfileArg, load_config, mime_for};

/// Arguments for the ingest command.
#[derive(Args)]
pub struct IngestArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Requester identity recorded in storage keys
    #[arg(short, long)]
    requester: Option<String>,

    /// Admission profile
    #[arg(short, long, value_enum, default_value = "document")]
    profile: ProfileArg,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Write one output file per upload instead of printing
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Storage root (overrides config)
    #[arg(long)]
    storage_root: Option<PathBuf>,

    /// Recognition engine
    #[arg(short, long, value_enum, default_value = "auto")]
    engine: EngineArg,

    /// OCR model directory (overrides config)
    #[arg(short, long)]
    model_dir: Option<PathBuf>,

    /// Per-document timeout in seconds, 0 disables (overrides config)
    #[arg(long)]
    timeout: Option<u64>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum EngineArg {
    /// OCR when models are installed, otherwise the text layer
    Auto,
    /// Embedded PDF text layer
    Text,
    /// OCR over page images
    Ocr,
    /// No recognition; every record is flagged for review
    Unverified,
}

impl EngineArg {
    fn resolve(self, config: &PickupConfig) -> BackendKind {
        match self {
            EngineArg::Auto if config.ocr.models_present() => BackendKind::Ocr,
            EngineArg::Auto | EngineArg::Text => BackendKind::Text,
            EngineArg::Ocr => BackendKind::Ocr,
            EngineArg::Unverified => BackendKind::Unverified,
        }
    }
}

/// Per-run counters.
#[derive(Debug, Default)]
struct Summary {
    extracted: usize,
    stored: usize,
    rejected: usize,
    format_invalid: usize,
    needs_review: usize,
    persist_failed: usize,
    extract_failed: usize,
}

impl Summary {
    /// Uploads written to the storage root, whatever happened afterwards.
    fn persisted(&self) -> usize {
        self.extracted + self.stored + self.format_invalid + self.extract_failed
    }

    fn failed(&self) -> usize {
        self.persist_failed + self.extract_failed
    }
}

pub async fn run(args: IngestArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(root) = &args.storage_root {
        config.intake.storage_root = root.clone();
    }
    if let Some(model_dir) = &args.model_dir {
        config.ocr.model_dir = model_dir.clone();
    }
    if let Some(timeout) = args.timeout {
        config.extraction.timeout_secs = timeout;
    }

    // Expand glob pattern
    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to ingest",
        style("ℹ").blue(),
        files.len()
    );

    let candidates = files
        .iter()
        .map(|path| read_candidate(path))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let kind = args.engine.resolve(&config);
    let provider = StandardProvider::new(kind, config.extraction.clone(), config.ocr.clone());
    let session = ExtractionSession::open(&provider, config.extraction.clone())?;
    let pipeline = IntakePipeline::new(&config, session);
    pipeline.initialize().await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    spinner.set_message(format!(
        "Processing {} files with {} engine",
        files.len(),
        pipeline.session().backend_name()
    ));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = pipeline
        .ingest_batch(&candidates, args.requester.as_deref(), AdmissionProfile::from(args.profile))
        .await;

    spinner.finish_and_clear();

    if let Err(e) = pipeline.shutdown() {
        warn!("Session cleanup failed: {}", e);
    }

    let results = match outcome {
        BatchOutcome::Rejected(reason) => anyhow::bail!("Batch rejected: {}", reason),
        BatchOutcome::Processed(results) => results,
    };

    let mut summary = Summary::default();
    let mut reports = Vec::with_capacity(results.len());
    for (path, result) in files.iter().zip(&results) {
        tally(&mut summary, result);
        reports.push(report(path, result)?);
    }

    if let Some(output_dir) = &args.output_dir {
        fs::create_dir_all(output_dir)?;
        let mut taken = HashSet::new();
        for (path, report) in files.iter().zip(&reports) {
            let name = output_name(path, args.format.extension(), &mut taken);
            let output_path = output_dir.join(name);
            let content = render(args.format, std::slice::from_ref(report))?;
            fs::write(&output_path, content)?;
            debug!("Wrote output to {}", output_path.display());
        }
    } else {
        print!("{}", render(args.format, &reports)?);
    }

    print_summary(&summary, &results, start.elapsed());

    Ok(())
}

fn read_candidate(path: &Path) -> anyhow::Result<UploadCandidate> {
    let bytes = fs::read(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(UploadCandidate::new(bytes, mime_for(path), name))
}

fn tally(summary: &mut Summary, result: &Result<IngestOutcome, StageFailure>) {
    match result {
        Ok(IngestOutcome::Extracted { needs_review, .. }) => {
            summary.extracted += 1;
            if *needs_review {
                summary.needs_review += 1;
            }
        }
        Ok(IngestOutcome::Stored { .. }) => summary.stored += 1,
        Ok(IngestOutcome::Rejected { .. }) => summary.rejected += 1,
        Ok(IngestOutcome::FormatInvalid { .. }) => summary.format_invalid += 1,
        Err(failure) if failure.stage == Stage::Persist => summary.persist_failed += 1,
        Err(_) => summary.extract_failed += 1,
    }
}

/// Output file name for `path`. Inputs sharing a stem get a numeric suffix.
fn output_name(path: &Path, extension: &str, taken: &mut HashSet<String>) -> String {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("upload");
    let mut name = format!("{}.{}", stem, extension);
    let mut n = 1;
    while !taken.insert(name.clone()) {
        name = format!("{}-{}.{}", stem, n, extension);
        n += 1;
    }
    name
}

/// One JSON object per upload, tagged with its source path.
fn report(path: &Path, result: &Result<IngestOutcome, StageFailure>) -> anyhow::Result<Value> {
    let mut value = match result {
        Ok(outcome) => serde_json::to_value(outcome)?,
        Err(failure) => json!({
            "outcome": "failed",
            "stage": failure.stage.to_string(),
            "storage_key": failure.storage_key,
            "error": failure.to_string(),
        }),
    };
    if let Some(obj) = value.as_object_mut() {
        obj.insert("source".to_string(), json!(path.display().to_string()));
    }
    Ok(value)
}

fn render(format: OutputFormat, reports: &[Value]) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(reports)?)),
        OutputFormat::Csv => render_csv(reports),
        OutputFormat::Text => Ok(reports.iter().map(render_text).collect::<Vec<_>>().join("\n")),
    }
}

fn field(report: &Value, pointer: &str) -> String {
    match report.pointer(pointer) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn detail(report: &Value) -> String {
    match field(report, "/outcome").as_str() {
        "rejected" => report
            .get("reason")
            .map(|r| r.to_string())
            .unwrap_or_default(),
        "failed" => field(report, "/error"),
        "extracted" => report
            .get("issues")
            .and_then(|i| i.as_array())
            .map(|issues| {
                issues
                    .iter()
                    .filter_map(|i| i.as_str())
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default(),
        _ => String::new(),
    }
}

fn render_csv(reports: &[Value]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record([
        "source",
        "outcome",
        "storage_key",
        "order_number",
        "issue_date",
        "sender_name",
        "recipient_name",
        "basin_code",
        "confidence",
        "needs_review",
        "detail",
    ])?;

    for report in reports {
        wtr.write_record([
            field(report, "/source"),
            field(report, "/outcome"),
            storage_key(report),
            field(report, "/order/orderNumber"),
            field(report, "/order/issueDate"),
            field(report, "/order/senderName"),
            field(report, "/order/recipientName"),
            field(report, "/order/basinCode"),
            field(report, "/order/confidence"),
            field(report, "/needs_review"),
            detail(report),
        ])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn storage_key(report: &Value) -> String {
    let key = field(report, "/file/key");
    if key.is_empty() {
        field(report, "/storage_key")
    } else {
        key
    }
}

fn render_text(report: &Value) -> String {
    let mut output = String::new();

    output.push_str(&format!("File: {}\n", field(report, "/source")));
    output.push_str(&format!("Outcome: {}\n", field(report, "/outcome")));

    let key = storage_key(report);
    if !key.is_empty() {
        output.push_str(&format!("Stored as: {}\n", key));
    }

    if report.get("order").is_some() {
        output.push_str(&format!("Order: {}\n", field(report, "/order/orderNumber")));
        output.push_str(&format!("Issued: {}\n", field(report, "/order/issueDate")));
        output.push_str(&format!("Sender: {}\n", field(report, "/order/senderName")));
        output.push_str(&format!("Recipient: {}\n", field(report, "/order/recipientName")));
        output.push_str(&format!("Basin: {}\n", field(report, "/order/basinCode")));
        output.push_str(&format!("Confidence: {}\n", field(report, "/order/confidence")));
        if field(report, "/needs_review") == "true" {
            output.push_str("Needs review: yes\n");
        }
    }

    let detail = detail(report);
    if !detail.is_empty() {
        output.push_str(&format!("Detail: {}\n", detail));
    }

    output
}

fn print_summary(
    summary: &Summary,
    results: &[Result<IngestOutcome, StageFailure>],
    elapsed: Duration,
) {
    eprintln!();
    eprintln!(
        "{} Ingested {} files in {:?}",
        style("✓").green(),
        results.len(),
        elapsed
    );
    eprintln!(
        "   {} stored, {} rejected, {} invalid format, {} need review, {} failed",
        style(summary.persisted()).green(),
        style(summary.rejected).yellow(),
        style(summary.format_invalid).yellow(),
        style(summary.needs_review).yellow(),
        style(summary.failed()).red()
    );

    let failures: Vec<_> = results.iter().filter_map(|r| r.as_ref().err()).collect();
    if !failures.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed files:").red());
        for failure in failures {
            eprintln!("  - {}", failure);
        }
    }
}
