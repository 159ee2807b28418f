//! CLI binary for pdf2tables.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf2tables::{
    extract, ExtractProgress, ExtractionConfig, ProgressCallback, ServiceSettings,
};
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a live batch-level progress bar with per-batch
/// log lines. Works correctly when batches complete out of order
/// (concurrency > 1).
struct CliProgress {
    bar: ProgressBar,
    /// Per-batch wall-clock start times for elapsed reporting.
    start_times: Mutex<HashMap<(usize, usize), Instant>>,
    /// Count of batches that were skipped.
    errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0); // length set in on_extract_start

        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(spinner_style);
        bar.set_prefix("Analysing");
        bar.set_message("detecting tables…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    fn page_span(pages: &[u32]) -> String {
        match (pages.first(), pages.last()) {
            (Some(first), Some(last)) if first != last => format!("pages {first}–{last}"),
            (Some(first), _) => format!("page {first}"),
            _ => String::from("no pages"),
        }
    }
}

impl ExtractProgress for CliProgress {
    fn on_extract_start(&self, total_batches: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} batches  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ");

        self.bar.set_length(total_batches as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Submitting {total_batches} batches…"))
        ));
    }

    fn on_batch_start(&self, run: usize, batch: usize, pages: &[u32]) {
        self.start_times
            .lock()
            .unwrap()
            .insert((run, batch), Instant::now());
        self.bar
            .set_message(format!("run {run} batch {batch} ({})", Self::page_span(pages)));
    }

    fn on_batch_complete(&self, run: usize, batch: usize, tables: usize) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&(run, batch))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.bar.println(format!(
            "  {} run {run} batch {batch}  {:<10}  {}",
            green("✓"),
            dim(&format!("{tables} tables")),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_batch_error(&self, run: usize, batch: usize, error: &str) {
        let elapsed_ms = self
            .start_times
            .lock()
            .unwrap()
            .remove(&(run, batch))
            .map(|t| t.elapsed().as_millis())
            .unwrap_or(0);

        self.errors.fetch_add(1, Ordering::SeqCst);

        // Truncate very long error bodies to keep output tidy.
        let msg: String = if error.len() > 100 {
            format!("{}…", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} run {run} batch {batch}  {}  {}",
            red("✗"),
            red(&msg),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
        self.bar.inc(1);
    }

    fn on_extract_complete(&self, total_batches: usize, completed: usize) {
        let skipped = total_batches.saturating_sub(completed);
        self.bar.finish_and_clear();

        if skipped == 0 {
            eprintln!(
                "{} {} batches extracted successfully",
                green("✔"),
                bold(&completed.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} batches extracted  ({} skipped)",
                if completed == 0 { red("✘") } else { cyan("⚠") },
                bold(&completed.to_string()),
                total_batches,
                red(&skipped.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Basic extraction (records land in ./output/<document>/)
  pdf2tables report.pdf

  # No positional argument: the path is prompted interactively
  pdf2tables

  # Custom output root, sequential submission
  pdf2tables report.pdf -o extracted --concurrency 1

  # No storage account: send composites as inline data URIs
  pdf2tables report.pdf --inline-images

  # Machine-readable result summary
  pdf2tables report.pdf --json > result.json

OUTPUT:
  One JSON file per extracted table:
    <output>/<document>/run<R>_batch<B>_table<S>.json
  R = consecutive-page run index, B = batch within the run,
  S = segment index within the batch's reply.

ENVIRONMENT VARIABLES:
  AZURE_OPENAI_ENDPOINT      Azure OpenAI resource endpoint (required)
  AZURE_OPENAI_DEPLOYMENT    Vision model deployment name (required)
  AZURE_OPENAI_API_KEY       Inference API key (required)
  AZURE_OPENAI_API_VERSION   API version (default: 2024-02-15-preview)
  DOCINTEL_ENDPOINT          Document Intelligence endpoint (required)
  DOCINTEL_API_KEY           Document Intelligence key (required)
  BLOB_CONTAINER_SAS         Container SAS URL (required unless --inline-images)
  PDFIUM_DYNAMIC_LIB_PATH    Path to the pdfium shared library

NOTE:
  With BLOB_CONTAINER_SAS the uploaded composites must be anonymously
  readable so the inference service can dereference their URLs. Use
  --inline-images to avoid the storage account entirely.
"#;

/// Extract tables from PDF documents as JSON using Vision LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "pdf2tables",
    version,
    about = "Extract tables from PDF documents as JSON using Vision LLMs",
    long_about = "Detect table pages with a layout service, stack consecutive pages into \
composite images, and have a Vision Language Model transcribe each composite into JSON \
records — one file per table.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the PDF file. Prompted interactively when omitted.
    input: Option<String>,

    /// Root directory for extracted records.
    #[arg(short, long, env = "PDF2TABLES_OUTPUT", default_value = "output")]
    output_dir: PathBuf,

    /// Upper bound on images per inference request (the batching divisor).
    #[arg(long, env = "PDF2TABLES_MAX_IMAGES", default_value_t = 20)]
    max_images: usize,

    /// Number of batches composed and submitted concurrently.
    #[arg(short, long, env = "PDF2TABLES_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Send composites as base64 data URIs instead of uploading them.
    #[arg(long, env = "PDF2TABLES_INLINE_IMAGES")]
    inline_images: bool,

    /// JPEG quality for composite encoding (1–100).
    #[arg(long, env = "PDF2TABLES_JPEG_QUALITY", default_value_t = 100,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Max model output tokens per batch.
    #[arg(long, env = "PDF2TABLES_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Model temperature (0.0–2.0).
    #[arg(long, env = "PDF2TABLES_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Nucleus-sampling cutoff (0.0–1.0).
    #[arg(long, env = "PDF2TABLES_TOP_P", default_value_t = 0.1)]
    top_p: f32,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PDF2TABLES_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Per-inference-call timeout in seconds.
    #[arg(long, env = "PDF2TABLES_API_TIMEOUT", default_value_t = 300)]
    api_timeout: u64,

    /// Overall layout-analysis deadline in seconds.
    #[arg(long, env = "PDF2TABLES_LAYOUT_TIMEOUT", default_value_t = 120)]
    layout_timeout: u64,

    /// Output the full structured result (records + stats) as JSON on stdout.
    #[arg(long, env = "PDF2TABLES_JSON")]
    json: bool,

    /// Disable the progress bar.
    #[arg(long, env = "PDF2TABLES_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDF2TABLES_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDF2TABLES_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active; the
    // bar provides the feedback that matters. Verbose always wins.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Resolve the input path ───────────────────────────────────────────
    let input = match cli.input {
        Some(ref path) => path.clone(),
        None => prompt_for_path()?,
    };

    if !cli.quiet {
        eprintln!("{}", bold(&format!("Processing file {input}")));
    }

    // ── Settings and config ──────────────────────────────────────────────
    let settings = ServiceSettings::from_env().context("Service settings incomplete")?;
    let config = build_config(&cli, show_progress).await?;

    // ── Run extraction ───────────────────────────────────────────────────
    let output = extract(&input, &settings, &config)
        .await
        .context("Extraction failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        eprintln!(
            "{}  {} tables from {} pages ({} runs, {} batches)  {}ms",
            if output.stats.batches_skipped == 0 {
                green("✔")
            } else {
                cyan("⚠")
            },
            bold(&output.stats.tables_extracted.to_string()),
            output.stats.pages_with_tables,
            output.stats.runs,
            output.stats.batches_planned,
            output.stats.total_duration_ms,
        );
        if output.stats.invalid_segments > 0 {
            eprintln!(
                "   {} reply segments failed validation",
                red(&output.stats.invalid_segments.to_string())
            );
        }
        for record in &output.records {
            if let Some(ref path) = record.path {
                eprintln!("   {}", dim(&path.display().to_string()));
            }
        }
    }

    Ok(())
}

/// Ask for the PDF path on stdin when no positional argument was given.
fn prompt_for_path() -> Result<String> {
    eprint!("Enter the full path to the PDF file to extract tables from: ");
    io::stderr().flush().ok();
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read path from stdin")?;
    let path = line.trim().to_string();
    anyhow::ensure!(!path.is_empty(), "No input path provided");
    Ok(path)
}

/// Map CLI args to `ExtractionConfig`.
async fn build_config(cli: &Cli, show_progress: bool) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .max_images_per_request(cli.max_images)
        .jpeg_quality(cli.jpeg_quality)
        .concurrency(cli.concurrency)
        .inline_images(cli.inline_images)
        .output_dir(cli.output_dir.clone())
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .top_p(cli.top_p)
        .api_timeout_secs(cli.api_timeout)
        .layout_timeout_secs(cli.layout_timeout);

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }

    if show_progress {
        let cb = CliProgress::new();
        builder = builder.progress_callback(cb as ProgressCallback);
    }

    builder.build().context("Invalid configuration")
}
