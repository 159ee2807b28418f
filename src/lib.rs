//! # pdf2tables
//!
//! Extract tables from PDF documents as JSON using Vision Language Models.
//!
//! ## Why this crate?
//!
//! Geometric table extractors (ruling-line detection, text clustering) break
//! on merged cells, rotated headers, and tables that continue across page
//! breaks. This crate takes the other road: a layout service says *which*
//! pages carry tables, those pages are rasterised and stacked into composite
//! images, and a vision model reads each composite as a human would,
//! emitting one JSON document per table. A table split across consecutive
//! pages arrives at the model as one tall image, so it comes back as one
//! record.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Layout   which pages contain tables (Document Intelligence)
//!  ├─ 2. Index    dedup + sort + group into consecutive runs
//!  ├─ 3. Plan     divisor-based batching, ≤ 20 composites per run
//!  ├─ 4. Render   rasterise the table pages via pdfium (spawn_blocking)
//!  ├─ 5. Compose  vertical stitch per batch, JPEG at maximum quality
//!  ├─ 6. Submit   one vision call per batch (blob URL or inline data URI)
//!  ├─ 7. Segment  split reply on blank lines, validate each JSON candidate
//!  └─ 8. Sink     run{r}_batch{b}_table{s}.json per validated record
//! ```
//!
//! Batches are independent and processed over a bounded worker pool; a batch
//! that fails to compose or submit is skipped and reported without touching
//! its siblings.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf2tables::{extract, ExtractionConfig, ServiceSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Endpoints and keys come from AZURE_OPENAI_* / DOCINTEL_* /
//!     // BLOB_CONTAINER_SAS environment variables.
//!     let settings = ServiceSettings::from_env()?;
//!     let config = ExtractionConfig::default();
//!     let output = extract("report.pdf", &settings, &config).await?;
//!     for record in &output.records {
//!         println!("run {} batch {} table {}", record.run, record.batch, record.segment);
//!     }
//!     eprintln!("{} tables, {} batches skipped",
//!         output.stats.tables_extracted,
//!         output.stats.batches_skipped);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2tables` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdf2tables = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod sink;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ExtractionConfig, ExtractionConfigBuilder, ServiceSettings};
pub use error::{BatchError, ExtractError, SegmentError};
pub use extract::{extract, extract_sync};
pub use output::{BatchOutcome, ExtractionOutput, ExtractionStats, TableRecord};
pub use pipeline::segment::CandidateDocument;
pub use progress::{ExtractProgress, NoopProgress, ProgressCallback};
pub use sink::{FsSink, RecordKey, RecordSink};
