//! Top-level extraction entry points.
//!
//! [`extract`] drives one document through the whole pipeline: layout
//! detection, run indexing, batch planning, composition, inference, and
//! segmentation, persisting validated records through an [`FsSink`].
//!
//! ## Failure containment
//!
//! Everything up to batch planning is fatal — there is nothing sensible to
//! salvage from a document that cannot be opened or analysed. From
//! composition onward, failures are per-batch: a batch that cannot be
//! composed, uploaded, or inferred is recorded as skipped and its siblings
//! are still attempted, so the output always accounts for every planned
//! batch. Per-document states run `Indexed → Batched → Composing →
//! Submitted → Segmented → Done`; `Skipped` is terminal per batch only.

use crate::config::{ExtractionConfig, ServiceSettings};
use crate::error::{BatchError, ExtractError};
use crate::output::{BatchOutcome, ExtractionOutput, ExtractionStats, TableRecord};
use crate::pipeline::infer::InferError;
use crate::pipeline::layout::DocumentSource;
use crate::pipeline::{compose, index, infer, layout, plan, render, segment, store};
use crate::sink::{FsSink, RecordKey, RecordSink};
use futures::stream::{self, StreamExt};
use image::DynamicImage;
use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Extract all tables from a PDF document into JSON records.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`    — path to a local PDF file
/// * `settings` — collaborator endpoints and credentials
/// * `config`   — extraction configuration
///
/// # Returns
/// `Ok(ExtractionOutput)` on completion, even if some batches were skipped
/// (check `output.stats.batches_skipped`).
///
/// # Errors
/// Returns `Err(ExtractError)` only for fatal, whole-run errors: missing or
/// non-PDF input, missing settings, document upload or layout failure.
pub async fn extract(
    input: impl AsRef<Path>,
    settings: &ServiceSettings,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let total_start = Instant::now();
    let pdf_path = input.as_ref();
    info!("Processing file {}", pdf_path.display());

    // ── Step 1: Validate configuration and input ─────────────────────────
    if config.max_images_per_request == 0 {
        return Err(ExtractError::InvalidConfig(
            "max_images_per_request must be ≥ 1".into(),
        ));
    }
    if !config.inline_images && settings.blob_container_sas.is_none() {
        return Err(ExtractError::MissingSetting {
            name: "BLOB_CONTAINER_SAS",
            hint: "export BLOB_CONTAINER_SAS=<container SAS URL>, or enable inline_images \
                   to send composites as data URIs instead."
                .into(),
        });
    }
    validate_pdf_input(pdf_path)?;

    let file_name = pdf_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".into());
    let doc = document_name(pdf_path);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.api_timeout_secs))
        .build()
        .map_err(|e| ExtractError::Internal(format!("HTTP client: {}", e)))?;

    let sink = FsSink::create(&config.output_dir, &doc)
        .map_err(|e| ExtractError::Internal(format!("output directory: {}", e)))?;

    let blob_store = settings
        .blob_container_sas
        .as_deref()
        .map(|sas| store::BlobStore::new(client.clone(), sas));

    // ── Step 2: Hand the document to layout detection ────────────────────
    let pdf_bytes = tokio::fs::read(pdf_path)
        .await
        .map_err(|e| ExtractError::Internal(format!("read {}: {}", pdf_path.display(), e)))?;

    let source = match &blob_store {
        Some(bs) => {
            let name = store::blob_name(&file_name);
            let url = bs.upload(&name, pdf_bytes, "application/pdf").await.map_err(|e| {
                ExtractError::UploadFailed {
                    name,
                    detail: e.to_string(),
                }
            })?;
            DocumentSource::Url(url)
        }
        None => DocumentSource::Bytes(pdf_bytes),
    };

    let table_pages = layout::detect_table_pages(&client, settings, config, source).await?;

    // ── Step 3: Index pages into consecutive runs ────────────────────────
    let runs = index::consecutive_runs(&table_pages);
    if runs.is_empty() {
        info!("No tables detected; nothing to extract");
        return Ok(ExtractionOutput::empty(
            total_start.elapsed().as_millis() as u64
        ));
    }
    let pages_with_tables: Vec<u32> = runs.iter().flatten().copied().collect();
    info!(
        "{} pages with tables across {} consecutive runs",
        pages_with_tables.len(),
        runs.len()
    );

    // ── Step 4: Rasterise exactly the table pages ────────────────────────
    let render_start = Instant::now();
    let images =
        render::render_pages(pdf_path, &pages_with_tables, config.max_rendered_pixels).await?;
    let render_duration_ms = render_start.elapsed().as_millis() as u64;
    info!("Rendered {} pages in {}ms", images.len(), render_duration_ms);

    // ── Step 5: Plan batches per run ─────────────────────────────────────
    let mut jobs = Vec::new();
    for (run_idx, run) in runs.iter().enumerate() {
        for (batch_idx, batch) in plan::plan_batches(run, config.max_images_per_request)?
            .into_iter()
            .enumerate()
        {
            jobs.push(BatchJob {
                run: run_idx,
                batch: batch_idx,
                pages: batch,
            });
        }
    }
    debug!("Planned {} batches", jobs.len());

    if let Some(ref cb) = config.progress_callback {
        cb.on_extract_start(jobs.len());
    }

    // ── Step 6: Compose, submit, and segment each batch ──────────────────
    let ctx = BatchCtx {
        client: &client,
        settings,
        config,
        images: &images,
        blob_store: blob_store.as_ref(),
        sink: &sink,
        doc: &doc,
    };

    let total_batches = jobs.len();
    let batch_start = Instant::now();
    let mut results: Vec<(BatchOutcome, Vec<TableRecord>)> = stream::iter(jobs)
        .map(|job| process_batch(&ctx, job))
        .buffer_unordered(config.concurrency)
        .collect()
        .await;
    let inference_duration_ms = batch_start.elapsed().as_millis() as u64;

    // Completion order is concurrency-dependent; output order is not.
    results.sort_by_key(|(outcome, _)| (outcome.run, outcome.batch));

    // ── Step 7: Aggregate outcomes and stats ─────────────────────────────
    let mut batches = Vec::with_capacity(results.len());
    let mut records = Vec::new();
    for (outcome, mut batch_records) in results {
        records.append(&mut batch_records);
        batches.push(outcome);
    }

    let completed = batches.iter().filter(|b| b.completed()).count();
    let stats = ExtractionStats {
        pages_with_tables: pages_with_tables.len(),
        runs: runs.len(),
        batches_planned: total_batches,
        batches_completed: completed,
        batches_skipped: total_batches - completed,
        tables_extracted: records.len(),
        invalid_segments: batches.iter().map(|b| b.invalid_segments.len()).sum(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        render_duration_ms,
        inference_duration_ms,
    };

    if let Some(ref cb) = config.progress_callback {
        cb.on_extract_complete(total_batches, completed);
    }

    info!(
        "Extraction complete: {} tables from {}/{} batches in {}ms",
        stats.tables_extracted, completed, total_batches, stats.total_duration_ms
    );

    Ok(ExtractionOutput {
        records,
        batches,
        stats,
    })
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    input: impl AsRef<Path>,
    settings: &ServiceSettings,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(input, settings, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

struct BatchJob {
    run: usize,
    batch: usize,
    pages: Vec<u32>,
}

/// Shared, read-only context for concurrent batch processing.
struct BatchCtx<'a> {
    client: &'a reqwest::Client,
    settings: &'a ServiceSettings,
    config: &'a ExtractionConfig,
    images: &'a HashMap<u32, DynamicImage>,
    blob_store: Option<&'a store::BlobStore>,
    sink: &'a dyn RecordSink,
    doc: &'a str,
}

/// Drive one batch through compose → submit → segment → persist.
///
/// Never returns an error: every failure mode is folded into the
/// [`BatchOutcome`] so sibling batches are unaffected.
async fn process_batch(ctx: &BatchCtx<'_>, job: BatchJob) -> (BatchOutcome, Vec<TableRecord>) {
    let start = Instant::now();
    let BatchJob { run, batch, pages } = job;

    if let Some(ref cb) = ctx.config.progress_callback {
        cb.on_batch_start(run, batch, &pages);
    }

    let outcome = run_batch(ctx, run, batch, &pages).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok((records, invalid_segments)) => {
            if let Some(ref cb) = ctx.config.progress_callback {
                cb.on_batch_complete(run, batch, records.len());
            }
            (
                BatchOutcome {
                    run,
                    batch,
                    pages,
                    tables: records.len(),
                    invalid_segments,
                    error: None,
                    duration_ms,
                },
                records,
            )
        }
        Err(error) => {
            warn!("{}", error);
            if let Some(ref cb) = ctx.config.progress_callback {
                cb.on_batch_error(run, batch, &error.to_string());
            }
            (
                BatchOutcome {
                    run,
                    batch,
                    pages,
                    tables: 0,
                    invalid_segments: Vec::new(),
                    error: Some(error),
                    duration_ms,
                },
                Vec::new(),
            )
        }
    }
}

/// The fallible body of one batch; the caller folds the error into the outcome.
async fn run_batch(
    ctx: &BatchCtx<'_>,
    run: usize,
    batch: usize,
    pages: &[u32],
) -> Result<(Vec<TableRecord>, Vec<crate::error::SegmentError>), BatchError> {
    // Compose. A page missing from the raster map failed to render earlier
    // and poisons exactly this batch.
    let mut batch_images = Vec::with_capacity(pages.len());
    for &page in pages {
        match ctx.images.get(&page) {
            Some(img) => batch_images.push(img.clone()),
            None => {
                return Err(BatchError::Compose {
                    run,
                    batch,
                    detail: format!("page {} raster unavailable", page),
                })
            }
        }
    }

    let composite = compose::compose_batch(&batch_images).map_err(|e| BatchError::Compose {
        run,
        batch,
        detail: e.to_string(),
    })?;
    drop(batch_images);
    let jpeg = compose::encode_jpeg(&composite, ctx.config.jpeg_quality).map_err(|e| {
        BatchError::Compose {
            run,
            batch,
            detail: e.to_string(),
        }
    })?;
    drop(composite);

    // Park the composite where the model can see it.
    let image_url = match ctx.blob_store {
        Some(bs) if !ctx.config.inline_images => {
            let name = format!("{}.run_{}.part_{}.jpg", ctx.doc, run, batch);
            if bs.exists(&name).await.unwrap_or(false) {
                let _ = bs.delete(&name).await;
            }
            bs.upload(&name, jpeg, "image/jpeg")
                .await
                .map_err(|e| BatchError::Upload {
                    run,
                    batch,
                    detail: e.to_string(),
                })?
        }
        _ => infer::jpeg_data_uri(&jpeg),
    };

    // Submit.
    let reply = match infer::infer(ctx.client, ctx.settings, ctx.config, &[image_url]).await {
        Ok(reply) => reply,
        Err(InferError::Status { status, body }) => {
            return Err(BatchError::Inference {
                run,
                batch,
                status,
                body,
            })
        }
        Err(e) => {
            return Err(BatchError::Inference {
                run,
                batch,
                status: 0,
                body: e.to_string(),
            })
        }
    };

    // Segment and persist.
    let mut records = Vec::new();
    let mut invalid = Vec::new();
    for result in segment::segment_reply(&reply) {
        match result {
            Ok(doc) => {
                let key = RecordKey {
                    run,
                    batch,
                    segment: doc.index,
                };
                let path = match ctx.sink.write_record(key, &doc.json) {
                    Ok(path) => path,
                    Err(e) => {
                        warn!("Failed to persist {}: {}", key.file_name(), e);
                        None
                    }
                };
                records.push(TableRecord {
                    run,
                    batch,
                    segment: doc.index,
                    json: doc.json,
                    path,
                });
            }
            Err(e) => {
                warn!("run {} batch {}: {}", run, batch, e);
                invalid.push(e);
            }
        }
    }

    info!(
        "run {} batch {}: {} tables, {} invalid segments",
        run,
        batch,
        records.len(),
        invalid.len()
    );
    Ok((records, invalid))
}

/// Validate the input path: it must exist, be readable, and start with the
/// PDF magic bytes.
fn validate_pdf_input(path: &Path) -> Result<(), ExtractError> {
    if !path.exists() {
        return Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(ExtractError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(ExtractError::PermissionDenied {
                path: path.to_path_buf(),
            })
        }
        Err(_) => Err(ExtractError::FileNotFound {
            path: path.to_path_buf(),
        }),
    }
}

/// Directory-safe document name: file stem with spaces replaced.
fn document_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".into())
        .replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_name_strips_extension_and_spaces() {
        assert_eq!(
            document_name(Path::new("/tmp/Annual Report 2024.pdf")),
            "Annual_Report_2024"
        );
        assert_eq!(document_name(Path::new("plain.pdf")), "plain");
    }

    #[test]
    fn missing_file_is_fatal() {
        let err = validate_pdf_input(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(matches!(err, ExtractError::FileNotFound { .. }));
    }

    #[test]
    fn non_pdf_magic_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("fake.pdf");
        std::fs::write(&path, b"GIF89a....").unwrap();
        let err = validate_pdf_input(&path).unwrap_err();
        assert!(matches!(err, ExtractError::NotAPdf { .. }));
    }

    #[test]
    fn pdf_magic_passes() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        assert!(validate_pdf_input(&path).is_ok());
    }
}
