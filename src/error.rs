//! Error types for the pdf2tables library.
//!
//! Three error types reflect three distinct blast radii:
//!
//! * [`ExtractError`] — **Fatal**: the extraction cannot proceed at all
//!   (missing file, missing endpoint or credential setting, the document
//!   failed layout analysis). Returned as `Err(ExtractError)` from the
//!   top-level `extract*` functions, always before or instead of useful work.
//!
//! * [`BatchError`] — **Per-batch**: composing, uploading, or submitting one
//!   batch failed. Stored inside [`crate::output::BatchOutcome`] so callers
//!   see partial success; sibling batches are always still attempted.
//!
//! * [`SegmentError`] — **Per-segment**: one candidate document in a reply
//!   failed validation. Sibling segments in the same reply are unaffected.
//!
//! Nothing below the batch level ever unwinds past the batch, and the
//! pipeline's exit status reflects only whether an [`ExtractError`] occurred.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdf2tables library.
///
/// Batch-level failures use [`BatchError`] and are stored in
/// [`crate::output::BatchOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF header/trailer/xref is corrupt and cannot be opened.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// A required service setting is absent from the environment.
    #[error("Missing required setting {name}.\n{hint}")]
    MissingSetting { name: &'static str, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Document-level collaborator errors ────────────────────────────────
    /// Uploading the source PDF to the object store failed. Happens before
    /// any batch exists, so the whole run aborts.
    #[error("Failed to upload '{name}' to the object store: {detail}")]
    UploadFailed { name: String, detail: String },

    /// The layout-detection service rejected the document or the analyze
    /// operation did not reach a terminal `succeeded` state.
    #[error("Layout analysis failed: {detail}")]
    LayoutFailed { detail: String },

    /// Layout analysis did not finish within the configured deadline.
    #[error("Layout analysis timed out after {secs}s\nIncrease --layout-timeout.")]
    LayoutTimeout { secs: u64 },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single batch.
///
/// Stored in [`crate::output::BatchOutcome`] when a batch is skipped.
/// The overall extraction continues with the remaining batches.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum BatchError {
    /// Composing the batch's page images into one raster failed.
    #[error("run {run} batch {batch}: composition failed: {detail}")]
    Compose {
        run: usize,
        batch: usize,
        detail: String,
    },

    /// Uploading the composite image failed.
    #[error("run {run} batch {batch}: composite upload failed: {detail}")]
    Upload {
        run: usize,
        batch: usize,
        detail: String,
    },

    /// The inference endpoint returned a non-success response. The body is
    /// captured verbatim so the failing unit can be diagnosed offline.
    /// `status` 0 means the call never produced an HTTP response (transport
    /// failure or timeout); `body` then carries the client error.
    #[error("run {run} batch {batch}: inference call failed (HTTP {status}): {body}")]
    Inference {
        run: usize,
        batch: usize,
        status: u16,
        body: String,
    },
}

/// A malformed candidate document inside an otherwise usable reply.
///
/// `index` is the segment's position in split order — the same index used to
/// name the record on disk, so a reported error always points at the gap in
/// the output files.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
#[error("segment {index} is not a valid JSON document: {detail}")]
pub struct SegmentError {
    pub index: usize,
    pub detail: String,
}
