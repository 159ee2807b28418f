//! Result types returned by the extraction pipeline.
//!
//! [`ExtractionOutput`] is the single return value of a successful run: the
//! validated records, one [`BatchOutcome`] per planned batch (including the
//! skipped ones, so nothing silently disappears), and aggregate
//! [`ExtractionStats`]. Everything derives `Serialize` so the CLI's `--json`
//! mode is a plain `serde_json::to_string_pretty` away.

use crate::error::{BatchError, SegmentError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One validated table record, addressed by its (run, batch, segment) key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableRecord {
    /// Index of the consecutive-page run within the document.
    pub run: usize,
    /// Index of the batch within its run.
    pub batch: usize,
    /// Index of the segment within the batch's reply.
    pub segment: usize,
    /// The validated JSON document, verbatim as the service produced it.
    pub json: String,
    /// Where the record was persisted, if a sink was in play.
    pub path: Option<PathBuf>,
}

/// Terminal state of one planned batch.
///
/// A batch either completed — its reply was segmented and every valid segment
/// persisted — or it was skipped with the error that stopped it. Segment
/// validation failures do not skip a batch; they are listed per batch so the
/// caller can see exactly which indices are missing from the output files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub run: usize,
    pub batch: usize,
    /// The 1-based page numbers composed into this batch, in stack order.
    pub pages: Vec<u32>,
    /// Valid candidate documents extracted from this batch's reply.
    pub tables: usize,
    /// Segments of this batch's reply that failed validation.
    pub invalid_segments: Vec<SegmentError>,
    /// Present when the batch was skipped before segmentation.
    pub error: Option<BatchError>,
    pub duration_ms: u64,
}

impl BatchOutcome {
    /// Whether the batch reached segmentation (it may still have produced
    /// zero tables, e.g. on a "no table" reply).
    pub fn completed(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate statistics for one extraction run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Distinct pages the layout service flagged as containing tables.
    pub pages_with_tables: usize,
    /// Maximal consecutive runs those pages formed.
    pub runs: usize,
    /// Batches planned across all runs.
    pub batches_planned: usize,
    /// Batches whose reply was segmented.
    pub batches_completed: usize,
    /// Batches skipped by a per-batch failure.
    pub batches_skipped: usize,
    /// Valid table records across all batches.
    pub tables_extracted: usize,
    /// Reply segments that failed validation across all batches.
    pub invalid_segments: usize,
    pub total_duration_ms: u64,
    pub render_duration_ms: u64,
    pub inference_duration_ms: u64,
}

/// Everything produced by one extraction run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// Validated records in (run, batch, segment) order.
    pub records: Vec<TableRecord>,
    /// One outcome per planned batch, in (run, batch) order.
    pub batches: Vec<BatchOutcome>,
    pub stats: ExtractionStats,
}

impl ExtractionOutput {
    /// An output for a document with no table pages at all.
    pub(crate) fn empty(total_duration_ms: u64) -> Self {
        Self {
            records: Vec::new(),
            batches: Vec::new(),
            stats: ExtractionStats {
                total_duration_ms,
                ..Default::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_outcome_completed() {
        let ok = BatchOutcome {
            run: 0,
            batch: 0,
            pages: vec![3, 4, 5],
            tables: 2,
            invalid_segments: vec![],
            error: None,
            duration_ms: 10,
        };
        assert!(ok.completed());

        let skipped = BatchOutcome {
            error: Some(BatchError::Compose {
                run: 0,
                batch: 0,
                detail: "empty batch".into(),
            }),
            ..ok.clone()
        };
        assert!(!skipped.completed());
    }

    #[test]
    fn output_serialises_to_json() {
        let output = ExtractionOutput::empty(42);
        let json = serde_json::to_string(&output).unwrap();
        assert!(json.contains("\"total_duration_ms\":42"));
    }
}
