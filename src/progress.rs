//! Progress-callback trait for per-batch extraction events.
//!
//! Inject an [`Arc<dyn ExtractProgress>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline works through the planned batches.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers can
//! forward events to a broadcast channel, a WebSocket, or a terminal progress
//! bar without the library knowing anything about how the host application
//! communicates. The trait is `Send + Sync` because batches are processed
//! concurrently over a bounded pool.

use std::sync::Arc;

/// Called by the extraction pipeline at batch boundaries.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. When `concurrency > 1` the per-batch methods may be
/// invoked concurrently from different tasks; implementations must protect
/// shared mutable state accordingly.
pub trait ExtractProgress: Send + Sync {
    /// Called once after planning, before any batch is composed.
    fn on_extract_start(&self, total_batches: usize) {
        let _ = total_batches;
    }

    /// Called just before a batch is composed and submitted.
    fn on_batch_start(&self, run: usize, batch: usize, pages: &[u32]) {
        let _ = (run, batch, pages);
    }

    /// Called when a batch's reply has been segmented and persisted.
    ///
    /// `tables` counts the valid candidate documents written for this batch.
    fn on_batch_complete(&self, run: usize, batch: usize, tables: usize) {
        let _ = (run, batch, tables);
    }

    /// Called when a batch is skipped (composition, upload, or inference
    /// failure). Sibling batches continue.
    fn on_batch_error(&self, run: usize, batch: usize, error: &str) {
        let _ = (run, batch, error);
    }

    /// Called once after every planned batch has been attempted.
    fn on_extract_complete(&self, total_batches: usize, completed: usize) {
        let _ = (total_batches, completed);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgress;

impl ExtractProgress for NoopProgress {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractProgress>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TrackingProgress {
        batches: AtomicUsize,
        errors: AtomicUsize,
    }

    impl ExtractProgress for TrackingProgress {
        fn on_batch_complete(&self, _run: usize, _batch: usize, _tables: usize) {
            self.batches.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_error(&self, _run: usize, _batch: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_progress_does_not_panic() {
        let cb = NoopProgress;
        cb.on_extract_start(3);
        cb.on_batch_start(0, 0, &[3, 4, 5]);
        cb.on_batch_complete(0, 0, 2);
        cb.on_batch_error(1, 0, "composition failed");
        cb.on_extract_complete(3, 2);
    }

    #[test]
    fn tracking_progress_receives_events() {
        let tracker = TrackingProgress {
            batches: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        };
        tracker.on_batch_complete(0, 0, 1);
        tracker.on_batch_complete(0, 1, 3);
        tracker.on_batch_error(1, 0, "boom");
        assert_eq!(tracker.batches.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ExtractProgress> = Arc::new(NoopProgress);
        cb.on_extract_start(10);
        cb.on_batch_start(0, 1, &[9, 10]);
    }
}
