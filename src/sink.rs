//! Local sink: persist validated records keyed by (run, batch, segment).
//!
//! The pipeline emits each validated candidate document through a
//! [`RecordSink`]; where those records end up — filesystem, queue, database —
//! is the host application's decision. [`FsSink`] is the built-in filesystem
//! implementation: one `.json` file per record under a per-document
//! directory, named so that a record's origin can be read straight off the
//! file name and a reported segment error always points at the gap in the
//! sequence.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Address of one record within a document's extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordKey {
    pub run: usize,
    pub batch: usize,
    pub segment: usize,
}

impl RecordKey {
    /// The canonical file name for this record.
    pub fn file_name(&self) -> String {
        format!(
            "run{}_batch{}_table{}.json",
            self.run, self.batch, self.segment
        )
    }
}

/// Destination for validated candidate documents.
///
/// Implementations must be `Send + Sync`: batches complete concurrently, and
/// each writes its own records as soon as its reply is segmented.
pub trait RecordSink: Send + Sync {
    /// Persist one record; returns where it landed, if anywhere meaningful.
    fn write_record(&self, key: RecordKey, body: &str) -> io::Result<Option<PathBuf>>;
}

/// Filesystem sink writing records under `<root>/<document>/`.
pub struct FsSink {
    dir: PathBuf,
}

impl FsSink {
    /// Create the per-document directory, emptying it if it already exists so
    /// stale records from a previous pass never mix with fresh ones.
    pub fn create(root: &Path, document: &str) -> io::Result<Self> {
        let dir = root.join(document);
        if dir.exists() {
            for entry in fs::read_dir(&dir)? {
                let path = entry?.path();
                if path.is_file() {
                    fs::remove_file(&path)?;
                }
            }
            debug!("Cleared stale records in {}", dir.display());
        } else {
            fs::create_dir_all(&dir)?;
        }
        info!("Output directory set to {}", dir.display());
        Ok(Self { dir })
    }

    /// The per-document directory records are written into.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl RecordSink for FsSink {
    fn write_record(&self, key: RecordKey, body: &str) -> io::Result<Option<PathBuf>> {
        let path = self.dir.join(key.file_name());
        fs::write(&path, body)?;
        debug!("Wrote {}", path.display());
        Ok(Some(path))
    }
}
