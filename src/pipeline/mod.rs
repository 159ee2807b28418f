//! Pipeline stages for table extraction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different layout backend) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! layout ──▶ index ──▶ plan ──▶ render ──▶ compose ──▶ store ──▶ infer ──▶ segment
//! (pages)   (runs)   (batches) (pdfium)   (stitch)   (upload)   (VLM)     (records)
//! ```
//!
//! 1. [`layout`]  — ask the layout service which pages carry tables
//! 2. [`index`]   — dedup/sort and partition into consecutive runs
//! 3. [`plan`]    — divisor-based batching within each run
//! 4. [`render`]  — rasterise exactly the table pages; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 5. [`compose`] — vertical stitch, JPEG encode at maximum quality
//! 6. [`store`]   — park composites where the inference service can see them
//! 7. [`infer`]   — one vision call per batch; the only per-batch network stage
//! 8. [`segment`] — split the reply on blank lines, validate each candidate
//!
//! Stages 2, 3, 5 and 8 are pure functions over their inputs; all the
//! algorithmic behaviour of the pipeline lives there.

pub mod compose;
pub mod index;
pub mod infer;
pub mod layout;
pub mod plan;
pub mod render;
pub mod segment;
pub mod store;
