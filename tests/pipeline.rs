//! Offline integration tests over the pure core of the pipeline.
//!
//! Everything here runs without pdfium, without credentials, and without the
//! network: the stages under test (indexing, planning, composition,
//! segmentation, the sink) are pure functions or local I/O, which is exactly
//! the part of the pipeline whose behaviour is contractual.

use image::{DynamicImage, Rgba, RgbaImage};
use pdf2tables::pipeline::{compose, index, plan, segment};
use pdf2tables::{FsSink, RecordKey, RecordSink};

fn page(width: u32, height: u32, shade: u8) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([shade, shade, shade, 255]),
    ))
}

// ── Indexing + planning ──────────────────────────────────────────────────────

#[test]
fn reference_scenario_short_runs_become_single_page_batches() {
    // {3,4,5,9,10,20} with the default limit of 20: three runs, and since
    // every run is shorter than the limit, every page is its own batch.
    let runs = index::consecutive_runs(&[3, 4, 5, 9, 10, 20]);
    assert_eq!(runs, vec![vec![3, 4, 5], vec![9, 10], vec![20]]);

    for run in &runs {
        let batches = plan::plan_batches(run, 20).unwrap();
        assert_eq!(batches.len(), run.len());
        assert!(batches.iter().all(|b| b.len() == 1));
    }
}

#[test]
fn reference_scenario_long_run_packs_three_pages_per_batch() {
    let run: Vec<u32> = (100..145).collect(); // 45 consecutive pages
    let batches = plan::plan_batches(&run, 20).unwrap();
    assert_eq!(batches.len(), 15);
    assert!(batches.iter().all(|b| b.len() == 3));

    let rejoined: Vec<u32> = batches.into_iter().flatten().collect();
    assert_eq!(rejoined, run);
}

#[test]
fn index_then_plan_covers_every_page_exactly_once() {
    let pages = [7u32, 3, 4, 12, 13, 14, 15, 40, 3, 12];
    let mut expected = pages.to_vec();
    expected.sort_unstable();
    expected.dedup();

    let mut seen = Vec::new();
    for run in index::consecutive_runs(&pages) {
        for batch in plan::plan_batches(&run, 4).unwrap() {
            seen.extend(batch);
        }
    }
    assert_eq!(seen, expected);
}

// ── Composition ──────────────────────────────────────────────────────────────

#[test]
fn composed_batch_preserves_page_order_top_to_bottom() {
    // Three "pages" with distinct shades; the composite must show them in
    // batch order at cumulative offsets.
    let pages = vec![page(40, 10, 10), page(60, 20, 120), page(50, 15, 230)];
    let composite = compose::compose_batch(&pages).unwrap();

    assert_eq!(composite.width(), 60);
    assert_eq!(composite.height(), 45);
    assert_eq!(composite.get_pixel(0, 0).0, [10, 10, 10]);
    assert_eq!(composite.get_pixel(0, 10).0, [120, 120, 120]);
    assert_eq!(composite.get_pixel(0, 30).0, [230, 230, 230]);
    // Width mismatch is left as-is: right of page 0 is canvas white.
    assert_eq!(composite.get_pixel(55, 0).0, [255, 255, 255]);
}

#[test]
fn composite_encodes_to_jpeg_for_transmission() {
    let composite = compose::compose_batch(&[page(32, 32, 64)]).unwrap();
    let bytes = compose::encode_jpeg(&composite, 100).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8]);

    // The encoded bytes round back into a raster of the same dimensions.
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 32));
}

// ── Segmentation + sink ──────────────────────────────────────────────────────

#[test]
fn reply_segments_persist_under_their_segment_index() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = FsSink::create(tmp.path(), "report").unwrap();

    let reply = "{\"region\": \"EMEA\", \"total\": 42}\n\nnot json at all\n\n{\"region\": \"APAC\"}";
    let mut written = Vec::new();
    let mut invalid = Vec::new();

    for result in segment::segment_reply(reply) {
        match result {
            Ok(doc) => {
                let key = RecordKey {
                    run: 1,
                    batch: 0,
                    segment: doc.index,
                };
                sink.write_record(key, &doc.json).unwrap();
                written.push(doc.index);
            }
            Err(e) => invalid.push(e.index),
        }
    }

    // Indices 0 and 2 persisted; index 1 reported; neighbours untouched.
    assert_eq!(written, vec![0, 2]);
    assert_eq!(invalid, vec![1]);
    assert!(sink.dir().join("run1_batch0_table0.json").exists());
    assert!(!sink.dir().join("run1_batch0_table1.json").exists());
    assert!(sink.dir().join("run1_batch0_table2.json").exists());

    let body = std::fs::read_to_string(sink.dir().join("run1_batch0_table0.json")).unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&body).is_ok());
}

#[test]
fn no_table_reply_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let sink = FsSink::create(tmp.path(), "empty").unwrap();

    for result in segment::segment_reply("No table\n") {
        let doc = result.unwrap();
        sink.write_record(
            RecordKey {
                run: 0,
                batch: 0,
                segment: doc.index,
            },
            &doc.json,
        )
        .unwrap();
    }

    assert_eq!(std::fs::read_dir(sink.dir()).unwrap().count(), 0);
}
