//! PDF rasterisation: render the table pages to `DynamicImage` via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! The `pdfium-render` crate wraps the pdfium C++ library, which uses
//! thread-local state internally and is not safe to call from async contexts.
//! `tokio::task::spawn_blocking` moves the work onto the blocking thread pool
//! so the async workers never stall during CPU-heavy rendering.
//!
//! ## Why only the table pages?
//!
//! A 400-page report with tables on six pages needs six rasters, not 400.
//! The caller passes exactly the distinct page numbers appearing in the
//! planned runs; each raster is read-only once decoded and is shared across
//! whatever batch references it.

use crate::error::ExtractError;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Rasterise the given 1-based pages of a PDF.
///
/// Runs inside `spawn_blocking` since pdfium operations are CPU-bound.
///
/// A page that fails to rasterise is logged and omitted from the map — it
/// poisons only the batches that reference it, never the document. Failing to
/// open the document at all is fatal.
pub async fn render_pages(
    pdf_path: &Path,
    pages: &[u32],
    max_pixels: u32,
) -> Result<HashMap<u32, DynamicImage>, ExtractError> {
    let path = pdf_path.to_path_buf();
    let pages = pages.to_vec();

    tokio::task::spawn_blocking(move || render_pages_blocking(&path, &pages, max_pixels))
        .await
        .map_err(|e| ExtractError::Internal(format!("Render task panicked: {}", e)))?
}

/// Blocking implementation of page rendering.
fn render_pages_blocking(
    pdf_path: &Path,
    pages: &[u32],
    max_pixels: u32,
) -> Result<HashMap<u32, DynamicImage>, ExtractError> {
    let pdfium = Pdfium::default();

    let document =
        pdfium
            .load_pdf_from_file(pdf_path, None)
            .map_err(|e| ExtractError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: format!("{:?}", e),
            })?;

    let doc_pages = document.pages();
    let total_pages = doc_pages.len() as u32;
    info!("PDF loaded: {} pages", total_pages);

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut results = HashMap::with_capacity(pages.len());

    for &page_num in pages {
        if page_num == 0 || page_num > total_pages {
            warn!(
                "Skipping page {} (out of range, total={})",
                page_num, total_pages
            );
            continue;
        }

        let rendered = doc_pages
            .get((page_num - 1) as u16)
            .and_then(|page| page.render_with_config(&render_config).map(|b| b.as_image()));

        match rendered {
            Ok(image) => {
                debug!(
                    "Rendered page {} → {}x{} px",
                    page_num,
                    image.width(),
                    image.height()
                );
                results.insert(page_num, image);
            }
            Err(e) => {
                warn!("Rasterisation failed for page {}: {:?}", page_num, e);
            }
        }
    }

    Ok(results)
}
