//! Layout-detection collaborator: Azure Document Intelligence `prebuilt-layout`.
//!
//! The analyze API is asynchronous: the initial POST answers `202 Accepted`
//! with an `Operation-Location` header, which is then polled until the
//! operation reports a terminal status. Of the full layout result this
//! pipeline consumes exactly one thing — the page number of every bounding
//! region of every detected table. Duplicates are expected (a table spanning
//! pages contributes one region per page, several tables can share a page)
//! and are left for the index stage to collapse.
//!
//! No retry policy lives here; a failed or timed-out operation is fatal for
//! the run, reported before any composition work starts.

use crate::config::{ExtractionConfig, ServiceSettings};
use crate::error::ExtractError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info};

const ANALYZE_API_VERSION: &str = "2024-11-30";

/// How the document reaches the layout service.
pub enum DocumentSource {
    /// A URL the service dereferences itself (the uploaded source PDF).
    Url(String),
    /// Raw bytes, submitted inline as base64. Used when no object store is
    /// configured.
    Bytes(Vec<u8>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeOperation {
    status: String,
    #[serde(default)]
    analyze_result: Option<AnalyzeResult>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResult {
    #[serde(default)]
    tables: Vec<AnalyzedTable>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzedTable {
    #[serde(default)]
    bounding_regions: Vec<BoundingRegion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BoundingRegion {
    page_number: u32,
}

/// Every page number that carries a table region, duplicates included.
fn table_pages(result: &AnalyzeResult) -> Vec<u32> {
    result
        .tables
        .iter()
        .flat_map(|t| t.bounding_regions.iter().map(|r| r.page_number))
        .collect()
}

/// Run layout analysis and return the table page numbers.
///
/// Begins the analyze operation, then polls its `Operation-Location` until a
/// terminal status, bounded by `config.layout_timeout_secs`.
pub async fn detect_table_pages(
    client: &Client,
    settings: &ServiceSettings,
    config: &ExtractionConfig,
    source: DocumentSource,
) -> Result<Vec<u32>, ExtractError> {
    let analyze_url = format!(
        "{}/documentintelligence/documentModels/prebuilt-layout:analyze?api-version={}",
        settings.docintel_endpoint.trim_end_matches('/'),
        ANALYZE_API_VERSION
    );

    let body = match source {
        DocumentSource::Url(url) => serde_json::json!({ "urlSource": url }),
        DocumentSource::Bytes(bytes) => {
            serde_json::json!({ "base64Source": STANDARD.encode(bytes) })
        }
    };

    info!("Submitting document for layout analysis");
    let response = client
        .post(&analyze_url)
        .header("Ocp-Apim-Subscription-Key", &settings.docintel_key)
        .json(&body)
        .send()
        .await
        .map_err(|e| ExtractError::LayoutFailed {
            detail: e.to_string(),
        })?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExtractError::LayoutFailed {
            detail: format!(
                "analyze request rejected (HTTP {}): {}",
                status,
                response.text().await.unwrap_or_default()
            ),
        });
    }

    let operation_url = response
        .headers()
        .get("operation-location")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| ExtractError::LayoutFailed {
            detail: "analyze response carried no Operation-Location header".into(),
        })?;

    // Poll until the operation settles or the deadline passes.
    let deadline = Instant::now() + Duration::from_secs(config.layout_timeout_secs);
    loop {
        sleep(Duration::from_millis(config.layout_poll_interval_ms)).await;
        if Instant::now() >= deadline {
            return Err(ExtractError::LayoutTimeout {
                secs: config.layout_timeout_secs,
            });
        }

        let operation: AnalyzeOperation = client
            .get(&operation_url)
            .header("Ocp-Apim-Subscription-Key", &settings.docintel_key)
            .send()
            .await
            .map_err(|e| ExtractError::LayoutFailed {
                detail: e.to_string(),
            })?
            .json()
            .await
            .map_err(|e| ExtractError::LayoutFailed {
                detail: format!("malformed operation status: {}", e),
            })?;

        debug!("Layout operation status: {}", operation.status);
        match operation.status.as_str() {
            "succeeded" => {
                let result = operation.analyze_result.unwrap_or(AnalyzeResult {
                    tables: Vec::new(),
                });
                let pages = table_pages(&result);
                info!(
                    "Layout analysis found {} tables across {} page regions",
                    result.tables.len(),
                    pages.len()
                );
                return Ok(pages);
            }
            "failed" => {
                return Err(ExtractError::LayoutFailed {
                    detail: operation
                        .error
                        .map(|e| e.to_string())
                        .unwrap_or_else(|| "operation reported failure".into()),
                });
            }
            // notStarted / running — keep polling.
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collects_page_numbers_from_all_regions() {
        let raw = serde_json::json!({
            "status": "succeeded",
            "analyzeResult": {
                "tables": [
                    { "boundingRegions": [ { "pageNumber": 3 }, { "pageNumber": 4 } ] },
                    { "boundingRegions": [ { "pageNumber": 4 } ] },
                    { "boundingRegions": [ { "pageNumber": 9 } ] }
                ]
            }
        });
        let op: AnalyzeOperation = serde_json::from_value(raw).unwrap();
        let pages = table_pages(&op.analyze_result.unwrap());
        // Duplicates retained; the index stage owns deduplication.
        assert_eq!(pages, vec![3, 4, 4, 9]);
    }

    #[test]
    fn tolerates_missing_tables() {
        let op: AnalyzeOperation =
            serde_json::from_value(serde_json::json!({ "status": "succeeded" })).unwrap();
        assert!(op.analyze_result.is_none());
    }
}
