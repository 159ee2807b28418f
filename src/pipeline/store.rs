//! Object-storage collaborator: Azure Blob container addressed by a SAS URL.
//!
//! The inference service dereferences image URLs itself, so composites are
//! parked in a blob container the service can reach. The container SAS URL
//! carries the write credential in its query string; the URL handed to the
//! inference request is the same address with the query stripped — the blob
//! must therefore be anonymously readable, which is a deployment requirement
//! of the URL-based image flow (use `inline_images` to avoid it entirely).

use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

/// A failed store operation, surfaced into the caller's error taxonomy
/// (fatal for the source-PDF upload, per-batch for a composite upload).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Blob container client over a service-generated container SAS URL.
pub struct BlobStore {
    client: Client,
    base: String,
    query: Option<String>,
}

impl BlobStore {
    /// Build a store from a container SAS URL such as
    /// `https://acct.blob.core.windows.net/container?sv=…&sig=…`.
    pub fn new(client: Client, container_sas: &str) -> Self {
        let (base, query) = match container_sas.split_once('?') {
            Some((base, query)) => (base.to_string(), Some(query.to_string())),
            None => (container_sas.to_string(), None),
        };
        Self {
            client,
            base: base.trim_end_matches('/').to_string(),
            query,
        }
    }

    /// The authenticated (SAS) URL for a named blob.
    fn sas_url(&self, name: &str) -> String {
        match &self.query {
            Some(q) => format!("{}/{}?{}", self.base, name, q),
            None => format!("{}/{}", self.base, name),
        }
    }

    /// The publicly dereferenceable URL for a named blob — the blob address
    /// with the SAS token stripped.
    pub fn public_url(&self, name: &str) -> String {
        format!("{}/{}", self.base, name)
    }

    /// Upload a blob, overwriting any existing one, and return its public URL.
    pub async fn upload(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        info!("Uploading {} ({} bytes) to blob storage", name, bytes.len());
        let response = self
            .client
            .put(self.sas_url(name))
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        Ok(self.public_url(name))
    }

    /// Whether a blob with this name already exists.
    pub async fn exists(&self, name: &str) -> Result<bool, StoreError> {
        let response = self.client.head(self.sas_url(name)).send().await?;
        Ok(response.status().is_success())
    }

    /// Delete a blob; deleting a blob that is not there is not an error.
    pub async fn delete(&self, name: &str) -> Result<(), StoreError> {
        let response = self.client.delete(self.sas_url(name)).send().await?;
        let status = response.status();
        if status.is_success() || status.as_u16() == 404 {
            debug!("Deleted blob {}", name);
            Ok(())
        } else {
            Err(StoreError::Status {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            })
        }
    }
}

/// Sanitise a file name for use as a blob name (spaces break SAS-signed URLs).
pub fn blob_name(file_name: &str) -> String {
    file_name.replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> BlobStore {
        BlobStore::new(
            Client::new(),
            "https://acct.blob.core.windows.net/tables?sv=2024&sig=abc",
        )
    }

    #[test]
    fn sas_url_inserts_the_blob_name_before_the_token() {
        assert_eq!(
            store().sas_url("report.pdf"),
            "https://acct.blob.core.windows.net/tables/report.pdf?sv=2024&sig=abc"
        );
    }

    #[test]
    fn public_url_strips_the_token() {
        assert_eq!(
            store().public_url("report.pdf"),
            "https://acct.blob.core.windows.net/tables/report.pdf"
        );
    }

    #[test]
    fn tokenless_container_url_still_addresses_blobs() {
        let store = BlobStore::new(Client::new(), "https://acct.blob.core.windows.net/tables/");
        assert_eq!(
            store.sas_url("a.jpg"),
            "https://acct.blob.core.windows.net/tables/a.jpg"
        );
    }

    #[test]
    fn blob_names_have_no_spaces() {
        assert_eq!(blob_name("Annual Report 2024.pdf"), "Annual_Report_2024.pdf");
    }
}
