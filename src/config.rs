//! Configuration types for table extraction.
//!
//! Two structs with two different lifetimes:
//!
//! * [`ExtractionConfig`] — per-run behaviour knobs (batch limit, JPEG
//!   quality, concurrency, timeouts), built via [`ExtractionConfigBuilder`].
//! * [`ServiceSettings`] — endpoint addresses and credentials for the three
//!   remote collaborators, read once from the environment. A missing required
//!   setting is a fatal [`ExtractError::MissingSetting`] reported before any
//!   remote call is made.
//!
//! # Design choice: builder over constructor
//! A dozen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! well-documented defaults for the rest.

use crate::error::ExtractError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Configuration for one extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or using
/// [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use pdf2tables::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .max_images_per_request(10)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Upper bound on images (and therefore batches per run) submitted in one
    /// inference request. Default: 20.
    ///
    /// This is the divisor of the batching rule: a run of consecutive pages is
    /// split into `ceil(len / max_images_per_request)`-page batches, so a very
    /// long run still yields at most this many composites, each composite
    /// stacking several pages. `1` degenerates to one composite per run.
    pub max_images_per_request: usize,

    /// JPEG quality for composite encoding, 1–100. Default: 100.
    ///
    /// Composites are transmitted, not archived, so the format is lossy, but
    /// quality is pinned at maximum: compression artefacts on rendered text
    /// measurably degrade what the vision model can read.
    pub jpeg_quality: u8,

    /// Number of batches composed and submitted concurrently. Default: 4.
    ///
    /// Batches are mutually independent — no shared mutable state, results
    /// joined by (run, batch) key — so a bounded pool is safe. Set to 1 to
    /// reproduce strictly sequential submission order.
    pub concurrency: usize,

    /// Maximum rendered page dimension (width or height) in pixels. Default: 2000.
    ///
    /// A safety cap independent of page size: an A0 poster would otherwise
    /// rasterise to a pixel buffer in the hundreds of megabytes. Capping the
    /// longest edge keeps memory bounded and stays inside the image-size
    /// sweet spot for vision models.
    pub max_rendered_pixels: u32,

    /// Sampling temperature for the inference call. Default: 0.1.
    ///
    /// Low temperature keeps the model faithful to the pixels — exactly what
    /// table transcription wants.
    pub temperature: f32,

    /// Nucleus-sampling cutoff for the inference call. Default: 0.1.
    pub top_p: f32,

    /// Maximum tokens the model may generate per batch. Default: 4096.
    ///
    /// Dense multi-page composites can emit several JSON documents; setting
    /// this too low truncates the reply mid-record and the tail segments fail
    /// validation.
    pub max_tokens: usize,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Embed composites as base64 data URIs in the request instead of
    /// uploading them to the object store. Default: false.
    ///
    /// With this on, no storage account is needed at all — the document goes
    /// to layout analysis as a base64 payload and images travel inline.
    pub inline_images: bool,

    /// Root directory for extracted records. Default: `output`.
    ///
    /// Records land in `<output_dir>/<document>/`, which is emptied at the
    /// start of each run so stale records from a previous pass never mix with
    /// fresh ones.
    pub output_dir: PathBuf,

    /// Per-inference-call timeout in seconds. Default: 300.
    pub api_timeout_secs: u64,

    /// Overall deadline for layout analysis in seconds. Default: 120.
    pub layout_timeout_secs: u64,

    /// Delay between layout-operation polls in milliseconds. Default: 1500.
    pub layout_poll_interval_ms: u64,

    /// Progress observer invoked at batch boundaries. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_images_per_request: 20,
            jpeg_quality: 100,
            concurrency: 4,
            max_rendered_pixels: 2000,
            temperature: 0.1,
            top_p: 0.1,
            max_tokens: 4096,
            system_prompt: None,
            inline_images: false,
            output_dir: PathBuf::from("output"),
            api_timeout_secs: 300,
            layout_timeout_secs: 120,
            layout_poll_interval_ms: 1500,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("max_images_per_request", &self.max_images_per_request)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("concurrency", &self.concurrency)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("max_tokens", &self.max_tokens)
            .field("inline_images", &self.inline_images)
            .field("output_dir", &self.output_dir)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ExtractProgress>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn max_images_per_request(mut self, n: usize) -> Self {
        self.config.max_images_per_request = n;
        self
    }

    pub fn jpeg_quality(mut self, q: u8) -> Self {
        self.config.jpeg_quality = q.clamp(1, 100);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn top_p(mut self, p: f32) -> Self {
        self.config.top_p = p.clamp(0.0, 1.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn inline_images(mut self, v: bool) -> Self {
        self.config.inline_images = v;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn layout_timeout_secs(mut self, secs: u64) -> Self {
        self.config.layout_timeout_secs = secs;
        self
    }

    pub fn layout_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.layout_poll_interval_ms = ms;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.max_images_per_request == 0 {
            return Err(ExtractError::InvalidConfig(
                "max_images_per_request must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(ExtractError::InvalidConfig("Concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

// ── Service settings ─────────────────────────────────────────────────────

/// Endpoint addresses and credentials for the remote collaborators.
///
/// All fields come from the environment via [`ServiceSettings::from_env`];
/// the inference endpoint, deployment, key, and the layout endpoint and key
/// are required. The object-store SAS URL is optional — it is only needed
/// when composites are uploaded rather than sent inline.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    /// Azure OpenAI resource endpoint, e.g. `https://myres.openai.azure.com`.
    pub openai_endpoint: String,
    /// Model deployment name within the resource.
    pub openai_deployment: String,
    /// API key for the inference endpoint.
    pub openai_api_key: String,
    /// API version query parameter for the inference endpoint.
    pub openai_api_version: String,
    /// Document Intelligence resource endpoint.
    pub docintel_endpoint: String,
    /// API key for the layout-detection endpoint.
    pub docintel_key: String,
    /// Blob container SAS URL, e.g.
    /// `https://acct.blob.core.windows.net/container?sv=…`. Optional.
    pub blob_container_sas: Option<String>,
}

/// Fallback API version when `AZURE_OPENAI_API_VERSION` is unset.
const DEFAULT_API_VERSION: &str = "2024-02-15-preview";

impl ServiceSettings {
    /// Read settings from the environment.
    ///
    /// # Errors
    /// [`ExtractError::MissingSetting`] naming the first absent required
    /// variable, with an export hint.
    pub fn from_env() -> Result<Self, ExtractError> {
        Ok(Self {
            openai_endpoint: require_env(
                "AZURE_OPENAI_ENDPOINT",
                "export AZURE_OPENAI_ENDPOINT=https://<resource>.openai.azure.com",
            )?,
            openai_deployment: require_env(
                "AZURE_OPENAI_DEPLOYMENT",
                "export AZURE_OPENAI_DEPLOYMENT=<vision model deployment name>",
            )?,
            openai_api_key: require_env(
                "AZURE_OPENAI_API_KEY",
                "export AZURE_OPENAI_API_KEY=<key from the Azure portal>",
            )?,
            openai_api_version: std::env::var("AZURE_OPENAI_API_VERSION")
                .ok()
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            docintel_endpoint: require_env(
                "DOCINTEL_ENDPOINT",
                "export DOCINTEL_ENDPOINT=https://<resource>.cognitiveservices.azure.com",
            )?,
            docintel_key: require_env(
                "DOCINTEL_API_KEY",
                "export DOCINTEL_API_KEY=<key from the Azure portal>",
            )?,
            blob_container_sas: std::env::var("BLOB_CONTAINER_SAS")
                .ok()
                .filter(|v| !v.is_empty()),
        })
    }

    /// The fully-addressed chat-completions URL for the configured deployment.
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.openai_endpoint.trim_end_matches('/'),
            self.openai_deployment,
            self.openai_api_version
        )
    }
}

fn require_env(name: &'static str, hint: &str) -> Result<String, ExtractError> {
    match std::env::var(name) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ExtractError::MissingSetting {
            name,
            hint: hint.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ServiceSettings {
        ServiceSettings {
            openai_endpoint: "https://myres.openai.azure.com/".into(),
            openai_deployment: "gpt-4o".into(),
            openai_api_key: "k".into(),
            openai_api_version: "2024-02-15-preview".into(),
            docintel_endpoint: "https://myres.cognitiveservices.azure.com".into(),
            docintel_key: "k".into(),
            blob_container_sas: None,
        }
    }

    #[test]
    fn completions_url_normalises_trailing_slash() {
        let url = settings().completions_url();
        assert_eq!(
            url,
            "https://myres.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );
    }

    #[test]
    fn builder_rejects_zero_batch_limit() {
        let err = ExtractionConfig::builder()
            .max_images_per_request(0)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("max_images_per_request"));
    }

    #[test]
    fn builder_clamps_quality_and_concurrency() {
        let config = ExtractionConfig::builder()
            .jpeg_quality(255)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(config.jpeg_quality, 100);
        assert_eq!(config.concurrency, 1);
    }
}
