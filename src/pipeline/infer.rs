//! Multimodal inference collaborator: one chat-completions call per batch.
//!
//! The request is the classic vision layout — a system message, then a single
//! user message whose content array carries one text instruction followed by
//! the batch's composite images in run order. Images travel by URL; a data
//! URI is just a URL the service never has to fetch, which is how
//! `inline_images` mode rides the same request shape.
//!
//! There is deliberately no retry loop here: a non-success response is
//! captured — status and body — and surfaced as a per-batch error so the
//! failing unit can be diagnosed, while sibling batches proceed. Retry and
//! backoff policy belongs to the caller's infrastructure, not this client.

use crate::config::{ExtractionConfig, ServiceSettings};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info};

/// A failed inference call. `Status` preserves the response body verbatim.
#[derive(Debug, Error)]
pub enum InferError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("reply carried no message content")]
    MalformedReply,
}

/// Wrap JPEG bytes as a `data:` URI usable wherever an image URL is expected.
pub fn jpeg_data_uri(bytes: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes))
}

/// Build the chat-completions request body for one batch.
///
/// Kept pure (no client, no I/O) so the exact wire shape is unit-testable.
pub fn build_request_body(
    settings: &ServiceSettings,
    system_prompt: &str,
    instruction: &str,
    image_urls: &[String],
    config: &ExtractionConfig,
) -> Value {
    let mut content = vec![json!({ "type": "text", "text": instruction })];
    for url in image_urls {
        content.push(json!({ "type": "image_url", "image_url": { "url": url } }));
    }

    json!({
        "messages": [
            { "role": "system", "content": system_prompt },
            { "role": "user", "content": content }
        ],
        "model": settings.openai_deployment,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "top_p": config.top_p,
    })
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Extract the assistant text from a parsed completions reply.
fn reply_content(reply: ChatReply) -> Option<String> {
    reply.choices.into_iter().next()?.message.content
}

/// Submit one batch's images and return the model's free-form reply text.
pub async fn infer(
    client: &Client,
    settings: &ServiceSettings,
    config: &ExtractionConfig,
    image_urls: &[String],
) -> Result<String, InferError> {
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(crate::prompts::DEFAULT_SYSTEM_PROMPT);

    let body = build_request_body(
        settings,
        system_prompt,
        crate::prompts::USER_INSTRUCTION,
        image_urls,
        config,
    );

    info!("Submitting {} image(s) for table extraction", image_urls.len());
    let response = client
        .post(settings.completions_url())
        .header("api-key", &settings.openai_api_key)
        .header("Accept", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(InferError::Status {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        });
    }

    let reply: ChatReply = response.json().await?;
    let content = reply_content(reply).ok_or(InferError::MalformedReply)?;
    debug!("Reply: {} bytes", content.len());
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ServiceSettings {
        ServiceSettings {
            openai_endpoint: "https://myres.openai.azure.com".into(),
            openai_deployment: "gpt-4o".into(),
            openai_api_key: "k".into(),
            openai_api_version: "2024-02-15-preview".into(),
            docintel_endpoint: "https://d".into(),
            docintel_key: "k".into(),
            blob_container_sas: None,
        }
    }

    #[test]
    fn request_body_interleaves_text_then_images() {
        let urls = vec![
            "https://acct.blob.core.windows.net/t/a.jpg".to_string(),
            "https://acct.blob.core.windows.net/t/b.jpg".to_string(),
        ];
        let body = build_request_body(
            &settings(),
            "system",
            "instruction",
            &urls,
            &ExtractionConfig::default(),
        );

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");

        let content = body["messages"][1]["content"].as_array().unwrap();
        assert_eq!(content.len(), 3);
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["image_url"]["url"], urls[0].as_str());
        assert_eq!(content[2]["image_url"]["url"], urls[1].as_str());

        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["model"], "gpt-4o");
    }

    #[test]
    fn reply_content_reads_the_first_choice() {
        let reply: ChatReply = serde_json::from_value(serde_json::json!({
            "choices": [ { "message": { "content": "no table" } } ]
        }))
        .unwrap();
        assert_eq!(reply_content(reply).as_deref(), Some("no table"));
    }

    #[test]
    fn empty_choices_is_malformed() {
        let reply: ChatReply = serde_json::from_value(serde_json::json!({ "choices": [] })).unwrap();
        assert!(reply_content(reply).is_none());
    }

    #[test]
    fn data_uri_has_the_jpeg_mime() {
        let uri = jpeg_data_uri(&[0xFF, 0xD8, 0xFF]);
        assert!(uri.starts_with("data:image/jpeg;base64,"));
        assert!(uri.len() > "data:image/jpeg;base64,".len());
    }
}
