//! AI capability over the Anthropic Messages API.
//!
//! ARCHITECTURAL RULE: no other module may call the model API directly.
//! All AI traffic goes through this adapter, reached via the gateway.
//!
//! Stored-file references inside a chat message are resolved through
//! the fs capability and attached as base64 document blocks, so callers
//! keep passing opaque storage paths.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::capability::{
    AiCapability, AiContent, AiContentPart, AiMessage, AiResponse, ChatMessage, ChatOptions,
    ContentPart, FsCapability,
};
use crate::ops::MODEL;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Deserialize)]
struct ApiResponse {
    content: Vec<ApiContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ApiContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

pub struct ModelClient {
    client: Client,
    api_key: String,
    fs: Arc<dyn FsCapability>,
}

impl ModelClient {
    pub fn new(api_key: String, fs: Arc<dyn FsCapability>) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            fs,
        }
    }

    /// Resolves message parts into API content blocks. File parts are
    /// fetched through the fs capability as base64 PDF documents.
    async fn resolve_content(&self, parts: &[ContentPart]) -> Result<Vec<Value>> {
        let mut blocks = Vec::with_capacity(parts.len());
        for part in parts {
            match part {
                ContentPart::File { path } => {
                    let bytes = self.fs.read(path).await?;
                    blocks.push(json!({
                        "type": "document",
                        "source": {
                            "type": "base64",
                            "media_type": "application/pdf",
                            "data": BASE64.encode(&bytes),
                        }
                    }));
                }
                ContentPart::Text { text } => {
                    blocks.push(json!({ "type": "text", "text": text }));
                }
            }
        }
        Ok(blocks)
    }

    async fn send(&self, model: &str, messages: Vec<Value>) -> Result<ApiResponse> {
        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&json!({
                "model": model,
                "max_tokens": MAX_TOKENS,
                "messages": messages,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(anyhow!("model API error (status {status}): {message}"));
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl AiCapability for ModelClient {
    async fn chat(
        &self,
        messages: Vec<ChatMessage>,
        options: Option<ChatOptions>,
    ) -> Result<Option<AiResponse>> {
        let model = options.map(|o| o.model).unwrap_or_else(|| MODEL.to_string());

        let mut resolved = Vec::with_capacity(messages.len());
        for message in &messages {
            resolved.push(json!({
                "role": message.role,
                "content": self.resolve_content(&message.content).await?,
            }));
        }

        let api_response = self.send(&model, resolved).await?;
        let parts: Vec<AiContentPart> = api_response
            .content
            .into_iter()
            .filter(|block| block.block_type == "text")
            .filter_map(|block| block.text)
            .map(|text| AiContentPart { text })
            .collect();

        // An answer with no text blocks is unusable, not an error.
        if parts.is_empty() {
            return Ok(None);
        }

        debug!("model call succeeded ({} text blocks)", parts.len());
        Ok(Some(AiResponse {
            message: AiMessage { content: AiContent::Parts(parts) },
        }))
    }

    async fn img2txt(&self, image: Bytes) -> Result<String> {
        let content = vec![
            json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": "image/png",
                    "data": BASE64.encode(&image),
                }
            }),
            json!({ "type": "text", "text": "Transcribe all text in this image. Return the text only." }),
        ];

        let api_response = self
            .send(MODEL, vec![json!({ "role": "user", "content": content })])
            .await?;
        api_response
            .content
            .into_iter()
            .find(|block| block.block_type == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| anyhow!("model returned no text"))
    }
}
