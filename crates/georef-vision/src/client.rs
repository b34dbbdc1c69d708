use std::time::Duration;

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("no API key: set it in the vision params or ANTHROPIC_API_KEY")]
    MissingApiKey,
    #[error("vision API transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("vision API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("vision API response carried no text content")]
    EmptyResponse,
    #[error("failed to encode image payload: {0}")]
    Encode(#[from] image::ImageError),
}

/// One content block of a user message.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
    Image { source: ImageSource },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn base64_jpeg(data: String) -> Self {
        Self::Image {
            source: ImageSource {
                source_type: "base64".to_owned(),
                media_type: "image/jpeg".to_owned(),
                data,
            },
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ImageSource {
    #[serde(rename = "type")]
    pub source_type: String,
    pub media_type: String,
    pub data: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<Message>,
}

#[derive(Clone, Debug, Serialize)]
pub struct Message {
    pub role: &'static str,
    pub content: Vec<ContentBlock>,
}

impl MessagesRequest {
    /// Single-turn user request.
    pub fn user(model: String, max_tokens: u32, content: Vec<ContentBlock>) -> Self {
        Self {
            model,
            max_tokens,
            messages: vec![Message {
                role: "user",
                content,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseBlock>,
}

#[derive(Debug, Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Boundary to the model API, mockable in tests.
pub trait VisionClient {
    /// Send the request and return the concatenated text content.
    fn complete(&self, request: &MessagesRequest) -> Result<String, VisionError>;
}

/// Blocking HTTP client for the Anthropic Messages API.
///
/// Retries once on transport failure; HTTP error statuses are not retried
/// since a rejected payload will be rejected again.
pub struct AnthropicClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, VisionError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            endpoint: DEFAULT_ENDPOINT.to_owned(),
            api_key,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn send_once(&self, request: &MessagesRequest) -> Result<String, VisionError> {
        let resp = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(request)
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(VisionError::Status {
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }

        let parsed: MessagesResponse = resp.json()?;
        let text: String = parsed
            .content
            .iter()
            .filter_map(|b| b.text.as_deref())
            .collect();
        if text.is_empty() {
            return Err(VisionError::EmptyResponse);
        }
        Ok(text)
    }
}

impl VisionClient for AnthropicClient {
    fn complete(&self, request: &MessagesRequest) -> Result<String, VisionError> {
        match self.send_once(request) {
            Err(VisionError::Transport(err)) => {
                warn!("vision API transport failure, retrying once: {err}");
                self.send_once(request)
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_blocks_serialize_to_the_wire_shape() {
        let req = MessagesRequest::user(
            "model-x".to_owned(),
            64,
            vec![
                ContentBlock::text("hello"),
                ContentBlock::base64_jpeg("QUJD".to_owned()),
            ],
        );
        let v = serde_json::to_value(&req).expect("serialize");
        assert_eq!(v["model"], "model-x");
        assert_eq!(v["max_tokens"], 64);
        assert_eq!(v["messages"][0]["role"], "user");
        assert_eq!(v["messages"][0]["content"][0]["type"], "text");
        assert_eq!(v["messages"][0]["content"][1]["type"], "image");
        assert_eq!(
            v["messages"][0]["content"][1]["source"]["media_type"],
            "image/jpeg"
        );
        assert_eq!(v["messages"][0]["content"][1]["source"]["type"], "base64");
    }

    #[test]
    fn response_text_blocks_concatenate() {
        let raw = r#"{"content":[{"type":"text","text":"foo"},{"type":"text","text":"bar"}]}"#;
        let parsed: MessagesResponse = serde_json::from_str(raw).expect("parse");
        let text: String = parsed
            .content
            .iter()
            .filter_map(|b| b.text.as_deref())
            .collect();
        assert_eq!(text, "foobar");
    }
}
