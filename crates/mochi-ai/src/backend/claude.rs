//! Anthropic messages backend.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{post, ChatRequest};
use crate::config::BackendConfig;
use crate::error::ErrorKind;
use crate::transport::HttpTransport;

/// Protocol version sent with every request.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Key-header authenticated messages client.
pub struct ClaudeBackend {
    config: BackendConfig,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl ClaudeBackend {
    pub fn new(config: BackendConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    pub async fn send(&self, request: &ChatRequest<'_>) -> Result<String, ErrorKind> {
        let messages = request
            .role_messages("assistant")
            .into_iter()
            .map(|(role, content)| Message { role, content })
            .collect();

        let body = serde_json::to_string(&MessagesRequest {
            model: &self.config.model_name,
            max_tokens: self.config.max_tokens,
            system: request.persona,
            messages,
            temperature: self.config.temperature,
        })?;
        let headers = [
            ("x-api-key".to_string(), self.config.api_key.clone()),
            (
                "anthropic-version".to_string(),
                ANTHROPIC_VERSION.to_string(),
            ),
        ];

        let text = post(
            self.transport.as_ref(),
            &self.config,
            &self.config.endpoint,
            &headers,
            body,
        )
        .await?;
        parse_response(&text)
    }
}

/// Read `content[0].text`.
pub(crate) fn parse_response(body: &str) -> Result<String, ErrorKind> {
    let response: MessagesResponse = serde_json::from_str(body)?;
    response
        .content
        .into_iter()
        .next()
        .and_then(|block| block.text)
        .ok_or(ErrorKind::Parse)
}
