//! OpenAI chat-completions backend.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{post, ChatRequest};
use crate::config::BackendConfig;
use crate::error::ErrorKind;
use crate::transport::HttpTransport;

/// Bearer-authenticated chat-completions client.
pub struct OpenAiBackend {
    config: BackendConfig,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiBackend {
    pub fn new(config: BackendConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    pub async fn send(&self, request: &ChatRequest<'_>) -> Result<String, ErrorKind> {
        let mut messages = vec![Message {
            role: "system",
            content: request.persona,
        }];
        messages.extend(
            request
                .role_messages("assistant")
                .into_iter()
                .map(|(role, content)| Message { role, content }),
        );

        let body = serde_json::to_string(&CompletionRequest {
            model: &self.config.model_name,
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        })?;
        let headers = [(
            "Authorization".to_string(),
            format!("Bearer {}", self.config.api_key),
        )];

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

/// Read `choices[0].message.content`.
pub(crate) fn parse_response(body: &str) -> Result<String, ErrorKind> {
    let response: CompletionResponse = serde_json::from_str(body)?;
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(ErrorKind::Parse)
}
