//! Google Gemini `generateContent` backend.

use std::sync::Arc;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{post, ChatRequest};
use crate::config::BackendConfig;
use crate::error::ErrorKind;
use crate::transport::HttpTransport;

const GENERATE_SUFFIX: &str = ":generateContent";

/// Gemini client; the key travels as a `key` query parameter.
pub struct GeminiBackend {
    config: BackendConfig,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    system_instruction: SystemInstruction<'a>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct SystemInstruction<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiBackend {
    pub fn new(config: BackendConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// The `generateContent` URL with the key query-encoded.
    fn url(&self) -> Result<String, ErrorKind> {
        let endpoint = self.config.endpoint.trim_end_matches('/');
        let base = if endpoint.ends_with(GENERATE_SUFFIX) {
            endpoint.to_string()
        } else {
            format!("{}/{}{}", endpoint, self.config.model_name, GENERATE_SUFFIX)
        };

        let mut url = Url::parse(&base).map_err(|e| {
            warn!("Invalid Gemini endpoint '{}': {}", base, e);
            ErrorKind::Transport(None)
        })?;
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        Ok(url.into())
    }

    pub async fn send(&self, request: &ChatRequest<'_>) -> Result<String, ErrorKind> {
        let contents = request
            .role_messages("model")
            .into_iter()
            .map(|(role, text)| Content {
                role,
                parts: [Part { text }],
            })
            .collect();

        let body = serde_json::to_string(&GenerateRequest {
            contents,
            system_instruction: SystemInstruction {
                parts: [Part {
                    text: request.persona,
                }],
            },
            generation_config: GenerationConfig {
                max_output_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        })?;

        let url = self.url()?;
        let text = post(self.transport.as_ref(), &self.config, &url, &[], body).await?;
        parse_response(&text)
    }
}

/// Read `candidates[0].content.parts[0].text`.
pub(crate) fn parse_response(body: &str) -> Result<String, ErrorKind> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content.parts.into_iter().next())
        .and_then(|part| part.text)
        .ok_or(ErrorKind::Parse)
}
