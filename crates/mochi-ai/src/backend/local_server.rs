//! Self-hosted generation server (Ollama-style `/api/generate`).

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{post, ChatRequest};
use crate::config::BackendConfig;
use crate::error::ErrorKind;
use crate::transport::HttpTransport;

/// Client for a single non-streaming generation endpoint.
pub struct LocalServerBackend {
    config: BackendConfig,
    transport: Arc<dyn HttpTransport>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: Option<String>,
    error: Option<String>,
}

impl LocalServerBackend {
    pub fn new(config: BackendConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    pub async fn send(&self, request: &ChatRequest<'_>) -> Result<String, ErrorKind> {
        let prompt = request.prompt();
        let body = serde_json::to_string(&GenerateRequest {
            model: &self.config.model_name,
            prompt: &prompt,
            stream: false,
        })?;

        let text = post(
            self.transport.as_ref(),
            &self.config,
            &self.config.endpoint,
            &[],
            body,
        )
        .await?;
        parse_response(&text)
    }
}

/// Read the top-level `response` field.
pub(crate) fn parse_response(body: &str) -> Result<String, ErrorKind> {
    let response: GenerateResponse = serde_json::from_str(body)?;
    if let Some(error) = response.error {
        warn!("Local server reported: {}", error);
    }
    response.response.ok_or(ErrorKind::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentConfig, BackendMode, LOCAL_SERVER_TIMEOUT};
    use crate::history::{ConversationTurn, History};
    use crate::testing::MockTransport;

    const SAMPLE: &str = r#"{
        "model": "tinyllama",
        "created_at": "2024-01-01T00:00:00Z",
        "response": "Hello from the server",
        "done": true
    }"#;

    #[test]
    fn test_parse_sample() {
        assert_eq!(parse_response(SAMPLE).unwrap(), "Hello from the server");
    }

    #[test]
    fn test_parse_missing_key() {
        assert_eq!(
            parse_response(r#"{"error": "model 'x' not found"}"#),
            Err(ErrorKind::Parse)
        );
        assert_eq!(parse_response(r#"{"done": true}"#), Err(ErrorKind::Parse));
        assert_eq!(parse_response("not json"), Err(ErrorKind::Parse));
    }

    #[tokio::test]
    async fn test_request_carries_flat_prompt() {
        let transport = Arc::new(MockTransport::ok(SAMPLE));
        let config = AgentConfig::builder()
            .mode(BackendMode::LocalServer)
            .build()
            .backend_config();
        let backend = LocalServerBackend::new(config, transport.clone());

        let mut history = History::new(5);
        history.push(ConversationTurn::new("u1", "a1"));
        backend
            .send(&ChatRequest::new("P", &history, "u2"))
            .await
            .unwrap();

        let sent = transport.last_request();
        assert_eq!(sent.url, crate::config::LOCAL_SERVER_ENDPOINT);
        assert_eq!(sent.body["model"], "tinyllama");
        assert_eq!(sent.body["stream"], false);
        assert_eq!(
            sent.body["prompt"],
            "P\n\nUser: u1\nAssistant: a1\nUser: u2\nAssistant: "
        );
        assert_eq!(sent.timeout, Some(LOCAL_SERVER_TIMEOUT));
    }
}
