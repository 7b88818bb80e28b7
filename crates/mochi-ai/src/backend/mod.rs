//! Chat backends.
//!
//! Each backend turns a [`ChatRequest`] into reply text. [`Backend`] is the
//! closed set of them; the dispatcher holds exactly one.

mod claude;
mod gemini;
mod local_server;
mod on_device;
mod openai;
mod rules;

use std::sync::Arc;

use tracing::warn;

pub use claude::ClaudeBackend;
pub use gemini::GeminiBackend;
pub use local_server::LocalServerBackend;
pub use on_device::OnDeviceBackend;
pub use openai::OpenAiBackend;
pub use rules::{Rule, RuleBasedResponder, RuleSetBuilder, DEFAULT_ACKNOWLEDGEMENTS};

use crate::cancel::CancelToken;
use crate::config::{BackendConfig, BackendMode};
use crate::conversation::build_prompt;
use crate::error::ErrorKind;
use crate::history::History;
use crate::transport::HttpTransport;

/// Everything a backend may use to answer one message.
#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub persona: &'a str,
    pub history: &'a History,
    pub message: &'a str,
}

impl<'a> ChatRequest<'a> {
    pub fn new(persona: &'a str, history: &'a History, message: &'a str) -> Self {
        Self {
            persona,
            history,
            message,
        }
    }

    /// The flat text prompt (persona, turns, trailing `Assistant: `).
    pub fn prompt(&self) -> String {
        build_prompt(self.persona, self.history, self.message)
    }

    /// History plus the current message as `(role, text)` pairs, oldest
    /// first, using `assistant_role` for replies.
    pub(crate) fn role_messages(
        &self,
        assistant_role: &'static str,
    ) -> Vec<(&'static str, &'a str)> {
        let mut messages = Vec::with_capacity(self.history.len() * 2 + 1);
        for turn in self.history.iter() {
            messages.push(("user", turn.user()));
            messages.push((assistant_role, turn.assistant()));
        }
        messages.push(("user", self.message));
        messages
    }
}

/// The active backend.
pub enum Backend {
    OpenAi(OpenAiBackend),
    Claude(ClaudeBackend),
    Gemini(GeminiBackend),
    LocalServer(LocalServerBackend),
    OnDevice(OnDeviceBackend),
    RuleBased(RuleBasedResponder),
}

impl Backend {
    /// Build the network-backed backend selected by `config`.
    ///
    /// Returns `None` for modes that are not network-backed.
    pub fn remote(config: BackendConfig, transport: Arc<dyn HttpTransport>) -> Option<Self> {
        match config.mode {
            BackendMode::RemoteOpenAI => {
                Some(Backend::OpenAi(OpenAiBackend::new(config, transport)))
            }
            BackendMode::RemoteClaude => {
                Some(Backend::Claude(ClaudeBackend::new(config, transport)))
            }
            BackendMode::RemoteGemini => {
                Some(Backend::Gemini(GeminiBackend::new(config, transport)))
            }
            BackendMode::LocalServer => Some(Backend::LocalServer(LocalServerBackend::new(
                config, transport,
            ))),
            _ => None,
        }
    }

    pub fn mode(&self) -> BackendMode {
        match self {
            Backend::OpenAi(_) => BackendMode::RemoteOpenAI,
            Backend::Claude(_) => BackendMode::RemoteClaude,
            Backend::Gemini(_) => BackendMode::RemoteGemini,
            Backend::LocalServer(_) => BackendMode::LocalServer,
            Backend::OnDevice(_) => BackendMode::OnDevice,
            Backend::RuleBased(_) => BackendMode::RuleBased,
        }
    }

    /// Produce a reply for `request`.
    pub async fn send(
        &mut self,
        request: &ChatRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<String, ErrorKind> {
        match self {
            Backend::OpenAi(backend) => backend.send(request).await,
            Backend::Claude(backend) => backend.send(request).await,
            Backend::Gemini(backend) => backend.send(request).await,
            Backend::LocalServer(backend) => backend.send(request).await,
            Backend::OnDevice(backend) => backend.send(request, cancel).await,
            Backend::RuleBased(responder) => Ok(responder.respond(request.message)),
        }
    }
}

/// POST `body` and return the response body of a 2xx reply.
pub(crate) async fn post(
    transport: &dyn HttpTransport,
    config: &BackendConfig,
    url: &str,
    headers: &[(String, String)],
    body: String,
) -> Result<String, ErrorKind> {
    let response = transport
        .post_json(url, headers, body, config.timeout)
        .await?;

    if !response.is_success() {
        warn!("{} backend returned HTTP {}", config.mode, response.status);
        return Err(ErrorKind::Transport(Some(response.status)));
    }
    Ok(response.body)
}
