//! Conversation manager: persona, bounded history and prompt assembly.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::backend::ChatRequest;
use crate::cancel::CancelToken;
use crate::config::{AgentConfig, BackendMode};
use crate::dispatcher::BackendDispatcher;
use crate::error::ErrorKind;
use crate::history::{ConversationTurn, History};
use crate::transport::{ConnectivityProbe, HttpTransport, ReqwestTransport, StaticProbe, TcpProbe};

/// Assemble the flat text prompt.
///
/// ```text
/// <persona>
///
/// User: <oldest user>
/// Assistant: <oldest reply>
/// ...
/// User: <message>
/// Assistant:
/// ```
pub fn build_prompt(persona: &str, history: &History, message: &str) -> String {
    let mut prompt = String::with_capacity(persona.len() + message.len() + 64);
    prompt.push_str(persona);
    prompt.push_str("\n\n");
    for turn in history.iter() {
        prompt.push_str("User: ");
        prompt.push_str(turn.user());
        prompt.push('\n');
        prompt.push_str("Assistant: ");
        prompt.push_str(turn.assistant());
        prompt.push('\n');
    }
    prompt.push_str("User: ");
    prompt.push_str(message);
    prompt.push_str("\nAssistant: ");
    prompt
}

/// Owns the conversation state and the dispatcher.
pub struct ConversationManager {
    persona: String,
    history: History,
    dispatcher: BackendDispatcher,
}

impl ConversationManager {
    pub fn new(
        persona: impl Into<String>,
        history_capacity: usize,
        dispatcher: BackendDispatcher,
    ) -> Self {
        Self {
            persona: persona.into(),
            history: History::new(history_capacity),
            dispatcher,
        }
    }

    /// Build a manager talking to real endpoints.
    pub fn from_config(config: &AgentConfig) -> Self {
        let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new());
        let probe = probe_for(config);
        Self::with_collaborators(config, transport, probe)
    }

    /// Build a manager over the given networking collaborators.
    pub fn with_collaborators(
        config: &AgentConfig,
        transport: Arc<dyn HttpTransport>,
        probe: Arc<dyn ConnectivityProbe>,
    ) -> Self {
        let dispatcher = BackendDispatcher::from_config(config, transport, probe);
        Self::new(config.persona.clone(), config.history_capacity, dispatcher)
    }

    pub async fn chat(&mut self, message: &str) -> Result<String, ErrorKind> {
        self.chat_with_cancel(message, &CancelToken::new()).await
    }

    /// Send `message` and record the turn if the reply is non-empty.
    ///
    /// History is left untouched on failure or cancellation.
    pub async fn chat_with_cancel(
        &mut self,
        message: &str,
        cancel: &CancelToken,
    ) -> Result<String, ErrorKind> {
        debug!("User: {}", message);
        let start = Instant::now();

        let request = ChatRequest::new(&self.persona, &self.history, message);
        let result = self.dispatcher.dispatch_with_cancel(&request, cancel).await;
        let elapsed = start.elapsed().as_millis();

        match &result {
            Ok(reply) => {
                info!("Reply in {}ms via {}", elapsed, self.dispatcher.mode());
                debug!("Assistant: {}", reply);
                if !reply.is_empty() {
                    self.history
                        .push(ConversationTurn::new(message, reply.as_str()));
                }
            }
            Err(kind) => warn!("Chat failed after {}ms: {}", elapsed, kind),
        }
        result
    }

    /// Like [`ConversationManager::chat`], replacing errors with their
    /// fallback line.
    pub async fn chat_or_fallback(&mut self, message: &str) -> String {
        match self.chat(message).await {
            Ok(reply) => reply,
            Err(kind) => kind.fallback_text().to_string(),
        }
    }

    /// The prompt `message` would be sent with right now.
    pub fn build_prompt(&self, message: &str) -> String {
        build_prompt(&self.persona, &self.history, message)
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn persona(&self) -> &str {
        &self.persona
    }

    pub fn set_persona(&mut self, persona: impl Into<String>) {
        self.persona = persona.into();
    }

    pub fn mode(&self) -> BackendMode {
        self.dispatcher.mode()
    }
}

fn probe_for(config: &AgentConfig) -> Arc<dyn ConnectivityProbe> {
    if !config.mode.requires_network() {
        return Arc::new(StaticProbe(true));
    }
    let endpoint = config.backend_config().endpoint;
    match TcpProbe::for_endpoint(&endpoint) {
        Some(probe) => Arc::new(probe),
        None => {
            warn!("Cannot probe endpoint '{}'; assuming online", endpoint);
            Arc::new(StaticProbe(true))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Backend, RuleBasedResponder};
    use crate::error::TransportError;
    use crate::testing::MockTransport;
    use std::time::Duration;

    fn local_server(body: &str) -> (ConversationManager, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::ok(body));
        let config = AgentConfig::builder()
            .mode(BackendMode::LocalServer)
            .persona("P")
            .history_capacity(3)
            .build();
        let manager = ConversationManager::with_collaborators(
            &config,
            transport.clone(),
            Arc::new(StaticProbe(true)),
        );
        (manager, transport)
    }

    fn rules_only(capacity: usize) -> ConversationManager {
        let responder = RuleBasedResponder::builder()
            .acknowledgements(["ok"])
            .build();
        let dispatcher = BackendDispatcher::new(
            Some(Backend::RuleBased(responder)),
            Arc::new(StaticProbe(false)),
            None,
        );
        ConversationManager::new("P", capacity, dispatcher)
    }

    #[test]
    fn test_build_prompt_fixture() {
        let mut history = History::new(5);
        history.push(ConversationTurn::new("u1", "a1"));
        history.push(ConversationTurn::new("u2", "a2"));
        assert_eq!(
            build_prompt("P", &history, "u3"),
            "P\n\nUser: u1\nAssistant: a1\nUser: u2\nAssistant: a2\nUser: u3\nAssistant: "
        );
    }

    #[test]
    fn test_build_prompt_without_history() {
        assert_eq!(
            build_prompt("P", &History::new(5), "hi"),
            "P\n\nUser: hi\nAssistant: "
        );
    }

    #[tokio::test]
    async fn test_history_keeps_last_k_turns() {
        let mut manager = rules_only(3);
        for i in 0..7 {
            manager.chat(&format!("m{i}")).await.unwrap();
            assert!(manager.history().len() <= 3);
        }
        let users: Vec<&str> = manager.history().iter().map(|t| t.user()).collect();
        assert_eq!(users, vec!["m4", "m5", "m6"]);
        assert!(manager.history().iter().all(|t| t.assistant() == "ok"));
    }

    #[tokio::test]
    async fn test_successive_prompts_include_history() {
        let (mut manager, transport) = local_server(r#"{"response": "a1"}"#);
        manager.chat("u1").await.unwrap();
        manager.chat("u2").await.unwrap();

        let sent = transport.last_request();
        assert_eq!(
            sent.body["prompt"],
            "P\n\nUser: u1\nAssistant: a1\nUser: u2\nAssistant: "
        );
    }

    #[tokio::test]
    async fn test_empty_reply_not_recorded() {
        let (mut manager, _) = local_server(r#"{"response": ""}"#);
        assert_eq!(manager.chat("hello").await, Ok(String::new()));
        assert!(manager.history().is_empty());
    }

    #[tokio::test]
    async fn test_failure_not_recorded() {
        let (mut manager, _) = local_server(r#"{"unexpected": true}"#);
        assert_eq!(manager.chat("hello").await, Err(ErrorKind::Parse));
        assert!(manager.history().is_empty());
        assert_eq!(
            manager.chat_or_fallback("hello").await,
            ErrorKind::Parse.fallback_text()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_chat_leaves_history_alone() {
        let transport = Arc::new(
            MockTransport::ok(r#"{"response": "late"}"#).with_delay(Duration::from_secs(5)),
        );
        let config = AgentConfig::builder().mode(BackendMode::LocalServer).build();
        let mut manager = ConversationManager::with_collaborators(
            &config,
            transport,
            Arc::new(StaticProbe(true)),
        );

        let token = CancelToken::new();
        token.cancel();
        assert_eq!(
            manager.chat_with_cancel("hi", &token).await,
            Err(ErrorKind::Cancelled)
        );
        assert!(manager.history().is_empty());
    }

    #[tokio::test]
    async fn test_clear_history_keeps_persona() {
        let mut manager = rules_only(3);
        manager.chat("a").await.unwrap();
        manager.set_persona("Q");
        manager.clear_history();
        assert!(manager.history().is_empty());
        assert_eq!(manager.persona(), "Q");
        assert_eq!(manager.build_prompt("x"), "Q\n\nUser: x\nAssistant: ");
        assert_eq!(manager.mode(), BackendMode::RuleBased);
    }

    #[tokio::test]
    async fn test_transport_failures_leave_history_alone() {
        let config = AgentConfig::builder()
            .mode(BackendMode::LocalServer)
            .persona("P")
            .build();
        let failures = [
            (TransportError::Connect("refused".into()), ErrorKind::Transport(None)),
            (TransportError::Timeout, ErrorKind::Timeout),
        ];
        for (failure, expected) in failures {
            let mut manager = ConversationManager::with_collaborators(
                &config,
                Arc::new(MockTransport::failing(failure)),
                Arc::new(StaticProbe(true)),
            );
            assert_eq!(manager.chat("hello").await, Err(expected));
            assert!(manager.history().is_empty());
            assert_eq!(manager.chat_or_fallback("hello").await, expected.fallback_text());
            assert!(manager.history().is_empty());
        }
    }
}
