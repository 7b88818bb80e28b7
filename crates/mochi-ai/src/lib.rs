//! # Mochi conversation agent
//!
//! Keeps a short conversation history and answers each message through one
//! of several interchangeable backends.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ ConversationManager  │ --> │ BackendDispatcher │ --> │   Backend    │
//! │ (persona + history)  │     │ (probe, deadline) │     │              │
//! └──────────────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! ## Backends
//!
//! - **OpenAI / Claude / Gemini** - hosted chat APIs
//! - **Local server** - a self-hosted Ollama-style generation endpoint
//! - **On-device** - the quantized engine from `mochi-tiny-llm`
//! - **Rule-based** - keyword table, the last resort
//!
//! Failures never escape as panics: every one becomes an [`ErrorKind`]
//! with a fallback line the device can say instead.
//!
//! ## Usage
//!
//! ```ignore
//! use mochi_ai::{AgentConfig, ConversationManager};
//!
//! let mut manager = ConversationManager::from_config(&AgentConfig::from_env());
//! let reply = manager.chat_or_fallback("こんにちは").await;
//! ```

pub mod backend;
mod cancel;
mod config;
mod conversation;
mod dispatcher;
mod error;
mod history;
pub mod persona;
mod transport;

#[cfg(test)]
mod testing;

pub use backend::{Backend, ChatRequest, Rule, RuleBasedResponder, RuleSetBuilder};
pub use cancel::CancelToken;
pub use config::{
    AgentConfig, AgentConfigBuilder, BackendConfig, BackendMode, DEFAULT_HISTORY_CAPACITY,
    LOCAL_SERVER_TIMEOUT, REMOTE_TIMEOUT,
};
pub use conversation::{build_prompt, ConversationManager};
pub use dispatcher::BackendDispatcher;
pub use error::{ErrorKind, TransportError};
pub use history::{ConversationTurn, History};
pub use transport::{
    ConnectivityProbe, HttpResponse, HttpTransport, ReqwestTransport, StaticProbe, TcpProbe,
};
