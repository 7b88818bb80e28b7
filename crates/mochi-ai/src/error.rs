//! Error taxonomy for chat dispatch.
//!
//! Every backend failure is folded into an [`ErrorKind`] at the dispatcher
//! boundary. None of them is fatal; each carries a short fallback line the
//! device can say instead of a reply.

use mochi_tiny_llm::EngineError;
use thiserror::Error;

/// Why a chat request produced no reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("no backend configured")]
    Unconfigured,
    #[error("network required but unavailable")]
    Connectivity,
    #[error("request timed out")]
    Timeout,
    #[error("transport error ({})", status_label(.0))]
    Transport(Option<u16>),
    #[error("malformed or unexpected response body")]
    Parse,
    #[error("on-device model not loaded")]
    ModelNotLoaded,
    #[error("out of memory")]
    OutOfMemory,
    #[error("backend returned an empty reply")]
    EmptyResponse,
    #[error("request cancelled")]
    Cancelled,
}

fn status_label(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!("HTTP {code}"),
        None => "no response".to_string(),
    }
}

impl ErrorKind {
    /// What the device says instead of a reply.
    pub fn fallback_text(&self) -> &'static str {
        match self {
            ErrorKind::Unconfigured => "I don't have a brain hooked up yet...",
            ErrorKind::Connectivity => "I can't reach the network right now!",
            ErrorKind::Timeout => "Hmm, that took too long. Try again?",
            ErrorKind::Transport(_) => "Something went wrong talking to the server...",
            ErrorKind::Parse => "I got a reply I couldn't understand...",
            ErrorKind::ModelNotLoaded => "My model isn't loaded, sorry!",
            ErrorKind::OutOfMemory => "Sorry, I can't think right now...",
            ErrorKind::EmptyResponse => "Hmm, what should I say...",
            ErrorKind::Cancelled => "Okay, never mind!",
        }
    }
}

/// Failure reported by the HTTP collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
}

impl From<TransportError> for ErrorKind {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Timeout => ErrorKind::Timeout,
            TransportError::Connect(_) | TransportError::Request(_) => ErrorKind::Transport(None),
        }
    }
}

impl From<serde_json::Error> for ErrorKind {
    fn from(_: serde_json::Error) -> Self {
        ErrorKind::Parse
    }
}

impl From<EngineError> for ErrorKind {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::OutOfMemory { .. } | EngineError::AllocationFailed(_) => {
                ErrorKind::OutOfMemory
            }
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::NotInitialized
            | EngineError::ModelNotLoaded
            | EngineError::InvalidModel(_)
            | EngineError::Io(_) => ErrorKind::ModelNotLoaded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_display() {
        assert_eq!(
            ErrorKind::Transport(Some(503)).to_string(),
            "transport error (HTTP 503)"
        );
        assert_eq!(
            ErrorKind::Transport(None).to_string(),
            "transport error (no response)"
        );
    }

    #[test]
    fn test_engine_error_mapping() {
        let oom = EngineError::OutOfMemory {
            requested: 10,
            budget: 1,
        };
        assert_eq!(ErrorKind::from(oom), ErrorKind::OutOfMemory);
        assert_eq!(
            ErrorKind::from(EngineError::ModelNotLoaded),
            ErrorKind::ModelNotLoaded
        );
    }

    #[test]
    fn test_every_kind_has_fallback() {
        for kind in [
            ErrorKind::Unconfigured,
            ErrorKind::Connectivity,
            ErrorKind::Timeout,
            ErrorKind::Transport(Some(500)),
            ErrorKind::Parse,
            ErrorKind::ModelNotLoaded,
            ErrorKind::OutOfMemory,
            ErrorKind::EmptyResponse,
            ErrorKind::Cancelled,
        ] {
            assert!(!kind.fallback_text().is_empty());
        }
    }
}
