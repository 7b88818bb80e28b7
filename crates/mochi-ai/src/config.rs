//! Agent configuration.
//!
//! Everything here is read once at startup and never reloaded.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use mochi_tiny_llm::{EngineConfig, ModelConfig, DEFAULT_MAX_TOKENS, DEFAULT_MEMORY_BUDGET};

use crate::persona;

/// Default conversation history capacity (turns).
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

/// Timeout for hosted-API backends.
pub const REMOTE_TIMEOUT: Duration = Duration::from_secs(15);

/// Timeout for the self-hosted generation server.
pub const LOCAL_SERVER_TIMEOUT: Duration = Duration::from_secs(30);

/// Output token cap sent to remote backends.
pub const DEFAULT_REMOTE_MAX_TOKENS: u32 = 150;

/// Default sampling temperature for every backend.
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

pub const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const OPENAI_MODEL: &str = "gpt-3.5-turbo";
pub const CLAUDE_ENDPOINT: &str = "https://api.anthropic.com/v1/messages";
pub const CLAUDE_MODEL: &str = "claude-3-haiku-20240307";
/// Gemini models collection. The model name and `:generateContent` are
/// appended unless the configured endpoint already ends in
/// `:generateContent`, in which case it is used as-is.
pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const GEMINI_MODEL: &str = "gemini-pro";
pub const LOCAL_SERVER_ENDPOINT: &str = "http://localhost:11434/api/generate";
pub const LOCAL_SERVER_MODEL: &str = "tinyllama";

/// Which backend answers chat requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendMode {
    None,
    RemoteOpenAI,
    RemoteClaude,
    RemoteGemini,
    LocalServer,
    OnDevice,
    #[default]
    RuleBased,
}

impl BackendMode {
    /// Whether requests in this mode go over the network.
    pub fn requires_network(&self) -> bool {
        matches!(
            self,
            BackendMode::RemoteOpenAI
                | BackendMode::RemoteClaude
                | BackendMode::RemoteGemini
                | BackendMode::LocalServer
        )
    }

    /// Per-request deadline. On-device and rule-based modes never block on
    /// I/O and have none.
    pub fn default_timeout(&self) -> Option<Duration> {
        match self {
            BackendMode::RemoteOpenAI | BackendMode::RemoteClaude | BackendMode::RemoteGemini => {
                Some(REMOTE_TIMEOUT)
            }
            BackendMode::LocalServer => Some(LOCAL_SERVER_TIMEOUT),
            BackendMode::None | BackendMode::OnDevice | BackendMode::RuleBased => None,
        }
    }

    /// Endpoint used when none is configured.
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            BackendMode::RemoteOpenAI => OPENAI_ENDPOINT,
            BackendMode::RemoteClaude => CLAUDE_ENDPOINT,
            BackendMode::RemoteGemini => GEMINI_ENDPOINT,
            BackendMode::LocalServer => LOCAL_SERVER_ENDPOINT,
            _ => "",
        }
    }

    /// Model name used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            BackendMode::RemoteOpenAI => OPENAI_MODEL,
            BackendMode::RemoteClaude => CLAUDE_MODEL,
            BackendMode::RemoteGemini => GEMINI_MODEL,
            BackendMode::LocalServer => LOCAL_SERVER_MODEL,
            _ => "",
        }
    }

    /// Provider-specific environment variable holding the API key.
    fn api_key_var(&self) -> Option<&'static str> {
        match self {
            BackendMode::RemoteOpenAI => Some("OPENAI_API_KEY"),
            BackendMode::RemoteClaude => Some("ANTHROPIC_API_KEY"),
            BackendMode::RemoteGemini => Some("GEMINI_API_KEY"),
            _ => None,
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendMode::None => "none",
            BackendMode::RemoteOpenAI => "openai",
            BackendMode::RemoteClaude => "claude",
            BackendMode::RemoteGemini => "gemini",
            BackendMode::LocalServer => "local",
            BackendMode::OnDevice => "on-device",
            BackendMode::RuleBased => "rule-based",
        };
        f.write_str(name)
    }
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(BackendMode::None),
            "openai" => Ok(BackendMode::RemoteOpenAI),
            "claude" | "anthropic" => Ok(BackendMode::RemoteClaude),
            "gemini" => Ok(BackendMode::RemoteGemini),
            "local" | "local-server" | "ollama" => Ok(BackendMode::LocalServer),
            "on-device" | "tiny" => Ok(BackendMode::OnDevice),
            "rule-based" | "rules" => Ok(BackendMode::RuleBased),
            other => Err(format!("unknown backend mode '{other}'")),
        }
    }
}

/// Settings for the single active backend.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub mode: BackendMode,
    pub endpoint: String,
    pub api_key: String,
    pub model_name: String,
    /// Per-request deadline; `None` for modes that never block on I/O.
    pub timeout: Option<Duration>,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Configuration for the whole conversation agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub mode: BackendMode,
    /// API key; empty means unset.
    pub api_key: String,
    /// Endpoint override; `None` uses the mode's default.
    pub endpoint: Option<String>,
    /// Model override; `None` uses the mode's default.
    pub model_name: Option<String>,
    pub persona: String,
    pub history_capacity: usize,
    /// Timeout override in milliseconds.
    pub timeout_ms: Option<u64>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Model file for the on-device backend.
    pub model_path: Option<PathBuf>,
    /// Memory pool available to the on-device engine.
    pub memory_budget: usize,
    /// Tokens generated per on-device reply.
    pub on_device_max_tokens: usize,
    /// Fixed RNG seed for on-device sampling and rule fallbacks.
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::default(),
            api_key: String::new(),
            endpoint: None,
            model_name: None,
            persona: persona::KIRBY.to_string(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            timeout_ms: None,
            max_tokens: DEFAULT_REMOTE_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            model_path: mochi_tiny_llm::paths::default_model_path(),
            memory_budget: DEFAULT_MEMORY_BUDGET,
            on_device_max_tokens: DEFAULT_MAX_TOKENS,
            seed: None,
        }
    }
}

impl AgentConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let mode = lookup("MOCHI_BACKEND")
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.mode);

        let api_key = lookup("MOCHI_API_KEY")
            .or_else(|| mode.api_key_var().and_then(&lookup))
            .unwrap_or_default();

        let model_path = lookup("MOCHI_MODEL_PATH")
            .map(PathBuf::from)
            .or(defaults.model_path);

        Self {
            mode,
            api_key,
            endpoint: lookup("MOCHI_ENDPOINT"),
            model_name: lookup("MOCHI_MODEL"),
            persona: lookup("MOCHI_PERSONA")
                .map(|value| match persona::preset(&value) {
                    Some(preset) => preset.to_string(),
                    None => value,
                })
                .unwrap_or(defaults.persona),
            history_capacity: lookup("MOCHI_HISTORY")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.history_capacity),
            timeout_ms: lookup("MOCHI_TIMEOUT_MS").and_then(|v| v.parse().ok()),
            model_path,
            memory_budget: lookup("MOCHI_MEMORY_BUDGET")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.memory_budget),
            seed: lookup("MOCHI_SEED").and_then(|v| v.parse().ok()),
            ..defaults
        }
    }

    /// Check that the selected mode has what it needs.
    pub fn is_valid(&self) -> bool {
        match self.mode {
            BackendMode::RemoteOpenAI | BackendMode::RemoteClaude | BackendMode::RemoteGemini => {
                !self.api_key.is_empty()
            }
            BackendMode::OnDevice => self.model_path.is_some(),
            _ => true,
        }
    }

    /// Settings for the active backend, defaults filled in.
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            mode: self.mode,
            endpoint: self
                .endpoint
                .clone()
                .unwrap_or_else(|| self.mode.default_endpoint().to_string()),
            api_key: self.api_key.clone(),
            model_name: self
                .model_name
                .clone()
                .unwrap_or_else(|| self.mode.default_model().to_string()),
            timeout: self
                .timeout_ms
                .map(Duration::from_millis)
                .filter(|_| self.mode.requires_network())
                .or_else(|| self.mode.default_timeout()),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }

    /// Settings for the on-device engine.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            model: ModelConfig::default(),
            memory_budget: self.memory_budget,
            temperature: self.temperature,
            seed: self.seed,
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }
}

/// Builder for agent configuration.
#[derive(Debug, Default)]
pub struct AgentConfigBuilder {
    config: AgentConfig,
}

impl AgentConfigBuilder {
    pub fn mode(mut self, mode: BackendMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = Some(endpoint.into());
        self
    }

    pub fn model_name(mut self, model: impl Into<String>) -> Self {
        self.config.model_name = Some(model.into());
        self
    }

    pub fn persona(mut self, persona: impl Into<String>) -> Self {
        self.config.persona = persona.into();
        self
    }

    pub fn history_capacity(mut self, capacity: usize) -> Self {
        self.config.history_capacity = capacity;
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = Some(ms);
        self
    }

    pub fn max_tokens(mut self, tokens: u32) -> Self {
        self.config.max_tokens = tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    pub fn model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.model_path = Some(path.into());
        self
    }

    pub fn memory_budget(mut self, bytes: usize) -> Self {
        self.config.memory_budget = bytes;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn build(self) -> AgentConfig {
        self.config
    }
}
