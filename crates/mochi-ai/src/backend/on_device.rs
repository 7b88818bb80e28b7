//! On-device backend wrapping the quantized engine.
//!
//! Decoding is CPU-bound, so each request runs on the blocking pool while
//! the async side stays free to observe the deadline and cancellation.

use std::path::Path;
use std::sync::{Arc, Mutex};

use mochi_tiny_llm::{EngineConfig, EngineError, TinyLlm};
use tracing::{info, warn};

use super::ChatRequest;
use crate::cancel::CancelToken;
use crate::error::ErrorKind;

pub struct OnDeviceBackend {
    engine: Arc<Mutex<TinyLlm>>,
    max_tokens: usize,
}

impl OnDeviceBackend {
    /// Wrap an engine that already has a model loaded.
    pub fn new(engine: TinyLlm, max_tokens: usize) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            max_tokens,
        }
    }

    /// Allocate an engine and load the model at `path`.
    pub fn load(
        config: EngineConfig,
        path: &Path,
        max_tokens: usize,
    ) -> Result<Self, EngineError> {
        let mut engine = TinyLlm::new(config);
        engine.init()?;
        engine.load_model_from_path(path)?;
        info!(
            "On-device model ready ({} KB in use)",
            engine.memory_usage() / 1024
        );
        Ok(Self::new(engine, max_tokens))
    }

    /// Whether the wrapped engine can generate. False while a request
    /// holds the engine or after a generation thread panicked.
    pub fn is_model_loaded(&self) -> bool {
        self.engine
            .try_lock()
            .map(|engine| engine.is_model_loaded())
            .unwrap_or(false)
    }

    /// Generate from the flat prompt on the blocking pool, checking
    /// `cancel` between tokens.
    ///
    /// Dropping the returned future leaves the worker running until it
    /// next sees the cancel flag.
    pub async fn send(
        &self,
        request: &ChatRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<String, ErrorKind> {
        let prompt = request.prompt();
        let engine = Arc::clone(&self.engine);
        let token = cancel.clone();
        let max_tokens = self.max_tokens;

        let worker = tokio::task::spawn_blocking(move || {
            let mut engine = engine.lock().map_err(|_| {
                warn!("On-device engine poisoned by an earlier panic");
                ErrorKind::ModelNotLoaded
            })?;
            engine
                .generate_with_cancel(&prompt, max_tokens, token.flag())
                .map_err(|e| {
                    warn!("On-device generation failed: {}", e);
                    ErrorKind::from(e)
                })
        });

        let reply = match worker.await {
            Ok(result) => result?,
            Err(e) => {
                warn!("On-device generation thread failed: {}", e);
                return Err(ErrorKind::ModelNotLoaded);
            }
        };

        if reply.is_empty() {
            return Err(ErrorKind::EmptyResponse);
        }
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::History;
    use mochi_tiny_llm::{ModelConfig, ModelWeights};

    fn tiny() -> ModelConfig {
        ModelConfig {
            vocab_size: 128,
            embed_dim: 8,
            hidden_dim: 16,
            num_layers: 1,
            max_seq_len: 32,
        }
    }

    fn engine_config() -> EngineConfig {
        EngineConfig {
            model: tiny(),
            memory_budget: 1024 * 1024,
            temperature: 0.8,
            seed: Some(11),
        }
    }

    fn write_model(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("tiny.bin");
        let weights = ModelWeights::random(tiny(), 5).unwrap();
        let mut file = std::fs::File::create(&path).unwrap();
        weights.write_to(&mut file).unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_and_generate() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(&dir);
        let backend = OnDeviceBackend::load(engine_config(), &path, 8).unwrap();
        assert!(backend.is_model_loaded());

        let history = History::new(3);
        let request = ChatRequest::new("P", &history, "hi");
        match backend.send(&request, &CancelToken::new()).await {
            Ok(reply) => assert!(reply.chars().count() <= 8),
            Err(kind) => assert_eq!(kind, ErrorKind::EmptyResponse),
        }
        // The engine is handed back once the worker finishes.
        assert!(backend.is_model_loaded());
    }

    #[test]
    fn test_missing_model_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnDeviceBackend::load(engine_config(), &dir.path().join("absent.bin"), 8);
        assert!(matches!(result, Err(EngineError::Io(_))));
    }

    #[tokio::test]
    async fn test_unloaded_engine_reports_model_not_loaded() {
        let mut engine = TinyLlm::new(engine_config());
        engine.init().unwrap();
        let backend = OnDeviceBackend::new(engine, 8);
        assert!(!backend.is_model_loaded());

        let history = History::new(3);
        let request = ChatRequest::new("P", &history, "hi");
        assert_eq!(
            backend.send(&request, &CancelToken::new()).await,
            Err(ErrorKind::ModelNotLoaded)
        );
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_generation() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_model(&dir);
        let backend = OnDeviceBackend::load(engine_config(), &path, 8).unwrap();

        let token = CancelToken::new();
        token.cancel();
        let history = History::new(3);
        assert_eq!(
            backend.send(&ChatRequest::new("P", &history, "hi"), &token).await,
            Err(ErrorKind::Cancelled)
        );
    }
}
