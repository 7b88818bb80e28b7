//! The on-device inference engine.
//!
//! Lifecycle: `Uninitialized → Allocated → ModelLoaded`. [`TinyLlm::init`]
//! reserves every buffer up front against a fixed memory pool, and
//! [`TinyLlm::load_model`] fills the reserved weight storage in place.
//!
//! Each decode step runs only the most recent token through the network:
//!
//! ```text
//! embed(token) → [ tanh(A·h) → relu(F·a + b) ] × layers → h·O → sample
//! ```
//!
//! The "attention" block is a dense global mixing step, not scaled
//! dot-product attention, and there is no KV cache.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::format::{try_zeroed, ModelConfig, ModelWeights};
use crate::tokenizer::{self, TokenId};
use crate::{quant, sampling, DEFAULT_MAX_TOKENS, DEFAULT_MEMORY_BUDGET, DEFAULT_TEMPERATURE};

/// Token ids that end generation.
pub const EOS_TOKENS: [TokenId; 2] = [0, 1];

/// Engine lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Allocated,
    ModelLoaded,
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Network dimensions the storage is allocated for.
    pub model: ModelConfig,
    /// Size of the memory pool weights and buffers must fit in.
    pub memory_budget: usize,
    /// Sampling temperature.
    pub temperature: f32,
    /// Fixed RNG seed; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            memory_budget: DEFAULT_MEMORY_BUDGET,
            temperature: DEFAULT_TEMPERATURE,
            seed: None,
        }
    }
}

/// Scratch space reused by every `generate()` call.
#[derive(Debug)]
struct InferenceBuffers {
    hidden: Vec<f32>,
    attention_out: Vec<f32>,
    tokens: Vec<TokenId>,
    logits: Vec<f32>,
}

impl InferenceBuffers {
    fn allocate(config: &ModelConfig) -> Result<Self, EngineError> {
        let mut tokens = Vec::new();
        tokens
            .try_reserve_exact(config.max_seq_len)
            .map_err(|_| EngineError::AllocationFailed(config.max_seq_len * 4))?;
        Ok(Self {
            hidden: try_zeroed(config.hidden_dim)?,
            attention_out: try_zeroed(config.hidden_dim)?,
            tokens,
            logits: try_zeroed(config.vocab_size)?,
        })
    }

    fn clear(&mut self) {
        self.hidden.fill(0.0);
        self.attention_out.fill(0.0);
        self.tokens.clear();
        self.logits.fill(0.0);
    }
}

/// Quantized character-level transformer.
pub struct TinyLlm {
    config: EngineConfig,
    weights: Option<ModelWeights>,
    buffers: Option<InferenceBuffers>,
    loaded: bool,
    rng: StdRng,
}

impl TinyLlm {
    /// Create an engine. Nothing is allocated until [`TinyLlm::init`].
    pub fn new(config: EngineConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            weights: None,
            buffers: None,
            loaded: false,
            rng,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        match (&self.weights, self.loaded) {
            (None, _) => EngineState::Uninitialized,
            (Some(_), false) => EngineState::Allocated,
            (Some(_), true) => EngineState::ModelLoaded,
        }
    }

    /// Whether `generate()` can run.
    pub fn is_model_loaded(&self) -> bool {
        self.state() == EngineState::ModelLoaded
    }

    /// Engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Bytes `init()` will reserve, vocabulary strings included.
    pub fn required_bytes(&self) -> usize {
        let model = &self.config.model;
        model.weight_bytes() + model.vocab_bytes() + model.buffer_bytes()
    }

    /// Reserve weight storage and inference buffers.
    ///
    /// Fails with [`EngineError::OutOfMemory`] when the reservation exceeds
    /// the memory pool; the engine stays uninitialized in that case.
    pub fn init(&mut self) -> Result<(), EngineError> {
        let model = self.config.model;
        model.validate()?;

        let requested = self.required_bytes();
        if requested > self.config.memory_budget {
            return Err(EngineError::OutOfMemory {
                requested,
                budget: self.config.memory_budget,
            });
        }

        let weights = ModelWeights::allocate(model)?;
        let buffers = InferenceBuffers::allocate(&model)?;
        self.weights = Some(weights);
        self.buffers = Some(buffers);
        self.loaded = false;

        info!(
            "TinyLlm allocated ~{} KB of {} KB pool",
            requested / 1024,
            self.config.memory_budget / 1024
        );
        Ok(())
    }

    /// Populate the weights from a model stream.
    pub fn load_model<R: Read>(&mut self, mut reader: R) -> Result<(), EngineError> {
        let weights = self.weights.as_mut().ok_or(EngineError::NotInitialized)?;

        self.loaded = false;
        let start = Instant::now();
        weights.read_into(&mut reader)?;
        self.loaded = true;

        info!(
            "Model loaded in {}ms ({} vocab entries)",
            start.elapsed().as_millis(),
            weights.vocab().len()
        );
        Ok(())
    }

    /// Populate the weights from a model file.
    pub fn load_model_from_path(&mut self, path: &Path) -> Result<(), EngineError> {
        info!("Loading model from {:?}", path);
        let file = File::open(path)?;
        self.load_model(BufReader::new(file))
    }

    /// Generate up to `max_tokens` tokens continuing `prompt`.
    ///
    /// Returns an empty string when nothing was produced.
    pub fn generate(&mut self, prompt: &str, max_tokens: usize) -> Result<String, EngineError> {
        self.generate_with_cancel(prompt, max_tokens, &AtomicBool::new(false))
    }

    /// Like [`TinyLlm::generate`], checking `cancel` between tokens.
    pub fn generate_with_cancel(
        &mut self,
        prompt: &str,
        max_tokens: usize,
        cancel: &AtomicBool,
    ) -> Result<String, EngineError> {
        if !self.loaded {
            return Err(EngineError::ModelNotLoaded);
        }
        let (Some(weights), Some(buffers)) = (self.weights.as_ref(), self.buffers.as_mut()) else {
            return Err(EngineError::ModelNotLoaded);
        };
        let model = weights.config;

        buffers.clear();

        // Leave room in the sequence for the tokens we are about to produce.
        let window = model.max_seq_len.saturating_sub(max_tokens).max(1);
        buffers
            .tokens
            .extend(tokenizer::encode(prompt, model.vocab_size, window));
        if buffers.tokens.is_empty() {
            return Ok(String::new());
        }

        let start = Instant::now();
        let mut produced = Vec::with_capacity(max_tokens.min(model.max_seq_len));

        for _ in 0..max_tokens {
            if cancel.load(Ordering::Relaxed) {
                return Err(EngineError::Cancelled);
            }

            let current = buffers.tokens[buffers.tokens.len() - 1];
            forward(weights, buffers, current);

            let next =
                sampling::sample(&mut buffers.logits, self.config.temperature, &mut self.rng)
                    as TokenId;
            if EOS_TOKENS.contains(&next) {
                break;
            }

            produced.push(next);
            buffers.tokens.push(next);
            if buffers.tokens.len() >= model.max_seq_len {
                break;
            }
        }

        debug!(
            "Generated {} tokens in {}ms",
            produced.len(),
            start.elapsed().as_millis()
        );

        Ok(tokenizer::decode(weights.vocab(), &produced))
    }

    /// Generate a reply to `message`, optionally preceded by `context`.
    pub fn chat(&mut self, message: &str, context: &str) -> Result<String, EngineError> {
        let mut prompt = context.to_string();
        if !prompt.is_empty() {
            prompt.push('\n');
        }
        prompt.push_str("User: ");
        prompt.push_str(message);
        prompt.push_str("\nAssistant: ");
        self.generate(&prompt, DEFAULT_MAX_TOKENS)
    }

    /// Bytes currently held by weights and buffers.
    pub fn memory_usage(&self) -> usize {
        match &self.weights {
            Some(weights) => weights.byte_size() + self.config.model.buffer_bytes(),
            None => 0,
        }
    }

    /// Drop all storage and return to `Uninitialized`.
    pub fn release(&mut self) {
        self.weights = None;
        self.buffers = None;
        self.loaded = false;
    }
}

/// Run one token through the network, leaving vocabulary logits in
/// `buffers.logits`.
fn forward(weights: &ModelWeights, buffers: &mut InferenceBuffers, token: TokenId) {
    let model = weights.config;
    let InferenceBuffers {
        hidden,
        attention_out,
        logits,
        ..
    } = buffers;

    let row = if (token as usize) < model.vocab_size {
        token as usize
    } else {
        0
    };
    hidden.fill(0.0);
    quant::dequantize_into(
        weights.embedding_row(row),
        weights.embedding_scale(),
        &mut hidden[..model.embed_dim],
    );

    for layer in 0..model.num_layers {
        quant::matvec(
            weights.attention_block(layer),
            weights.attention_scale(layer),
            hidden,
            attention_out,
        );
        for a in attention_out.iter_mut() {
            *a = a.tanh();
        }

        quant::matvec(
            weights.ffn_block(layer),
            weights.ffn_scale(layer),
            attention_out,
            hidden,
        );
        for (h, b) in hidden.iter_mut().zip(weights.ffn_bias(layer)) {
            *h = (*h + b).max(0.0);
        }
    }

    quant::vecmat(hidden, weights.output_block(), weights.output_scale(), logits);
}
