//! On-device inference for Mochi.
//!
//! A placeholder-scale, character-level transformer whose weights are stored
//! as int8 with per-block float scales. It exists to show the memory
//! envelope of running a model on the device itself; it does not produce
//! good language.
//!
//! ```ignore
//! use mochi_tiny_llm::{EngineConfig, TinyLlm};
//!
//! let mut engine = TinyLlm::new(EngineConfig::default());
//! engine.init()?;
//! engine.load_model_from_path(&mochi_tiny_llm::paths::default_model_path().unwrap())?;
//! let reply = engine.generate("User: hi\nAssistant: ", 50)?;
//! ```

mod engine;
mod error;
pub mod format;
pub mod paths;
pub mod quant;
pub mod sampling;
pub mod tokenizer;

pub use engine::{EngineConfig, EngineState, TinyLlm, EOS_TOKENS};
pub use error::EngineError;
pub use format::{ModelConfig, ModelWeights};
pub use tokenizer::TokenId;

/// Default model filename.
pub const DEFAULT_MODEL_FILENAME: &str = "tiny-llm.bin";

/// Default number of tokens generated per reply.
pub const DEFAULT_MAX_TOKENS: usize = 50;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.8;

/// Default memory pool (the device's 8 MB PSRAM).
pub const DEFAULT_MEMORY_BUDGET: usize = 8 * 1024 * 1024;
