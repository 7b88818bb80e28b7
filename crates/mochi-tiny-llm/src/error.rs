//! Error types for on-device inference.

use thiserror::Error;

/// Errors that can occur while preparing or running the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Weight and buffer storage does not fit in the memory pool.
    #[error("out of memory: {requested} bytes requested, pool holds {budget} bytes")]
    OutOfMemory { requested: usize, budget: usize },

    /// The allocator refused a reservation of this many bytes.
    #[error("out of memory: allocation of {0} bytes failed")]
    AllocationFailed(usize),

    /// `init()` has not been called.
    #[error("engine not initialized")]
    NotInitialized,

    /// `generate()` was called before a model was loaded.
    #[error("model not loaded")]
    ModelNotLoaded,

    /// The model stream is malformed or does not match the allocated shape.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// Generation was cancelled between tokens.
    #[error("generation cancelled")]
    Cancelled,

    /// I/O error while reading a model.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
