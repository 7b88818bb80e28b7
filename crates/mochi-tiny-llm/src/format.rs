//! Model dimensions, weight storage, and the on-disk model format.
//!
//! ## Binary layout (little-endian)
//!
//! ```text
//! magic        "TLLM"
//! version      u32
//! vocab_size   u32
//! embed_dim    u32
//! hidden_dim   u32
//! num_layers   u32
//! max_seq_len  u32
//! vocab        vocab_size × (u16 length, UTF-8 bytes)
//! embedding    [vocab_size × embed_dim]            i8
//! attention    [num_layers × hidden_dim × hidden_dim] i8
//! ffn          [num_layers × hidden_dim × hidden_dim] i8
//! output       [hidden_dim × vocab_size]            i8
//! scales       [2 + 2 × num_layers]                 f32
//! biases       [num_layers × hidden_dim]            f32
//! ```
//!
//! Scales are ordered `embedding, attention[0..L], ffn[0..L], output`.

use std::io::{self, Read, Write};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::EngineError;
use crate::quant;

/// File magic.
pub const MAGIC: &[u8; 4] = b"TLLM";

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

/// Longest vocabulary entry a model file may carry, in UTF-8 bytes.
pub const MAX_TOKEN_BYTES: usize = 32;

/// Model dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    pub vocab_size: usize,
    pub embed_dim: usize,
    pub hidden_dim: usize,
    pub num_layers: usize,
    pub max_seq_len: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            vocab_size: 2048,
            embed_dim: 128,
            hidden_dim: 256,
            num_layers: 2,
            max_seq_len: 128,
        }
    }
}

impl ModelConfig {
    /// Check that the dimensions describe a usable network.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.vocab_size < 3 {
            return Err(EngineError::InvalidModel(format!(
                "vocab_size {} leaves no room beside the two EOS ids",
                self.vocab_size
            )));
        }
        if self.embed_dim == 0 || self.hidden_dim == 0 || self.max_seq_len < 2 {
            return Err(EngineError::InvalidModel(
                "dimensions must be non-zero and max_seq_len at least 2".to_string(),
            ));
        }
        if self.embed_dim > self.hidden_dim {
            return Err(EngineError::InvalidModel(format!(
                "embed_dim {} exceeds hidden_dim {}",
                self.embed_dim, self.hidden_dim
            )));
        }
        if self.vocab_size > u32::MAX as usize {
            return Err(EngineError::InvalidModel("vocab_size too large".to_string()));
        }
        Ok(())
    }

    /// Number of entries in the scale table.
    pub fn scale_count(&self) -> usize {
        2 + 2 * self.num_layers
    }

    fn block_len(&self) -> usize {
        self.num_layers * self.hidden_dim * self.hidden_dim
    }

    /// Bytes held by the int8 blocks plus scales and biases.
    pub fn weight_bytes(&self) -> usize {
        let int8 = self.vocab_size * self.embed_dim
            + 2 * self.block_len()
            + self.hidden_dim * self.vocab_size;
        let floats = self.scale_count() + self.num_layers * self.hidden_dim;
        int8 + floats * std::mem::size_of::<f32>()
    }

    /// Upper bound on the bytes the vocabulary strings can occupy.
    pub fn vocab_bytes(&self) -> usize {
        self.vocab_size * MAX_TOKEN_BYTES
    }

    /// Bytes held by the per-call inference buffers.
    pub fn buffer_bytes(&self) -> usize {
        (2 * self.hidden_dim + self.vocab_size) * std::mem::size_of::<f32>()
            + self.max_seq_len * std::mem::size_of::<u32>()
    }
}

/// Quantized weight set. Populated once by [`ModelWeights::read_into`] and
/// read-only afterwards.
#[derive(Debug, Clone)]
pub struct ModelWeights {
    pub(crate) config: ModelConfig,
    pub(crate) vocab: Vec<String>,
    pub(crate) embedding: Vec<i8>,
    pub(crate) attention: Vec<i8>,
    pub(crate) ffn: Vec<i8>,
    pub(crate) output: Vec<i8>,
    pub(crate) scales: Vec<f32>,
    pub(crate) biases: Vec<f32>,
}

/// Reserve and zero-fill a vector, reporting allocation failure instead of
/// aborting.
pub(crate) fn try_zeroed<T: Clone + Default>(len: usize) -> Result<Vec<T>, EngineError> {
    let mut v = Vec::new();
    v.try_reserve_exact(len)
        .map_err(|_| EngineError::AllocationFailed(len * std::mem::size_of::<T>()))?;
    v.resize(len, T::default());
    Ok(v)
}

impl ModelWeights {
    /// Allocate zeroed storage for `config`.
    pub fn allocate(config: ModelConfig) -> Result<Self, EngineError> {
        config.validate()?;
        Ok(Self {
            config,
            vocab: Vec::new(),
            embedding: try_zeroed(config.vocab_size * config.embed_dim)?,
            attention: try_zeroed(config.block_len())?,
            ffn: try_zeroed(config.block_len())?,
            output: try_zeroed(config.hidden_dim * config.vocab_size)?,
            scales: try_zeroed(config.scale_count())?,
            biases: try_zeroed(config.num_layers * config.hidden_dim)?,
        })
    }

    /// A seeded random placeholder model.
    ///
    /// Token ids map back to the character with the same code point, so
    /// the output is printable but meaningless. Ids 0 and 1 decode to
    /// nothing (EOS).
    pub fn random(config: ModelConfig, seed: u64) -> Result<Self, EngineError> {
        let mut weights = Self::allocate(config)?;
        let mut rng = StdRng::seed_from_u64(seed);

        weights.vocab = (0..config.vocab_size)
            .map(|id| match id {
                0 | 1 => String::new(),
                _ => char::from_u32(id as u32)
                    .filter(|c| !c.is_control())
                    .map(String::from)
                    .unwrap_or_default(),
            })
            .collect();

        for block in [
            &mut weights.embedding,
            &mut weights.attention,
            &mut weights.ffn,
            &mut weights.output,
        ] {
            rng.fill(block.as_mut_slice());
        }

        // Keep activations in a sane range for tanh/ReLU.
        let embed_scale = 1.0 / quant::I8_MAX;
        let mix_scale = 1.0 / (quant::I8_MAX * (config.hidden_dim as f32).sqrt());
        weights.scales[0] = embed_scale;
        for layer in 0..config.num_layers {
            weights.scales[1 + layer] = mix_scale;
            weights.scales[1 + config.num_layers + layer] = mix_scale;
        }
        weights.scales[config.scale_count() - 1] = 4.0 * mix_scale;

        for bias in weights.biases.iter_mut() {
            *bias = rng.gen_range(-0.05..0.05);
        }

        Ok(weights)
    }

    /// Dimensions of this weight set.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Vocabulary table.
    pub fn vocab(&self) -> &[String] {
        &self.vocab
    }

    /// Embedding row for `token`.
    pub fn embedding_row(&self, token: usize) -> &[i8] {
        let dim = self.config.embed_dim;
        &self.embedding[token * dim..(token + 1) * dim]
    }

    /// Attention block for `layer`.
    pub fn attention_block(&self, layer: usize) -> &[i8] {
        let len = self.config.hidden_dim * self.config.hidden_dim;
        &self.attention[layer * len..(layer + 1) * len]
    }

    /// Feed-forward block for `layer`.
    pub fn ffn_block(&self, layer: usize) -> &[i8] {
        let len = self.config.hidden_dim * self.config.hidden_dim;
        &self.ffn[layer * len..(layer + 1) * len]
    }

    /// Feed-forward bias for `layer`.
    pub fn ffn_bias(&self, layer: usize) -> &[f32] {
        let dim = self.config.hidden_dim;
        &self.biases[layer * dim..(layer + 1) * dim]
    }

    /// Vocabulary projection, `[hidden_dim × vocab_size]`.
    pub fn output_block(&self) -> &[i8] {
        &self.output
    }

    pub fn embedding_scale(&self) -> f32 {
        self.scales[0]
    }

    pub fn attention_scale(&self, layer: usize) -> f32 {
        self.scales[1 + layer]
    }

    pub fn ffn_scale(&self, layer: usize) -> f32 {
        self.scales[1 + self.config.num_layers + layer]
    }

    pub fn output_scale(&self) -> f32 {
        self.scales[self.config.scale_count() - 1]
    }

    /// Bytes held by this weight set, vocabulary included.
    pub fn byte_size(&self) -> usize {
        self.config.weight_bytes() + self.vocab.iter().map(String::len).sum::<usize>()
    }

    /// Populate this storage from a model stream.
    ///
    /// The header must describe exactly the dimensions this storage was
    /// allocated for.
    pub fn read_into<R: Read>(&mut self, reader: &mut R) -> Result<(), EngineError> {
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(EngineError::InvalidModel("bad magic".to_string()));
        }

        let version = read_u32(reader)?;
        if version != FORMAT_VERSION {
            return Err(EngineError::InvalidModel(format!(
                "unsupported format version {version}"
            )));
        }

        let header = ModelConfig {
            vocab_size: read_u32(reader)? as usize,
            embed_dim: read_u32(reader)? as usize,
            hidden_dim: read_u32(reader)? as usize,
            num_layers: read_u32(reader)? as usize,
            max_seq_len: read_u32(reader)? as usize,
        };
        if header != self.config {
            return Err(EngineError::InvalidModel(format!(
                "model shape {:?} does not match allocated shape {:?}",
                header, self.config
            )));
        }

        let mut vocab = Vec::with_capacity(header.vocab_size);
        for id in 0..header.vocab_size {
            let len = read_u16(reader)? as usize;
            if len > MAX_TOKEN_BYTES {
                return Err(EngineError::InvalidModel(format!(
                    "vocab entry {id} is {len} bytes, limit is {MAX_TOKEN_BYTES}"
                )));
            }
            let mut bytes = vec![0u8; len];
            reader.read_exact(&mut bytes)?;
            let entry = String::from_utf8(bytes).map_err(|_| {
                EngineError::InvalidModel(format!("vocab entry {id} is not UTF-8"))
            })?;
            vocab.push(entry);
        }

        read_i8s(reader, &mut self.embedding)?;
        read_i8s(reader, &mut self.attention)?;
        read_i8s(reader, &mut self.ffn)?;
        read_i8s(reader, &mut self.output)?;
        read_f32s(reader, &mut self.scales)?;
        read_f32s(reader, &mut self.biases)?;

        if let Some(pos) = self
            .scales
            .iter()
            .position(|s| !s.is_finite() || *s == 0.0)
        {
            return Err(EngineError::InvalidModel(format!(
                "scale {pos} is zero or not finite"
            )));
        }

        self.vocab = vocab;
        Ok(())
    }

    /// Serialize in the layout described at the top of this module.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let c = &self.config;
        writer.write_all(MAGIC)?;
        for value in [
            FORMAT_VERSION,
            c.vocab_size as u32,
            c.embed_dim as u32,
            c.hidden_dim as u32,
            c.num_layers as u32,
            c.max_seq_len as u32,
        ] {
            writer.write_all(&value.to_le_bytes())?;
        }

        for id in 0..c.vocab_size {
            let entry = self.vocab.get(id).map(String::as_bytes).unwrap_or_default();
            if entry.len() > MAX_TOKEN_BYTES {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    "vocab entry too long",
                ));
            }
            let len = entry.len() as u16;
            writer.write_all(&len.to_le_bytes())?;
            writer.write_all(entry)?;
        }

        for block in [&self.embedding, &self.attention, &self.ffn, &self.output] {
            let bytes: Vec<u8> = block.iter().map(|&b| b as u8).collect();
            writer.write_all(&bytes)?;
        }
        for value in self.scales.iter().chain(&self.biases) {
            writer.write_all(&value.to_le_bytes())?;
        }
        Ok(())
    }
}

fn read_u16<R: Read>(reader: &mut R) -> io::Result<u16> {
    let mut buf = [0u8; 2];
    reader.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_u32<R: Read>(reader: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Fill `out` from the stream in fixed-size chunks, so no second
/// full-size staging buffer is needed.
fn read_i8s<R: Read>(reader: &mut R, out: &mut [i8]) -> io::Result<()> {
    let mut chunk = [0u8; 4096];
    for dst in out.chunks_mut(chunk.len()) {
        let buf = &mut chunk[..dst.len()];
        reader.read_exact(buf)?;
        for (d, &b) in dst.iter_mut().zip(buf.iter()) {
            *d = b as i8;
        }
    }
    Ok(())
}

fn read_f32s<R: Read>(reader: &mut R, out: &mut [f32]) -> io::Result<()> {
    let mut buf = [0u8; 4];
    for value in out.iter_mut() {
        reader.read_exact(&mut buf)?;
        *value = f32::from_le_bytes(buf);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> ModelConfig {
        ModelConfig {
            vocab_size: 64,
            embed_dim: 8,
            hidden_dim: 16,
            num_layers: 2,
            max_seq_len: 32,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ModelConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.scale_count(), 6);
        // About a megabyte of int8 weights at the default shape.
        assert!(config.weight_bytes() > 1_000_000);
    }

    #[test]
    fn test_rejects_embed_wider_than_hidden() {
        let config = ModelConfig {
            embed_dim: 32,
            ..tiny()
        };
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidModel(_))
        ));
    }

    #[test]
    fn test_written_model_loads_back() {
        let original = ModelWeights::random(tiny(), 7).unwrap();
        let mut bytes = Vec::new();
        original.write_to(&mut bytes).unwrap();

        let mut loaded = ModelWeights::allocate(tiny()).unwrap();
        loaded.read_into(&mut bytes.as_slice()).unwrap();

        assert_eq!(loaded.vocab, original.vocab);
        assert_eq!(loaded.attention, original.attention);
        assert_eq!(loaded.output_scale(), original.output_scale());
        assert_eq!(loaded.ffn_bias(1), original.ffn_bias(1));
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let model = ModelWeights::random(tiny(), 1).unwrap();
        let mut bytes = Vec::new();
        model.write_to(&mut bytes).unwrap();

        let mut other = ModelWeights::allocate(ModelConfig {
            num_layers: 1,
            ..tiny()
        })
        .unwrap();
        let err = other.read_into(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidModel(_)));
    }

    #[test]
    fn test_zero_scale_rejected() {
        let mut model = ModelWeights::random(tiny(), 1).unwrap();
        model.scales[2] = 0.0;
        let mut bytes = Vec::new();
        model.write_to(&mut bytes).unwrap();

        let mut target = ModelWeights::allocate(tiny()).unwrap();
        let err = target.read_into(&mut bytes.as_slice()).unwrap_err();
        assert!(err.to_string().contains("scale 2"));
    }

    #[test]
    fn test_truncated_stream_is_io_error() {
        let model = ModelWeights::random(tiny(), 1).unwrap();
        let mut bytes = Vec::new();
        model.write_to(&mut bytes).unwrap();
        bytes.truncate(bytes.len() / 2);

        let mut target = ModelWeights::allocate(tiny()).unwrap();
        let err = target.read_into(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, EngineError::Io(_)));
    }

    #[test]
    fn test_oversized_vocab_entry_rejected() {
        let model = ModelWeights::random(tiny(), 1).unwrap();
        let mut bytes = Vec::new();
        model.write_to(&mut bytes).unwrap();

        // First vocab entry sits right after the 28-byte header. Claim a
        // 64 KB string there instead of the empty EOS entry.
        let header = MAGIC.len() + 6 * 4;
        bytes[header..header + 2].copy_from_slice(&u16::MAX.to_le_bytes());

        let mut target = ModelWeights::allocate(tiny()).unwrap();
        let err = target.read_into(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidModel(_)));
        assert!(err.to_string().contains("vocab entry 0"));
    }

    #[test]
    fn test_writer_refuses_oversized_vocab_entry() {
        let mut model = ModelWeights::random(tiny(), 1).unwrap();
        model.vocab[5] = "x".repeat(MAX_TOKEN_BYTES + 1);
        let mut bytes = Vec::new();
        let err = model.write_to(&mut bytes).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
