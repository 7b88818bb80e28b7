//! Gen-model command - write a placeholder model file.

use mochi_tiny_llm::{paths, ModelConfig, ModelWeights, DEFAULT_MODEL_FILENAME};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub(crate) fn run(output: Option<&Path>, seed: u64) -> miette::Result<()> {
    let path = match output {
        Some(path) => path.to_path_buf(),
        None => default_output()?,
    };

    let config = ModelConfig::default();
    println!(
        "Generating model: vocab={} embed={} hidden={} layers={} seq={}",
        config.vocab_size,
        config.embed_dim,
        config.hidden_dim,
        config.num_layers,
        config.max_seq_len
    );

    let weights = ModelWeights::random(config, seed)
        .map_err(|e| miette::miette!("Failed to allocate weights: {}", e))?;

    let file = File::create(&path)
        .map_err(|e| miette::miette!("Failed to create {}: {}", path.display(), e))?;
    let mut writer = BufWriter::new(file);
    weights
        .write_to(&mut writer)
        .and_then(|_| writer.flush())
        .map_err(|e| miette::miette!("Failed to write model: {}", e))?;

    println!(
        "Wrote {} ({} KB of weights, seed {})",
        path.display(),
        weights.byte_size() / 1024,
        seed
    );
    Ok(())
}

fn default_output() -> miette::Result<PathBuf> {
    let dir = paths::ensure_dirs()
        .map_err(|e| miette::miette!("Failed to create data directories: {}", e))?;
    Ok(dir.join(DEFAULT_MODEL_FILENAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mochi_tiny_llm::{EngineConfig, TinyLlm};

    #[test]
    fn test_generated_model_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        run(Some(&path), 7).unwrap();

        let mut engine = TinyLlm::new(EngineConfig::default());
        engine.init().unwrap();
        engine.load_model_from_path(&path).unwrap();
        assert!(engine.is_model_loaded());
    }
}
