//! Info command - show the active configuration.

use mochi_ai::{AgentConfig, BackendMode};
use mochi_tiny_llm::TinyLlm;

pub(crate) fn run(config: &AgentConfig) -> miette::Result<()> {
    println!("Mochi");
    println!("=====");
    println!();
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
    println!();

    let backend = config.backend_config();
    println!("Backend:");
    println!("  Mode:     {}", config.mode);
    if config.mode.requires_network() {
        println!("  Endpoint: {}", backend.endpoint);
        println!("  Model:    {}", backend.model_name);
        println!(
            "  API key:  {}",
            if config.api_key.is_empty() { "not set" } else { "set" }
        );
    }
    if let Some(timeout) = backend.timeout {
        println!("  Timeout:  {}ms", timeout.as_millis());
    }
    if !config.is_valid() {
        println!("  Warning:  configuration is incomplete for this mode");
    }
    println!();

    println!("Conversation:");
    println!("  History:  {} turns", config.history_capacity);
    println!("  Persona:  {} chars", config.persona.chars().count());
    println!();

    let engine = TinyLlm::new(config.engine_config());
    println!("On-device engine:");
    match &config.model_path {
        Some(path) => {
            let status = if path.exists() { "found" } else { "missing" };
            println!("  Model:    {} ({})", path.display(), status);
        }
        None => println!("  Model:    no path"),
    }
    println!(
        "  Memory:   {} KB needed, {} KB budget",
        engine.required_bytes() / 1024,
        config.memory_budget / 1024
    );
    if config.mode == BackendMode::OnDevice && engine.required_bytes() > config.memory_budget {
        println!("  Warning:  budget too small; rule-based replies will be used");
    }

    Ok(())
}
