#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password, Select};
use std::path::Path;
use url::Url;

use super::settings::validate_index_name;
use super::{Config, EmbedderBackend, EmbedderConfig, GeneratorBackend, GeneratorConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 rag-kit Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Embedding Model").bold().yellow());
    configure_embedder(&mut config.embedder)?;

    eprintln!();
    eprintln!("{}", style("Generation Model").bold().yellow());
    configure_generator(&mut config.generator)?;

    eprintln!();
    eprintln!("{}", style("Vector Index").bold().yellow());
    let index_name: String = Input::new()
        .with_prompt("Index name")
        .default(config.index.name.clone())
        .validate_with(|input: &String| validate_index_name(input))
        .interact_text()?;
    config.index.set_name(index_name)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());
    for (label, url) in [
        ("Embedding", &config.embedder.url),
        ("Generation", &config.generator.url),
    ] {
        if test_connection(url) {
            eprintln!("{}", style(format!("✓ {} endpoint reachable", label)).green());
        } else {
            eprintln!(
                "{}",
                style(format!("⚠ Warning: could not reach {} endpoint {}", label, url)).yellow()
            );
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Embedder:").bold().yellow());
    eprintln!("  Backend: {}", style(format!("{:?}", config.embedder.backend)).cyan());
    eprintln!("  URL: {}", style(&config.embedder.url).cyan());
    eprintln!("  Model: {}", style(&config.embedder.model).cyan());
    eprintln!("  Batch Size: {}", style(config.embedder.batch_size).cyan());
    eprintln!("  Dimension: {}", style(config.embedder.dimension).cyan());
    if config.embedder.api_key.is_some() {
        eprintln!("  API Key: {}", style("(set)").dim());
    }

    eprintln!();
    eprintln!("{}", style("Generator:").bold().yellow());
    eprintln!("  Backend: {}", style(format!("{:?}", config.generator.backend)).cyan());
    eprintln!("  URL: {}", style(&config.generator.url).cyan());
    eprintln!("  Model: {}", style(&config.generator.model).cyan());

    eprintln!();
    eprintln!("{}", style("Index:").bold().yellow());
    eprintln!("  Name: {}", style(&config.index.name).cyan());
    eprintln!("  Metric: {}", style(config.index.metric).cyan());
    eprintln!(
        "  Upsert Batch Size: {}",
        style(config.index.upsert_batch_size).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Top K: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Max Section Length: {}",
        style(config.retrieval.max_section_len).cyan()
    );

    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());
    eprintln!("Vector data: {}", style(config.vector_database_path().display()).dim());

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).unwrap_or_else(|_| {
        eprintln!(
            "{}",
            style("No usable configuration found. Using defaults.").yellow()
        );
        Config {
            base_dir: config_dir.to_path_buf(),
            ..Config::default()
        }
    })
}

fn prompt_url(prompt: &str, current: &Url) -> Result<String> {
    Ok(Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            match Url::parse(input) {
                Ok(url) if url.scheme() == "http" || url.scheme() == "https" => Ok(()),
                _ => Err("Enter an http:// or https:// URL"),
            }
        })
        .interact_text()?)
}

fn prompt_model(prompt: &str, current: &str) -> Result<String> {
    Ok(Input::new()
        .with_prompt(prompt)
        .default(current.to_string())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?)
}

fn configure_embedder(embedder: &mut EmbedderConfig) -> Result<()> {
    let backends = [
        ("ollama", EmbedderBackend::Ollama),
        ("predict", EmbedderBackend::Predict),
        ("openai", EmbedderBackend::OpenAi),
    ];
    let default_index = backends
        .iter()
        .position(|(_, backend)| *backend == embedder.backend)
        .unwrap_or_default();
    let backend_index = Select::new()
        .with_prompt("Embedding backend")
        .default(default_index)
        .items(&backends.map(|(label, _)| label))
        .interact()?;
    embedder.backend = backends[backend_index].1;

    let url = prompt_url("Embedding endpoint URL", &embedder.url)?;
    embedder.set_url(&url)?;

    if embedder.backend != EmbedderBackend::Predict {
        let model = prompt_model("Embedding model", &embedder.model)?;
        embedder.set_model(model)?;
    }

    if embedder.backend == EmbedderBackend::OpenAi {
        let api_key = Password::new()
            .with_prompt("API key")
            .allow_empty_password(embedder.api_key.is_some())
            .interact()?;
        if !api_key.is_empty() {
            embedder.set_api_key(api_key)?;
        }
    }

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedder.dimension)
        .interact_text()?;
    embedder.set_dimension(dimension)?;

    Ok(())
}

fn configure_generator(generator: &mut GeneratorConfig) -> Result<()> {
    let backends = &["ollama", "predict"];
    let default_index = usize::from(generator.backend == GeneratorBackend::Predict);
    let backend_index = Select::new()
        .with_prompt("Generation backend")
        .default(default_index)
        .items(backends)
        .interact()?;
    generator.backend = if backend_index == 0 {
        GeneratorBackend::Ollama
    } else {
        GeneratorBackend::Predict
    };

    let url = prompt_url("Generation endpoint URL", &generator.url)?;
    generator.set_url(&url)?;

    if generator.backend == GeneratorBackend::Ollama {
        let model = prompt_model("Generation model", &generator.model)?;
        generator.set_model(model)?;
    }

    Ok(())
}

/// A server that answers at all, even with a client error, counts as reachable
fn test_connection(url: &Url) -> bool {
    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => (400..600).contains(&code),
        Err(_) => false,
    }
}
