// Configuration management module
// TOML settings for the embedding, generation and index backends

pub mod interactive;
pub mod settings;

#[cfg(test)]
mod tests;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{
    Config, ConfigError, EmbedderBackend, EmbedderConfig, GeneratorBackend, GeneratorConfig,
    IndexConfig, RetrievalConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::config_dir()
}
