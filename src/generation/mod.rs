// Generation module
// Prompt completion behind a backend-neutral trait


pub mod ollama;
pub mod predict;

use crate::Result;
use crate::config::{GeneratorBackend, GeneratorConfig};

pub use ollama::OllamaGenerator;
pub use predict::PredictGenerator;

/// Produces a completion for a fully rendered prompt.
///
/// The returned text is passed through as the model produced it.
pub trait Generator: Send + Sync {
    fn generate(&self, prompt: &str) -> Result<String>;
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    #[inline]
    fn generate(&self, prompt: &str) -> Result<String> {
        (**self).generate(prompt)
    }
}

/// Build the generator selected in configuration.
#[inline]
pub fn from_config(config: &GeneratorConfig) -> Result<Box<dyn Generator>> {
    Ok(match config.backend {
        GeneratorBackend::Ollama => Box::new(OllamaGenerator::new(config)?),
        GeneratorBackend::Predict => Box::new(PredictGenerator::new(config)?),
    })
}
