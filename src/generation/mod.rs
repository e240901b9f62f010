pub mod openai;

use async_trait::async_trait;

use crate::error::GenerationError;

pub use openai::{OpenAiClient, OpenAiConfig};

/// Sampling overrides for a single completion call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionOptions {
    pub fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            temperature: Some(temperature),
            max_tokens: Some(max_tokens),
        }
    }
}

/// The three calls the generator makes against the generation service.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Returns `true` when the text is flagged as inappropriate.
    async fn moderate(&self, text: &str) -> Result<bool, GenerationError>;

    async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String, GenerationError>;

    /// Returns the URL of the generated image.
    async fn image(&self, prompt: &str) -> Result<String, GenerationError>;
}
