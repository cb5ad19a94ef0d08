pub mod providers;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Generation provider types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum GenerationProvider {
    Gemini,
    OpenAI,
}

/// Generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Which backend to talk to
    pub provider: GenerationProvider,
    /// API key for the backend
    pub api_key: Option<String>,
    /// Override endpoint (OpenAI-compatible servers)
    pub endpoint: Option<String>,
    /// Model variants in fallback order, primary first
    pub model_variants: Vec<String>,
    /// Maximum tokens to generate
    pub max_output_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Per-call timeout in seconds
    pub timeout_seconds: u64,
    /// Input ceiling in estimated tokens; transcripts are truncated to fit
    pub max_input_tokens: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::Gemini,
            api_key: None,
            endpoint: None,
            model_variants: vec![
                "gemini-2.0-flash".to_string(),
                "gemini-2.0-flash-lite".to_string(),
                "gemini-1.5-flash".to_string(),
            ],
            max_output_tokens: 2048,
            temperature: 0.3,
            timeout_seconds: 60,
            max_input_tokens: 48_000,
        }
    }
}

/// Generated text plus usage metadata
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// Trait for generative text backends
///
/// The model variant is chosen per call so the Chapter Generator can walk
/// its fallback list over a single backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        model: &str,
        system_instruction: &str,
        user_content: &str,
    ) -> Result<GenerationResponse>;

    fn provider_type(&self) -> GenerationProvider;
}

/// Create a generation backend based on configuration
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn TextGenerator>> {
    match config.provider {
        GenerationProvider::Gemini => {
            Ok(Box::new(providers::GeminiGenerator::new(config.clone())?))
        }
        GenerationProvider::OpenAI => {
            Ok(Box::new(providers::OpenAIGenerator::new(config.clone())?))
        }
    }
}
