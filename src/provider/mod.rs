//! Model-serving providers
//!
//! A [`ChatProvider`] turns a prompt into generated text plus the token
//! counts actually billed, which feed the real cost and CO2 figures.

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use gemini::GeminiClient;

/// Provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Provider returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed provider response: {0}")]
    Malformed(String),

    #[error("Missing API key for {0}")]
    MissingApiKey(&'static str),
}

/// Generated text and token usage for one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub model: String,
    pub text: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl Completion {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn generate(&self, model: &str, prompt: &str) -> Result<Completion, ProviderError>;
}
