pub mod grok;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::storage::types::ApiConfig;

pub use grok::GrokClient;

pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Sampling parameters; unset values fall back to the defaults above.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Counts missing from a provider's `usage` block read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutionError {
    #[error("Please configure the API key and endpoint first")]
    MissingConfig,
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("{0}")]
    Transport(String),
    #[error("Malformed completion response: {0}")]
    MalformedResponse(String),
}

pub type ExecutionResult = std::result::Result<Completion, ExecutionError>;

/// Sends one prompt to a chat-completions endpoint, exactly once.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn execute(
        &self,
        prompt: &str,
        config: &ApiConfig,
        options: ExecuteOptions,
    ) -> ExecutionResult;
}
