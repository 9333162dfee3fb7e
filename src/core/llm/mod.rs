pub mod openai;

use anyhow::Result;
use async_trait::async_trait;

/// One bounded generation call: a system/user instruction pair plus
/// the knobs the pipeline fixes per cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Execute one generation call with the caller's bearer key.
    async fn generate(&self, api_key: &str, request: &GenerationRequest) -> Result<String>;
}
