use async_trait::async_trait;

use crate::errors::SenseiError;

/// Trait implemented by each LLM backend (live HTTP provider, mock).
/// One prompt in, one completed text out; structured extraction happens
/// above this layer.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn complete(&self, prompt: &str) -> Result<String, SenseiError>;
}

/// Embedding backend for the vector store. Absent at construction time
/// when no credential is configured, which puts the store in degraded mode.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SenseiError>;
}
