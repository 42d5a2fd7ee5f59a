//! Test doubles for the provider traits.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use sensei_core::{EmbeddingProvider, LlmProvider, SenseiError};

/// Provider that pops queued responses in order and counts calls.
#[derive(Default)]
pub struct MockProvider {
    responses: Mutex<VecDeque<Result<String, SenseiError>>>,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(text: impl Into<String>) -> Self {
        let mock = Self::new();
        mock.push_ok(text);
        mock
    }

    pub fn push_ok(&self, text: impl Into<String>) {
        self.responses.lock().push_back(Ok(text.into()));
    }

    pub fn push_err(&self, err: SenseiError) {
        self.responses.lock().push_back(Err(err));
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, _prompt: &str) -> Result<String, SenseiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SenseiError::NetworkError("no queued response".into())))
    }
}

/// Deterministic embedder: folds bytes into fixed-width buckets so equal
/// text embeds identically and the vector is never zero for non-empty text.
pub struct MockEmbedder {
    dims: usize,
}

impl MockEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new(8)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedder {
    fn dimensions(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SenseiError> {
        let mut vector = vec![0.0f32; self.dims];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % self.dims] += f32::from(byte) / 255.0;
        }
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_pops_in_order_then_errors() {
        let mock = MockProvider::new();
        mock.push_ok("first");
        mock.push_ok("second");

        assert_eq!(mock.complete("p").await.unwrap(), "first");
        assert_eq!(mock.complete("p").await.unwrap(), "second");
        assert!(mock.complete("p").await.is_err());
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn mock_embedder_is_deterministic() {
        let embedder = MockEmbedder::new(4);
        let a = embedder.embed("hello").await.unwrap();
        let b = embedder.embed("hello").await.unwrap();
        let c = embedder.embed("world").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 4);
    }
}
