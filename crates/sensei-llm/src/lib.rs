//! LLM integration for sensei.
//!
//! [`AnalysisEngine`] is the only type the server talks to. It wraps an
//! optional provider (Gemini over HTTP, or a mock in tests) behind the
//! daily rate governor, and guarantees a well-formed answer for every
//! operation via deterministic fallbacks.

pub mod engine;
pub mod fallback;
pub mod gemini;
pub mod mock;
pub mod parse;
pub mod prompts;
pub mod reliable;

pub use engine::AnalysisEngine;
pub use gemini::{GeminiEmbedder, GeminiProvider};
pub use mock::{MockEmbedder, MockProvider};
pub use reliable::{ReliableProvider, RetryConfig};
