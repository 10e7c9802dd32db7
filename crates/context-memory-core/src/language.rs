//! Language model contract.
//!
//! The orchestrator and the vector stores depend only on this trait.
//! Concrete models (OpenAI-compatible HTTP, offline hashing model) live in
//! the `context-memory` app crate.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::models::{ChatMessage, ExtractedRelationship};

/// Incremental text deltas from a streaming chat completion.
pub type CompletionStream = BoxStream<'static, Result<String>>;

/// Embedding, completion, summarization, and relationship extraction.
///
/// | Method | Used by |
/// |--------|---------|
/// | [`generate_embedding`](LanguageModel::generate_embedding) | vector stores (chunk + query embedding) |
/// | [`generate_summary`](LanguageModel::generate_summary) | ingest auto-summary, context summary |
/// | [`extract_relationships`](LanguageModel::extract_relationships) | ingest enrichment |
/// | [`generate_chat_completion`](LanguageModel::generate_chat_completion) | callers composing prompts |
/// | [`is_healthy`](LanguageModel::is_healthy) | readiness gate |
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier used for completions (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Embed a single text into a fixed-dimension vector.
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;

    async fn generate_chat_completion(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Streaming variant of [`generate_chat_completion`](LanguageModel::generate_chat_completion).
    async fn stream_chat_completion(&self, messages: &[ChatMessage]) -> Result<CompletionStream>;

    /// Summarize `text` in at most `max_length` characters.
    async fn generate_summary(&self, text: &str, max_length: usize) -> Result<String>;

    async fn extract_relationships(&self, text: &str) -> Result<Vec<ExtractedRelationship>>;

    async fn is_healthy(&self) -> bool;
}
