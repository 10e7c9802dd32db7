//! Language model implementations.
//!
//! - **[`LocalLanguageModel`]**: offline. It gives feature-hashed embeddings
//!   and extractive summaries. It extracts no relationships and has no
//!   chat completion.
//! - **[`OpenAiLanguageModel`]**: any OpenAI-compatible HTTP endpoint, with
//!   retry and exponential backoff.
//!
//! # Retry Strategy
//!
//! The HTTP model retries transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

mod local;
mod openai;

use std::sync::Arc;

use anyhow::{bail, Result};

use context_memory_core::language::LanguageModel;

use crate::config::LanguageConfig;

pub use local::LocalLanguageModel;
pub use openai::OpenAiLanguageModel;

/// Build the language model named by `language.provider`.
///
/// # Errors
///
/// Returns an error for an unknown provider, or when the `openai` provider
/// is selected and `OPENAI_API_KEY` is not set.
pub fn create_language_model(config: &LanguageConfig) -> Result<Arc<dyn LanguageModel>> {
    match config.provider.as_str() {
        "local" => Ok(Arc::new(LocalLanguageModel::new(config.dims))),
        "openai" => Ok(Arc::new(OpenAiLanguageModel::new(config)?)),
        other => bail!("Unknown language provider: {}", other),
    }
}

/// Cut `text` to at most `max_chars` characters, preferring a word boundary.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => cut[..pos].trim_end().to_string(),
        _ => cut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_prefers_word_boundary() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("hello wonderful world", 12), "hello");
        assert_eq!(truncate_chars("abcdefgh", 3), "abc");
        assert_eq!(truncate_chars("héllo wörld", 8), "héllo");
    }

    #[test]
    fn test_create_local_model() {
        let config = LanguageConfig::default();
        let model = create_language_model(&config).unwrap();
        assert_eq!(model.model_name(), "local-hash");
    }

    #[test]
    fn test_create_rejects_unknown_provider() {
        let config = LanguageConfig {
            provider: "nope".into(),
            ..LanguageConfig::default()
        };
        assert!(create_language_model(&config).is_err());
    }
}
