//! Offline language model.
//!
//! Embeddings are signed feature hashes of lowercase word tokens, L2
//! normalized, so texts sharing words score higher under cosine
//! similarity. Good enough for tests, demos and air-gapped installs.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use context_memory_core::embedding::l2_normalize;
use context_memory_core::language::{CompletionStream, LanguageModel};
use context_memory_core::models::{ChatMessage, ExtractedRelationship};

use super::truncate_chars;

pub struct LocalLanguageModel {
    dims: usize,
}

impl LocalLanguageModel {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        for token in tokens(text) {
            let digest = Sha256::digest(token.as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            let slot = (u64::from_le_bytes(head) % self.dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vec[slot] += sign;
        }
        l2_normalize(&mut vec);
        vec
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

/// Leading sentences of `text` that fit in `max_length` characters.
fn extractive_summary(text: &str, max_length: usize) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut summary = String::new();
    for sentence in normalized.split_inclusive(['.', '!', '?']) {
        let sentence = sentence.trim();
        if sentence.is_empty() {
            continue;
        }
        let needed = if summary.is_empty() {
            sentence.chars().count()
        } else {
            summary.chars().count() + 1 + sentence.chars().count()
        };
        if needed > max_length {
            break;
        }
        if !summary.is_empty() {
            summary.push(' ');
        }
        summary.push_str(sentence);
    }
    if summary.is_empty() {
        truncate_chars(&normalized, max_length)
    } else {
        summary
    }
}

#[async_trait]
impl LanguageModel for LocalLanguageModel {
    fn model_name(&self) -> &str {
        "local-hash"
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    async fn generate_chat_completion(&self, _messages: &[ChatMessage]) -> Result<String> {
        bail!("chat completion requires language.provider = \"openai\"")
    }

    async fn stream_chat_completion(&self, _messages: &[ChatMessage]) -> Result<CompletionStream> {
        bail!("chat completion requires language.provider = \"openai\"")
    }

    async fn generate_summary(&self, text: &str, max_length: usize) -> Result<String> {
        Ok(extractive_summary(text, max_length))
    }

    async fn extract_relationships(&self, _text: &str) -> Result<Vec<ExtractedRelationship>> {
        Ok(Vec::new())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}
