//! OpenAI-compatible language model.
//!
//! Calls `POST {base_url}/embeddings` and `POST {base_url}/chat/completions`.
//! Requires the `OPENAI_API_KEY` environment variable. Any server speaking
//! the same protocol (vLLM, LiteLLM, Ollama's `/v1`) works through
//! `language.base_url`.

use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use tracing::debug;

use context_memory_core::language::{CompletionStream, LanguageModel};
use context_memory_core::models::{ChatMessage, ExtractedRelationship};

use super::truncate_chars;
use crate::config::LanguageConfig;

const EXTRACTION_PROMPT: &str = "Extract relationships between named entities in the text. \
Respond with only a JSON array of objects with the keys \"source\", \"target\", \"type\", \
\"confidence\" (0.0 to 1.0) and \"context\" (the phrase that states the relationship). \
Respond with [] if there are none.";

pub struct OpenAiLanguageModel {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    embedding_model: String,
    dims: usize,
    max_retries: u32,
}

impl OpenAiLanguageModel {
    /// # Errors
    ///
    /// Returns an error if `OPENAI_API_KEY` is not in the environment or
    /// the HTTP client cannot be built.
    pub fn new(config: &LanguageConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            dims: config.dims,
            max_retries: config.max_retries,
        })
    }

    /// POST `body` to `path`, retrying rate limits, server errors and
    /// network failures with exponential backoff.
    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<reqwest::Response> {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, delay_secs = delay.as_secs(), url = %url, "retrying");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }

                    // Rate limited or server error: retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!("API error {}: {}", status, body_text));
                        continue;
                    }

                    // Client error (not 429): don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("request failed after retries")))
    }

    async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        let json: serde_json::Value = self.post("chat/completions", &body).await?.json().await?;
        parse_chat_response(&json)
    }
}

#[async_trait]
impl LanguageModel for OpenAiLanguageModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let mut body = serde_json::json!({
            "model": self.embedding_model,
            "input": [text],
        });
        if self.embedding_model.starts_with("text-embedding-3") {
            body["dimensions"] = serde_json::json!(self.dims);
        }
        let json: serde_json::Value = self.post("embeddings", &body).await?.json().await?;
        parse_embedding_response(&json)
    }

    async fn generate_chat_completion(&self, messages: &[ChatMessage]) -> Result<String> {
        self.chat(messages).await
    }

    async fn stream_chat_completion(&self, messages: &[ChatMessage]) -> Result<CompletionStream> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });
        let response = self.post("chat/completions", &body).await?;
        Ok(sse_deltas(response.bytes_stream().boxed()))
    }

    async fn generate_summary(&self, text: &str, max_length: usize) -> Result<String> {
        let messages = [
            ChatMessage::system(format!(
                "Summarize the user's text in at most {max_length} characters. \
                 Respond with the summary only."
            )),
            ChatMessage::user(text),
        ];
        let summary = self.chat(&messages).await?;
        Ok(truncate_chars(summary.trim(), max_length))
    }

    async fn extract_relationships(&self, text: &str) -> Result<Vec<ExtractedRelationship>> {
        let messages = [ChatMessage::system(EXTRACTION_PROMPT), ChatMessage::user(text)];
        let reply = self.chat(&messages).await?;
        parse_relationships(&reply)
    }

    async fn is_healthy(&self) -> bool {
        let response = self
            .client
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        matches!(response, Ok(resp) if resp.status().is_success())
    }
}

fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>> {
    let embedding = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .and_then(|item| item.get("embedding"))
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embeddings response: missing data[0].embedding"))?;

    Ok(embedding
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect())
}

fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid chat response: missing choices[0].message.content"))
}

/// Parse the JSON array in a model reply, tolerating surrounding prose or
/// code fences.
fn parse_relationships(reply: &str) -> Result<Vec<ExtractedRelationship>> {
    let (start, end) = match (reply.find('['), reply.rfind(']')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => bail!("relationship extraction reply contains no JSON array"),
    };
    let parsed: Vec<ExtractedRelationship> = serde_json::from_str(&reply[start..=end])?;
    Ok(parsed
        .into_iter()
        .filter(|r| !r.source.trim().is_empty() && !r.target.trim().is_empty())
        .collect())
}

/// One decoded `data:` line of a chat completion event stream.
#[derive(Debug, PartialEq)]
enum SseEvent {
    Delta(String),
    Done,
    Skip,
}

fn parse_sse_line(line: &str) -> Result<SseEvent> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.trim();
    if data == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    let json: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| anyhow::anyhow!("failed to parse stream chunk: {e}"))?;
    match json.pointer("/choices/0/delta/content").and_then(|c| c.as_str()) {
        Some(text) if !text.is_empty() => Ok(SseEvent::Delta(text.to_string())),
        _ => Ok(SseEvent::Skip),
    }
}

struct SseState<S> {
    bytes: S,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

impl<S> SseState<S> {
    /// Drain complete lines from the buffer into `pending`.
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.push_line(&String::from_utf8_lossy(&line));
            if self.finished {
                return;
            }
        }
    }

    fn push_line(&mut self, line: &str) {
        match parse_sse_line(line.trim()) {
            Ok(SseEvent::Delta(text)) => self.pending.push_back(Ok(text)),
            Ok(SseEvent::Done) => self.finished = true,
            Ok(SseEvent::Skip) => {}
            Err(e) => {
                self.pending.push_back(Err(e));
                self.finished = true;
            }
        }
    }
}

/// Turn a server-sent-event byte stream into text deltas.
fn sse_deltas<B>(bytes: BoxStream<'static, reqwest::Result<B>>) -> CompletionStream
where
    B: AsRef<[u8]> + Send + 'static,
{
    let state = SseState {
        bytes,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(chunk.as_ref());
                    state.drain_lines();
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(e.into()));
                    state.finished = true;
                }
                None => {
                    let trailing = String::from_utf8_lossy(&state.buffer).into_owned();
                    state.buffer.clear();
                    state.push_line(&trailing);
                    state.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedding_response() {
        let json = serde_json::json!({"data": [{"embedding": [0.5, -1.0, 2.0]}]});
        assert_eq!(parse_embedding_response(&json).unwrap(), vec![0.5, -1.0, 2.0]);
        assert!(parse_embedding_response(&serde_json::json!({"data": []})).is_err());
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({"choices": [{"message": {"content": "hi there"}}]});
        assert_eq!(parse_chat_response(&json).unwrap(), "hi there");
        assert!(parse_chat_response(&serde_json::json!({"choices": []})).is_err());
    }

    #[test]
    fn test_parse_relationships_tolerates_fences() {
        let reply = "Here you go:\n```json\n[{\"source\":\"api\",\"target\":\"postgres\",\"type\":\"reads_from\",\"confidence\":0.8},{\"source\":\" \",\"target\":\"x\",\"type\":\"t\"}]\n```";
        let rels = parse_relationships(reply).unwrap();
        assert_eq!(rels.len(), 1);
        assert_eq!(rels[0].relationship_type, "reads_from");
        assert!(parse_relationships("nothing to see").is_err());
        assert!(parse_relationships("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), SseEvent::Skip);
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), SseEvent::Done);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#).unwrap(),
            SseEvent::Delta("Hel".into())
        );
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap(),
            SseEvent::Skip
        );
        assert!(parse_sse_line("data: {not json").is_err());
    }

    #[tokio::test]
    async fn test_sse_deltas_reassemble_split_chunks() {
        let raw = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n\n",
        );
        // Split mid-line to exercise buffering.
        let (a, b) = raw.as_bytes().split_at(30);
        let chunks: Vec<reqwest::Result<Vec<u8>>> = vec![Ok(a.to_vec()), Ok(b.to_vec())];
        let deltas: Vec<String> = sse_deltas(stream::iter(chunks).boxed())
            .map(|d| d.unwrap())
            .collect::<Vec<_>>()
            .await;
        assert_eq!(deltas, vec!["Hel", "lo"]);
    }
}
