//! `ctxmem search`, `ctxmem context` and `ctxmem ask`.

use anyhow::{bail, Result};
use futures::StreamExt;
use std::io::Write;
use tokio_util::sync::CancellationToken;

use context_memory_core::error::MemoryError;
use context_memory_core::models::Metadata;

use crate::orchestrator::{ContextRequest, MemoryOrchestrator, SearchRequest};

/// Parse `key=value` filters. Values that parse as JSON (numbers, booleans,
/// quoted strings) keep their type; anything else is a string.
pub fn parse_filters(raw: &[String]) -> Result<Metadata> {
    let mut filters = Metadata::new();
    for item in raw {
        let Some((key, value)) = item.split_once('=') else {
            bail!("invalid filter '{}': expected key=value", item);
        };
        let value = serde_json::from_str(value)
            .unwrap_or_else(|_| serde_json::Value::String(value.to_string()));
        filters.insert(key.trim().to_string(), value);
    }
    Ok(filters)
}

pub async fn run_search(
    orchestrator: &MemoryOrchestrator,
    request: &SearchRequest,
    cancel: &CancellationToken,
) -> Result<()> {
    let response = orchestrator.search(request, cancel).await?;
    if response.results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, hit) in response.results.iter().enumerate() {
        let title = hit.document.title().unwrap_or("(untitled)");
        println!(
            "{}. [{:.3}] {}  {}",
            i + 1 + request.offset,
            hit.score,
            title,
            hit.document.id
        );
        println!("    {}", snippet(&hit.document.content, 160));
    }
    println!(
        "\n{} results in {}ms",
        response.total_results, response.processing_time_ms
    );
    Ok(())
}

pub async fn run_context(
    orchestrator: &MemoryOrchestrator,
    request: &ContextRequest,
    cancel: &CancellationToken,
) -> Result<()> {
    let response = orchestrator.get_context(request, cancel).await?;
    println!("Documents ({}):", response.total_results);
    for doc in &response.documents {
        println!("  - {}  {}", doc.id, doc.title().unwrap_or("(untitled)"));
    }
    if !response.relationships.is_empty() {
        println!("Relationships ({}):", response.relationships.len());
        for rel in &response.relationships {
            println!(
                "  {} -[{} {:.2}]-> {}",
                rel.source, rel.relationship_type, rel.confidence, rel.target
            );
        }
    }
    if let Some(summary) = &response.summary {
        println!("Summary:\n  {}", summary);
    }
    Ok(())
}

/// Stream an answer to stdout as it is generated.
pub async fn run_ask(
    orchestrator: &MemoryOrchestrator,
    question: &str,
    max_documents: usize,
    cancel: &CancellationToken,
) -> Result<()> {
    let (context, mut stream) = orchestrator
        .stream_answer(question, max_documents, cancel)
        .await?;

    let mut stdout = std::io::stdout();
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => return Err(MemoryError::Cancelled.into()),
            next = stream.next() => next,
        };
        match next {
            Some(delta) => {
                write!(stdout, "{}", delta?)?;
                stdout.flush()?;
            }
            None => break,
        }
    }
    println!();

    if !context.documents.is_empty() {
        println!("\nSources:");
        for (i, doc) in context.documents.iter().enumerate() {
            println!("  [{}] {}  {}", i + 1, doc.title().unwrap_or("(untitled)"), doc.id);
        }
    }
    Ok(())
}

fn snippet(content: &str, max_chars: usize) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        format!("{}...", flat.chars().take(max_chars).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_filters_keeps_json_types() {
        let raw = vec![
            "type=note".to_string(),
            "priority=2".to_string(),
            "draft=false".to_string(),
            "label=\"2\"".to_string(),
        ];
        let filters = parse_filters(&raw).unwrap();
        assert_eq!(filters["type"], json!("note"));
        assert_eq!(filters["priority"], json!(2));
        assert_eq!(filters["draft"], json!(false));
        assert_eq!(filters["label"], json!("2"));
        assert!(parse_filters(&["oops".to_string()]).is_err());
    }

    #[test]
    fn test_snippet_flattens_and_truncates() {
        assert_eq!(snippet("a\n\nb   c", 10), "a b c");
        assert_eq!(snippet("abcdef", 3), "abc...");
    }
}
