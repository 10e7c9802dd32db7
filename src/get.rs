//! `ctxmem get` and `ctxmem delete`.

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;

use crate::orchestrator::MemoryOrchestrator;

pub async fn run_get(
    orchestrator: &MemoryOrchestrator,
    id: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(doc) = orchestrator.get_document(id, cancel).await? else {
        bail!("document not found: {}", id);
    };

    println!("--- Document ---");
    println!("id:          {}", doc.id);
    println!("title:       {}", doc.title().unwrap_or("(untitled)"));
    println!("source:      {}", doc.source.source_type);
    if let Some(path) = &doc.source.path {
        println!("path:        {}", path);
    }
    println!("created_at:  {}", doc.created_at.to_rfc3339());
    if !doc.metadata.is_empty() {
        println!("metadata:    {}", serde_json::to_string(&doc.metadata)?);
    }
    println!();
    println!("--- Content ---");
    println!("{}", doc.content);
    Ok(())
}

pub async fn run_delete(
    orchestrator: &MemoryOrchestrator,
    id: &str,
    cancel: &CancellationToken,
) -> Result<()> {
    if orchestrator.delete_document(id, cancel).await? {
        println!("Deleted {}", id);
        Ok(())
    } else {
        bail!("document not found: {}", id)
    }
}
