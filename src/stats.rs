//! Store statistics and readiness overview for `ctxmem stats` and
//! `ctxmem health`.

use anyhow::{bail, Result};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::orchestrator::MemoryOrchestrator;

pub async fn run_stats(
    config: &Config,
    orchestrator: &MemoryOrchestrator,
    cancel: &CancellationToken,
) -> Result<()> {
    let stats = orchestrator.statistics(cancel).await?;
    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Context Memory: Store Stats");
    println!("===========================");
    println!();
    println!("  Database:       {}", config.db.path.display());
    println!("  File size:      {}", format_bytes(db_size));
    println!();
    println!("  Documents:      {}", stats.total_documents);
    println!("  Vectors:        {}", stats.total_vectors);
    println!("  Relationships:  {}", stats.total_relationships);
    println!(
        "  Estimated size: {} (heuristic)",
        format_bytes(stats.estimated_size_bytes)
    );
    println!();
    Ok(())
}

pub async fn run_health(orchestrator: &MemoryOrchestrator) -> Result<()> {
    let report = orchestrator.health().await;
    let mark = |ok: bool| if ok { "ok" } else { "UNHEALTHY" };
    println!("  repository:     {}", mark(report.repository));
    println!("  vector_store:   {}", mark(report.vector_store));
    println!("  graph_store:    {}", mark(report.graph_store));
    println!("  language_model: {}", mark(report.language_model));

    if !report.is_ready() {
        bail!("not ready: {}", report.unhealthy().join(", "));
    }
    println!("ready");
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
