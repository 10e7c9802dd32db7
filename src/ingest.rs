//! `ctxmem ingest` and `ctxmem ingest-dir`.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use context_memory_core::models::{BatchIngestionResult, IngestionStatus};

use crate::connector_fs::{file_to_document, scan_directory, ScanOptions};
use crate::orchestrator::{IngestOptions, MemoryOrchestrator};

/// Ingest individual files. Each file is keyed by the path as given.
pub async fn run_ingest_files(
    orchestrator: &MemoryOrchestrator,
    paths: &[PathBuf],
    options: &IngestOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let id_path = path.to_string_lossy().replace('\\', "/");
        match file_to_document(path, &id_path)? {
            Some(document) => documents.push(document),
            None => bail!("{} is not a UTF-8 text file", path.display()),
        }
    }

    let batch = orchestrator.ingest_batch(documents, options, cancel).await;
    print_batch(&batch);
    batch.ensure_complete()?;
    Ok(())
}

/// Scan a directory and ingest every matching file.
pub async fn run_ingest_dir(
    orchestrator: &MemoryOrchestrator,
    root: &Path,
    scan: &ScanOptions,
    options: &IngestOptions,
    cancel: &CancellationToken,
) -> Result<()> {
    let documents = scan_directory(root, scan)?;
    if documents.is_empty() {
        println!("No matching files under {}", root.display());
        return Ok(());
    }
    println!("Ingesting {} files from {}", documents.len(), root.display());

    let batch = orchestrator.ingest_batch(documents, options, cancel).await;
    print_batch(&batch);
    batch.ensure_complete()?;
    Ok(())
}

fn print_batch(batch: &BatchIngestionResult) {
    for result in &batch.results {
        match result.status {
            IngestionStatus::Completed => println!(
                "  ok      {}  chunks={} relationships={}",
                result.document_id, result.chunks_created, result.relationships_extracted
            ),
            IngestionStatus::Failed => println!(
                "  FAILED  {}  {}",
                result.document_id,
                result.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
    println!(
        "{} succeeded, {} failed in {}ms",
        batch.successful_documents, batch.failed_documents, batch.processing_time_ms
    );
}
