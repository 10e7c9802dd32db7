//! Memory orchestrator.
//!
//! Composes the document repository, vector index, relationship graph and
//! language model into ingest, batch ingest, context retrieval, search,
//! delete and statistics operations.
//!
//! # Consistency model
//!
//! The stores are independent and there is no cross-store transaction.
//! The repository write is the durability anchor: a document exists iff
//! the repository has it. Vector and graph writes are derived side
//! effects. When a required step fails, earlier side effects stay in
//! place; because [`DocumentRepository::save`] is an upsert and ingest
//! clears a document's previous chunks and edges before writing new ones,
//! re-ingesting the same document is the recovery path.
//!
//! # Ingest stages
//!
//! ```text
//! Received → Persisted → ChunksStored → [RelationshipsExtracted] → [Summarized] → Completed
//!     └──────────┴────────────┴──────────────────────────────────────────────→ Failed
//! ```
//!
//! Only the first three stages can fail an ingest. Relationship extraction
//! and summarization degrade the result instead.
//!
//! # Cancellation
//!
//! Every public operation takes a [`CancellationToken`]. Each collaborator
//! call is raced against it; when it fires the operation returns
//! [`MemoryError::Cancelled`] and nothing already written is undone.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use context_memory_core::chunk::chunk_document;
use context_memory_core::error::{MemoryError, Result};
use context_memory_core::language::{CompletionStream, LanguageModel};
use context_memory_core::models::{
    BatchIngestionResult, ChatMessage, ContextResponse, Document, HealthReport,
    IngestionResult, IngestionStatus, MemoryStatistics, Metadata, Relationship, SearchHit,
    SearchResponse,
};
use context_memory_core::store::{DocumentRepository, GraphStore, VectorStore};

use crate::metrics::MemoryCounters;

/// Returned as the context summary when the language model cannot produce one.
pub const FALLBACK_SUMMARY: &str =
    "Summary unavailable: the language service could not summarize the retrieved documents.";

const BYTES_PER_DOCUMENT: u64 = 2048;
const BYTES_PER_RELATIONSHIP: u64 = 256;
const VECTOR_OVERHEAD_BYTES: u64 = 512;

/// Orchestrator tuning, decoupled from the TOML config.
#[derive(Debug, Clone)]
pub struct OrchestratorParams {
    /// Default chunk size in words.
    pub chunk_size: usize,
    /// Default overlap in words.
    pub overlap: usize,
    /// Permits of the batch ingest gate.
    pub max_concurrent_documents: usize,
    pub enable_relationship_extraction: bool,
    pub enable_auto_summary: bool,
    pub summary_max_length: usize,
    pub context_summary_max_length: usize,
    pub search_min_score: f64,
    /// Embedding dimensionality, used only for the size estimate.
    pub vector_dims: usize,
}

impl Default for OrchestratorParams {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
            max_concurrent_documents: 4,
            enable_relationship_extraction: true,
            enable_auto_summary: true,
            summary_max_length: 500,
            context_summary_max_length: 1000,
            search_min_score: 0.0,
            vector_dims: 256,
        }
    }
}

/// Per-request ingest options.
///
/// Enrichment runs only when requested here *and* enabled in
/// [`OrchestratorParams`].
#[derive(Debug, Clone, Deserialize)]
pub struct IngestOptions {
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub overlap: Option<usize>,
    #[serde(default = "default_true")]
    pub extract_relationships: bool,
    #[serde(default = "default_true")]
    pub generate_summary: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            chunk_size: None,
            overlap: None,
            extract_relationships: true,
            generate_summary: true,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContextRequest {
    pub query: String,
    #[serde(default = "default_max_documents")]
    pub max_documents: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_true")]
    pub include_relationships: bool,
    #[serde(default)]
    pub generate_summary: bool,
}

impl ContextRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_documents: default_max_documents(),
            min_score: default_min_score(),
            include_relationships: true,
            generate_summary: false,
        }
    }
}

fn default_max_documents() -> usize {
    5
}
fn default_min_score() -> f64 {
    0.5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    /// Equality-only metadata filters.
    #[serde(default)]
    pub filters: Metadata,
    /// Accepted for wire compatibility; results keep vector rank order.
    #[serde(default)]
    pub sort: Option<String>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: default_limit(),
            offset: 0,
            filters: Metadata::new(),
            sort: None,
        }
    }
}

fn default_limit() -> usize {
    10
}

#[derive(Debug, Clone, Copy)]
enum IngestStage {
    Received,
    Persisted,
    ChunksStored,
    RelationshipsExtracted,
    Summarized,
    Completed,
}

/// Race `fut` against `cancel`.
async fn cancellable<F: Future>(cancel: &CancellationToken, fut: F) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(MemoryError::Cancelled),
        out = fut => Ok(out),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Coordinates the backing stores. Cheap to share behind an `Arc`.
pub struct MemoryOrchestrator {
    repository: Arc<dyn DocumentRepository>,
    vector: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    language: Arc<dyn LanguageModel>,
    params: OrchestratorParams,
    counters: Arc<MemoryCounters>,
}

impl MemoryOrchestrator {
    pub fn new(
        repository: Arc<dyn DocumentRepository>,
        vector: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        language: Arc<dyn LanguageModel>,
        params: OrchestratorParams,
    ) -> Self {
        Self {
            repository,
            vector,
            graph,
            language,
            params,
            counters: Arc::new(MemoryCounters::new()),
        }
    }

    /// Use a caller-owned counter set instead of a private one.
    pub fn with_counters(mut self, counters: Arc<MemoryCounters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn params(&self) -> &OrchestratorParams {
        &self.params
    }

    pub fn counters(&self) -> &Arc<MemoryCounters> {
        &self.counters
    }

    // ============ Ingest ============

    /// Ingest one document.
    ///
    /// Returns an error only if persisting the document or storing any of
    /// its chunk embeddings fails. Chunks stored before the failure are
    /// kept.
    pub async fn ingest_document(
        &self,
        document: Document,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestionResult> {
        let document_id = document.id.clone();
        match self.run_ingest(document, options, cancel).await {
            Ok(result) => {
                self.counters
                    .record_ingested(result.chunks_created, result.relationships_extracted);
                Ok(result)
            }
            Err(err) => {
                self.counters.record_ingest_failure();
                warn!(document_id = %document_id, error = %err, "ingest failed");
                Err(err)
            }
        }
    }

    async fn run_ingest(
        &self,
        document: Document,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> Result<IngestionResult> {
        let started = Instant::now();
        let document_id = document.id.clone();
        debug!(document_id = %document_id, stage = ?IngestStage::Received, "ingest");

        cancellable(cancel, self.repository.save(&document)).await??;
        debug!(document_id = %document_id, stage = ?IngestStage::Persisted, "ingest");

        // Derived entries from an earlier version of this document go first,
        // so a shorter re-ingest leaves no stale chunks or edges behind.
        let (stale_vectors, stale_relationships) = cancellable(cancel, async {
            futures::join!(
                self.vector.delete_embeddings(&document_id),
                self.graph.delete_relationships(&document_id),
            )
        })
        .await?;
        let stale_vectors = stale_vectors
            .map_err(|e| MemoryError::processing(&document_id, MemoryError::VectorStore(e)))?;
        let stale_relationships = stale_relationships
            .map_err(|e| MemoryError::processing(&document_id, MemoryError::GraphStore(e)))?;
        if stale_vectors + stale_relationships > 0 {
            debug!(
                document_id = %document_id,
                vectors = stale_vectors,
                relationships = stale_relationships,
                "replaced previous version"
            );
        }

        let chunk_size = options.chunk_size.unwrap_or(self.params.chunk_size);
        let overlap = options.overlap.unwrap_or(self.params.overlap);
        let chunks = chunk_document(&document_id, &document.content, chunk_size, overlap);
        let base_metadata = chunk_base_metadata(&document, chunks.len());

        let stores = chunks.iter().map(|chunk| {
            let mut metadata = base_metadata.clone();
            metadata.insert("chunk_index".to_string(), json!(chunk.index));
            metadata.insert("chunk_hash".to_string(), json!(chunk.hash));
            let document_id = document_id.as_str();
            async move {
                self.vector
                    .store_embeddings(document_id, &chunk.text, &metadata)
                    .await
            }
        });
        // Wait for every chunk, then surface the first failure.
        let outcomes = cancellable(cancel, join_all(stores)).await?;
        if let Some(err) = outcomes.into_iter().find_map(|o| o.err()) {
            return Err(MemoryError::processing(
                &document_id,
                MemoryError::VectorStore(err),
            ));
        }
        debug!(
            document_id = %document_id,
            stage = ?IngestStage::ChunksStored,
            chunks = chunks.len(),
            "ingest"
        );

        let mut relationships_extracted = 0;
        if options.extract_relationships && self.params.enable_relationship_extraction {
            match self.extract_relationships(&document, cancel).await {
                Ok(count) => {
                    relationships_extracted = count;
                    debug!(
                        document_id = %document_id,
                        stage = ?IngestStage::RelationshipsExtracted,
                        relationships = count,
                        "ingest"
                    );
                }
                Err(MemoryError::Cancelled) => return Err(MemoryError::Cancelled),
                Err(err) => {
                    self.counters.record_enrichment_failure();
                    warn!(document_id = %document_id, error = %err, "relationship extraction skipped");
                }
            }
        }

        let mut summary = None;
        if options.generate_summary && self.params.enable_auto_summary {
            let request = self
                .language
                .generate_summary(&document.content, self.params.summary_max_length);
            match cancellable(cancel, request).await? {
                Ok(text) => {
                    summary = Some(text);
                    debug!(document_id = %document_id, stage = ?IngestStage::Summarized, "ingest");
                }
                Err(err) => {
                    self.counters.record_enrichment_failure();
                    warn!(document_id = %document_id, error = %err, "auto-summary skipped");
                }
            }
        }

        let processing_time_ms = elapsed_ms(started);
        info!(
            document_id = %document_id,
            stage = ?IngestStage::Completed,
            chunks = chunks.len(),
            relationships = relationships_extracted,
            elapsed_ms = processing_time_ms,
            "document ingested"
        );

        Ok(IngestionResult {
            document_id,
            status: IngestionStatus::Completed,
            chunks_created: chunks.len(),
            relationships_extracted,
            summary,
            processing_time_ms,
            error: None,
        })
    }

    async fn extract_relationships(
        &self,
        document: &Document,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let extracted = cancellable(cancel, self.language.extract_relationships(&document.content))
            .await?
            .map_err(MemoryError::LanguageService)?;
        if extracted.is_empty() {
            return Ok(0);
        }

        let relationships: Vec<Relationship> = extracted
            .into_iter()
            .map(|r| r.into_relationship(&document.id))
            .collect();
        cancellable(cancel, self.graph.store_relationships(&relationships))
            .await?
            .map_err(MemoryError::GraphStore)
    }

    /// Ingest many documents, at most `max_concurrent_documents` at a time.
    ///
    /// Each document succeeds or fails on its own; failures are reported in
    /// the per-document results and never abort the batch.
    pub async fn ingest_batch(
        &self,
        documents: Vec<Document>,
        options: &IngestOptions,
        cancel: &CancellationToken,
    ) -> BatchIngestionResult {
        let started = Instant::now();
        let total = documents.len();
        let gate = Semaphore::new(self.params.max_concurrent_documents.max(1));

        let runs = documents.into_iter().map(|document| {
            let gate = &gate;
            async move {
                let doc_started = Instant::now();
                let document_id = document.id.clone();
                let outcome = match gate.acquire().await {
                    Ok(_permit) => self.ingest_document(document, options, cancel).await,
                    Err(_) => Err(MemoryError::Cancelled),
                };
                outcome.unwrap_or_else(|err| {
                    IngestionResult::failed(document_id, err.to_string(), elapsed_ms(doc_started))
                })
            }
        });
        let results = join_all(runs).await;

        let batch = BatchIngestionResult::from_results(results, elapsed_ms(started));
        if batch.failed_documents > 0 {
            warn!(
                total,
                failed = batch.failed_documents,
                "batch ingest finished with failures"
            );
        } else {
            info!(total, elapsed_ms = batch.processing_time_ms, "batch ingested");
        }
        batch
    }

    // ============ Retrieval ============

    /// Retrieve documents, relationships and an optional summary for a query.
    ///
    /// Documents keep the vector index's rank order. Ids the repository no
    /// longer knows are skipped. A failed summary yields
    /// [`FALLBACK_SUMMARY`] rather than an error.
    pub async fn get_context(
        &self,
        request: &ContextRequest,
        cancel: &CancellationToken,
    ) -> Result<ContextResponse> {
        let started = Instant::now();
        self.counters.record_context_request();

        let hits = cancellable(
            cancel,
            self.vector
                .search(&request.query, request.max_documents, request.min_score),
        )
        .await?
        .map_err(MemoryError::VectorStore)?;

        let mut ids: Vec<String> = Vec::new();
        for hit in hits.iter().filter(|h| h.score >= request.min_score) {
            if !ids.contains(&hit.document_id) {
                ids.push(hit.document_id.clone());
            }
        }
        ids.truncate(request.max_documents);

        let documents = cancellable(cancel, self.repository.get_many(&ids)).await??;
        if documents.len() < ids.len() {
            debug!(
                requested = ids.len(),
                resolved = documents.len(),
                "skipped documents missing from the repository"
            );
        }

        let relationships = if request.include_relationships && !documents.is_empty() {
            let lookups = documents
                .iter()
                .map(|d| self.graph.find_relationships_for_document(&d.id));
            let mut relationships = Vec::new();
            for found in cancellable(cancel, join_all(lookups)).await? {
                relationships.extend(found.map_err(MemoryError::GraphStore)?);
            }
            relationships
        } else {
            Vec::new()
        };

        let summary = if request.generate_summary && !documents.is_empty() {
            let combined = documents
                .iter()
                .map(|d| d.content.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            let summarize = self
                .language
                .generate_summary(&combined, self.params.context_summary_max_length);
            match cancellable(cancel, summarize).await? {
                Ok(text) => Some(text),
                Err(err) => {
                    warn!(error = %err, "context summary failed; using fallback");
                    Some(FALLBACK_SUMMARY.to_string())
                }
            }
        } else {
            None
        };

        let total_results = documents.len();
        let processing_time_ms = elapsed_ms(started);
        info!(
            results = total_results,
            relationships = relationships.len(),
            elapsed_ms = processing_time_ms,
            "context retrieved"
        );

        Ok(ContextResponse {
            query: request.query.clone(),
            documents,
            relationships,
            summary,
            total_results,
            processing_time_ms,
        })
    }

    /// Semantic search with pagination and equality metadata filters.
    ///
    /// `offset` applies to the de-duplicated document ids, not the raw
    /// chunk hits. Filters are applied after the page is resolved.
    pub async fn search(
        &self,
        request: &SearchRequest,
        cancel: &CancellationToken,
    ) -> Result<SearchResponse> {
        let started = Instant::now();
        self.counters.record_search();
        if let Some(sort) = &request.sort {
            debug!(sort = %sort, "sort hint ignored");
        }

        let hits = cancellable(
            cancel,
            self.vector
                .search(&request.query, request.limit, self.params.search_min_score),
        )
        .await?
        .map_err(MemoryError::VectorStore)?;

        let mut ids: Vec<String> = Vec::new();
        let mut best: HashMap<String, f64> = HashMap::new();
        for hit in &hits {
            match best.get_mut(&hit.document_id) {
                Some(score) => *score = score.max(hit.score),
                None => {
                    best.insert(hit.document_id.clone(), hit.score);
                    ids.push(hit.document_id.clone());
                }
            }
        }
        let page: Vec<String> = ids.into_iter().skip(request.offset).collect();

        let documents = cancellable(cancel, self.repository.get_many(&page)).await??;
        let results: Vec<SearchHit> = documents
            .into_iter()
            .filter(|d| d.matches_filters(&request.filters))
            .map(|document| SearchHit {
                score: best.get(&document.id).copied().unwrap_or_default(),
                document,
            })
            .collect();

        Ok(SearchResponse {
            query: request.query.clone(),
            total_results: results.len(),
            results,
            processing_time_ms: elapsed_ms(started),
        })
    }

    /// Answer a question from retrieved context as a stream of text deltas.
    pub async fn stream_answer(
        &self,
        question: &str,
        max_documents: usize,
        cancel: &CancellationToken,
    ) -> Result<(ContextResponse, CompletionStream)> {
        let mut request = ContextRequest::new(question);
        request.max_documents = max_documents;
        request.min_score = self.params.search_min_score;
        request.include_relationships = false;
        let context = self.get_context(&request, cancel).await?;

        let messages = answer_prompt(question, &context.documents);
        let stream = cancellable(cancel, self.language.stream_chat_completion(&messages))
            .await?
            .map_err(MemoryError::LanguageService)?;
        Ok((context, stream))
    }

    pub async fn get_document(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Document>> {
        Ok(cancellable(cancel, self.repository.get(id)).await??)
    }

    // ============ Delete & statistics ============

    /// Delete a document and everything derived from it.
    ///
    /// Returns `false` when the document does not exist. Otherwise the
    /// three stores are cleared concurrently; any failure is returned and
    /// deletions that already succeeded stay done.
    pub async fn delete_document(&self, id: &str, cancel: &CancellationToken) -> Result<bool> {
        if !cancellable(cancel, self.repository.exists(id)).await?? {
            return Ok(false);
        }

        let (vectors, relationships, removed) = cancellable(cancel, async {
            futures::join!(
                self.vector.delete_embeddings(id),
                self.graph.delete_relationships(id),
                self.repository.delete(id),
            )
        })
        .await?;

        let vectors =
            vectors.map_err(|e| MemoryError::processing(id, MemoryError::VectorStore(e)))?;
        let relationships =
            relationships.map_err(|e| MemoryError::processing(id, MemoryError::GraphStore(e)))?;
        removed.map_err(|e| MemoryError::processing(id, e.into()))?;

        self.counters.record_deleted();
        info!(document_id = %id, vectors, relationships, "document deleted");
        Ok(true)
    }

    /// Counts from all three stores plus a weighted size estimate.
    ///
    /// The counts are queried concurrently and are not a consistent
    /// snapshot of each other.
    pub async fn statistics(&self, cancel: &CancellationToken) -> Result<MemoryStatistics> {
        let (documents, vectors, relationships) = cancellable(cancel, async {
            futures::join!(
                self.repository.count(),
                self.vector.vector_count(),
                self.graph.relationship_count(),
            )
        })
        .await?;

        let total_documents = documents?;
        let total_vectors = vectors.map_err(MemoryError::VectorStore)?;
        let total_relationships = relationships.map_err(MemoryError::GraphStore)?;

        let bytes_per_vector = self.params.vector_dims as u64 * 4 + VECTOR_OVERHEAD_BYTES;
        Ok(MemoryStatistics {
            total_documents,
            total_vectors,
            total_relationships,
            estimated_size_bytes: total_documents * BYTES_PER_DOCUMENT
                + total_vectors * bytes_per_vector
                + total_relationships * BYTES_PER_RELATIONSHIP,
            generated_at: Utc::now(),
        })
    }

    // ============ Readiness ============

    /// Probe all four collaborators concurrently.
    pub async fn health(&self) -> HealthReport {
        let (repository, vector_store, graph_store, language_model) = futures::join!(
            self.repository.is_healthy(),
            self.vector.is_healthy(),
            self.graph.is_healthy(),
            self.language.is_healthy(),
        );
        HealthReport {
            repository,
            vector_store,
            graph_store,
            language_model,
        }
    }

    pub async fn is_healthy(&self) -> bool {
        self.health().await.is_ready()
    }

    /// Readiness gate: fails with [`MemoryError::NotReady`] naming the
    /// unhealthy collaborators.
    pub async fn ensure_ready(&self) -> Result<()> {
        let report = self.health().await;
        if report.is_ready() {
            Ok(())
        } else {
            Err(MemoryError::NotReady(report.unhealthy().join(", ")))
        }
    }
}

/// Metadata shared by every chunk of a document: source fields plus the
/// document's own metadata under a `doc_` prefix.
fn chunk_base_metadata(document: &Document, chunk_count: usize) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("chunk_count".to_string(), json!(chunk_count));
    metadata.insert("source_type".to_string(), json!(document.source.source_type));
    if let Some(path) = &document.source.path {
        metadata.insert("source_path".to_string(), json!(path));
    }
    if let Some(modified_at) = &document.source.modified_at {
        metadata.insert("source_modified_at".to_string(), json!(modified_at.to_rfc3339()));
    }
    for (key, value) in &document.metadata {
        metadata.insert(format!("doc_{key}"), value.clone());
    }
    metadata
}

fn answer_prompt(question: &str, documents: &[Document]) -> Vec<ChatMessage> {
    let context = documents
        .iter()
        .enumerate()
        .map(|(i, d)| format!("[{}] {}", i + 1, d.content))
        .collect::<Vec<_>>()
        .join("\n\n");
    vec![
        ChatMessage::system(
            "Answer using only the numbered context passages. Cite passages as [n]. \
             If the context does not contain the answer, say so.",
        ),
        ChatMessage::user(format!("Context:\n{context}\n\nQuestion: {question}")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_memory_core::models::DocumentSource;

    #[test]
    fn test_chunk_metadata_prefixes_document_keys() {
        let doc = Document::with_id("d1", "text")
            .with_metadata("title", json!("Runbook"))
            .with_source(DocumentSource {
                source_type: "file".into(),
                path: Some("/docs/runbook.md".into()),
                modified_at: None,
            });
        let meta = chunk_base_metadata(&doc, 3);
        assert_eq!(meta["doc_title"], json!("Runbook"));
        assert_eq!(meta["source_type"], json!("file"));
        assert_eq!(meta["source_path"], json!("/docs/runbook.md"));
        assert_eq!(meta["chunk_count"], json!(3));
        assert!(!meta.contains_key("title"));
    }

    #[test]
    fn test_answer_prompt_numbers_passages() {
        let docs = vec![Document::with_id("a", "first"), Document::with_id("b", "second")];
        let messages = answer_prompt("why?", &docs);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("[1] first"));
        assert!(messages[1].content.contains("[2] second"));
        assert!(messages[1].content.ends_with("Question: why?"));
    }

    #[test]
    fn test_request_defaults_from_json() {
        let ctx: ContextRequest = serde_json::from_str(r#"{"query":"q"}"#).unwrap();
        assert_eq!(ctx.max_documents, 5);
        assert!(ctx.include_relationships);
        assert!(!ctx.generate_summary);

        let search: SearchRequest =
            serde_json::from_str(r#"{"query":"q","filters":{"type":"note"},"sort":"date"}"#)
                .unwrap();
        assert_eq!(search.limit, 10);
        assert_eq!(search.filters["type"], json!("note"));

        let opts: IngestOptions = serde_json::from_str("{}").unwrap();
        assert!(opts.extract_relationships && opts.generate_summary);
    }

    #[tokio::test]
    async fn test_cancellable_prefers_cancellation() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let out = cancellable(&cancel, async { 1 }).await;
        assert!(matches!(out, Err(MemoryError::Cancelled)));

        let live = CancellationToken::new();
        assert_eq!(cancellable(&live, async { 2 }).await.unwrap(), 2);
    }
}
