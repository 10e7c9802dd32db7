//! Core data models used throughout Context Memory.
//!
//! These types represent the documents, chunks, relationships, and
//! operation results that flow between the orchestrator, its backing
//! stores, and the transport layer. Everything serializes to snake_case
//! JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form document metadata.
///
/// Well-known keys are `title`, `type`, and `tags`; anything else is
/// carried through untouched and is available to search filters.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Where a document came from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSource {
    /// Origin kind, e.g. `"file"`, `"api"`, `"web"`.
    #[serde(rename = "type", default = "default_source_type")]
    pub source_type: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub modified_at: Option<DateTime<Utc>>,
}

fn default_source_type() -> String {
    "api".to_string()
}

/// A document as stored in the repository.
///
/// The repository is the only place that decides whether a document
/// exists; vector and graph entries are derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub source: DocumentSource,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Document {
    /// Create a document with a fresh UUID and the current timestamp.
    pub fn new(content: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), content)
    }

    pub fn with_id(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: Metadata::new(),
            source: DocumentSource {
                source_type: default_source_type(),
                path: None,
                modified_at: None,
            },
            created_at: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn with_source(mut self, source: DocumentSource) -> Self {
        self.source = source;
        self
    }

    pub fn title(&self) -> Option<&str> {
        self.metadata.get("title").and_then(|v| v.as_str())
    }

    pub fn tags(&self) -> Vec<&str> {
        self.metadata
            .get("tags")
            .and_then(|v| v.as_array())
            .map(|tags| tags.iter().filter_map(|t| t.as_str()).collect())
            .unwrap_or_default()
    }

    /// True when every filter key is present in the metadata with an
    /// exactly equal value. An empty filter matches everything.
    pub fn matches_filters(&self, filters: &Metadata) -> bool {
        filters
            .iter()
            .all(|(key, expected)| self.metadata.get(key) == Some(expected))
    }
}

/// A bounded span of a document's text, produced for independent embedding.
///
/// Chunks are never persisted as entities of their own; they are
/// regenerated from the content and chunking parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub parent_id: String,
    pub index: usize,
    pub text: String,
    /// SHA-256 of `text`.
    pub hash: String,
}

/// Edge direction used when querying the relationship graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A typed, confidence-scored directed edge owned by a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub relationship_type: String,
    pub confidence: f64,
    pub document_id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Relationship {
    /// Whether this edge touches `entity` in the given direction.
    pub fn touches(&self, entity: &str, direction: Direction) -> bool {
        match direction {
            Direction::Outgoing => self.source == entity,
            Direction::Incoming => self.target == entity,
            Direction::Both => self.source == entity || self.target == entity,
        }
    }

    /// The graph-level identity of an edge.
    pub fn key(&self) -> (&str, &str, &str) {
        (&self.source, &self.target, &self.relationship_type)
    }
}

/// A relationship as returned by the language model, before it is
/// attributed to a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRelationship {
    pub source: String,
    pub target: String,
    #[serde(rename = "type", alias = "relationship_type")]
    pub relationship_type: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub context: Option<String>,
}

fn default_confidence() -> f64 {
    0.5
}

impl ExtractedRelationship {
    pub fn into_relationship(self, document_id: &str) -> Relationship {
        let mut metadata = Metadata::new();
        if let Some(context) = self.context {
            metadata.insert("context".to_string(), serde_json::Value::String(context));
        }
        Relationship {
            source: self.source,
            target: self.target,
            relationship_type: self.relationship_type,
            confidence: self.confidence.clamp(0.0, 1.0),
            document_id: document_id.to_string(),
            metadata,
        }
    }
}

/// One ranked hit from the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub document_id: String,
    pub content: String,
    pub score: f64,
    #[serde(default)]
    pub metadata: Metadata,
}

/// A single message in a chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStatus {
    Completed,
    Failed,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionResult {
    pub document_id: String,
    pub status: IngestionStatus,
    pub chunks_created: usize,
    pub relationships_extracted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub processing_time_ms: u64,
    /// Failure description; only set on batch outcomes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestionResult {
    pub fn failed(document_id: impl Into<String>, error: String, processing_time_ms: u64) -> Self {
        Self {
            document_id: document_id.into(),
            status: IngestionStatus::Failed,
            chunks_created: 0,
            relationships_extracted: 0,
            summary: None,
            processing_time_ms,
            error: Some(error),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == IngestionStatus::Completed
    }
}

/// Aggregate outcome of a batch ingest. Results keep the input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchIngestionResult {
    pub results: Vec<IngestionResult>,
    pub successful_documents: usize,
    pub failed_documents: usize,
    /// Wall-clock time of the whole batch.
    pub processing_time_ms: u64,
}

impl BatchIngestionResult {
    pub fn from_results(results: Vec<IngestionResult>, processing_time_ms: u64) -> Self {
        let successful_documents = results.iter().filter(|r| r.is_completed()).count();
        let failed_documents = results.len() - successful_documents;
        Self {
            results,
            successful_documents,
            failed_documents,
            processing_time_ms,
        }
    }

    /// Turn a partially failed batch into [`MemoryError::BatchPartialFailure`].
    ///
    /// [`MemoryError::BatchPartialFailure`]: crate::error::MemoryError::BatchPartialFailure
    pub fn ensure_complete(self) -> Result<Self, crate::error::MemoryError> {
        if self.failed_documents == 0 {
            Ok(self)
        } else {
            Err(crate::error::MemoryError::BatchPartialFailure {
                failed: self.failed_documents,
                total: self.results.len(),
            })
        }
    }
}

/// Documents, relationships, and an optional summary relevant to a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextResponse {
    pub query: String,
    pub documents: Vec<Document>,
    pub relationships: Vec<Relationship>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub total_results: usize,
    pub processing_time_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub document: Document,
    /// Best chunk score seen for this document.
    pub score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub total_results: usize,
    pub processing_time_ms: u64,
}

/// Counts gathered from the three stores at call time.
///
/// `estimated_size_bytes` is a weighted estimate, not a measurement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryStatistics {
    pub total_documents: u64,
    pub total_vectors: u64,
    pub total_relationships: u64,
    pub estimated_size_bytes: u64,
    pub generated_at: DateTime<Utc>,
}

/// Per-collaborator readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    pub repository: bool,
    pub vector_store: bool,
    pub graph_store: bool,
    pub language_model: bool,
}

impl HealthReport {
    pub fn is_ready(&self) -> bool {
        self.repository && self.vector_store && self.graph_store && self.language_model
    }

    /// Names of the collaborators that reported unhealthy.
    pub fn unhealthy(&self) -> Vec<&'static str> {
        [
            ("repository", self.repository),
            ("vector_store", self.vector_store),
            ("graph_store", self.graph_store),
            ("language_model", self.language_model),
        ]
        .into_iter()
        .filter(|(_, healthy)| !healthy)
        .map(|(name, _)| name)
        .collect()
    }
}
