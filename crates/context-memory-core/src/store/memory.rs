//! In-memory store implementations for tests and embedded use.
//!
//! - [`InMemoryDocumentRepository`] keeps documents in a `DashMap`.
//! - [`InMemoryVectorStore`] embeds through an injected [`LanguageModel`]
//!   and runs brute-force cosine search.
//! - [`InMemoryGraphStore`] keeps edges in a `Vec` behind a `RwLock`.
//!
//! Every store has a health toggle so readiness handling can be exercised
//! without a real outage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;

use crate::chunk::{chunk_key, content_hash};
use crate::embedding::cosine_similarity;
use crate::error::RepositoryError;
use crate::language::LanguageModel;
use crate::models::{Direction, Document, Metadata, Relationship, VectorMatch};

use super::{metadata_chunk_index, DocumentRepository, GraphStore, VectorStore};

/// In-memory document repository.
pub struct InMemoryDocumentRepository {
    docs: DashMap<String, Document>,
    healthy: AtomicBool,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self {
            docs: DashMap::new(),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

impl Default for InMemoryDocumentRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn create(&self, document: &Document) -> Result<Document, RepositoryError> {
        match self.docs.entry(document.id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(RepositoryError::AlreadyExists {
                id: document.id.clone(),
            }),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(document.clone());
                Ok(document.clone())
            }
        }
    }

    async fn update(&self, document: &Document) -> Result<Document, RepositoryError> {
        match self.docs.get_mut(&document.id) {
            Some(mut existing) => {
                *existing = document.clone();
                Ok(document.clone())
            }
            None => Err(RepositoryError::NotFound {
                id: document.id.clone(),
            }),
        }
    }

    async fn save(&self, document: &Document) -> Result<Document, RepositoryError> {
        self.docs.insert(document.id.clone(), document.clone());
        Ok(document.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, RepositoryError> {
        Ok(self.docs.get(id).map(|d| d.value().clone()))
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<Document>, RepositoryError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.docs.get(id).map(|d| d.value().clone()))
            .collect())
    }

    async fn get_all(&self, skip: usize, take: usize) -> Result<Vec<Document>, RepositoryError> {
        let mut all: Vec<Document> = self.docs.iter().map(|d| d.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(all.into_iter().skip(skip).take(take).collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        Ok(self.docs.remove(id).is_some())
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        Ok(self.docs.len() as u64)
    }

    async fn exists(&self, id: &str) -> Result<bool, RepositoryError> {
        Ok(self.docs.contains_key(id))
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

struct StoredVector {
    key: String,
    document_id: String,
    content: String,
    metadata: Metadata,
    vector: Vec<f32>,
}

/// In-memory vector index.
pub struct InMemoryVectorStore {
    embedder: Arc<dyn LanguageModel>,
    vectors: RwLock<Vec<StoredVector>>,
    healthy: AtomicBool,
}

impl InMemoryVectorStore {
    pub fn new(embedder: Arc<dyn LanguageModel>) -> Self {
        Self {
            embedder,
            vectors: RwLock::new(Vec::new()),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn store_embeddings(
        &self,
        document_id: &str,
        text: &str,
        metadata: &Metadata,
    ) -> Result<usize> {
        let vector = self.embedder.generate_embedding(text).await?;
        let key = match metadata_chunk_index(metadata) {
            Some(index) => chunk_key(document_id, index),
            None => content_hash(&format!("{document_id}:{text}")),
        };

        let mut vectors = self.vectors.write();
        vectors.retain(|v| v.key != key);
        vectors.push(StoredVector {
            key,
            document_id: document_id.to_string(),
            content: text.to_string(),
            metadata: metadata.clone(),
            vector,
        });
        Ok(1)
    }

    async fn search(&self, query: &str, limit: usize, min_score: f64) -> Result<Vec<VectorMatch>> {
        let query_vec = self.embedder.generate_embedding(query).await?;
        let vectors = self.vectors.read();
        let mut matches: Vec<VectorMatch> = vectors
            .iter()
            .map(|v| VectorMatch {
                document_id: v.document_id.clone(),
                content: v.content.clone(),
                score: cosine_similarity(&query_vec, &v.vector),
                metadata: v.metadata.clone(),
            })
            .filter(|m| m.score >= min_score)
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(limit);
        Ok(matches)
    }

    async fn delete_embeddings(&self, document_id: &str) -> Result<usize> {
        let mut vectors = self.vectors.write();
        let before = vectors.len();
        vectors.retain(|v| v.document_id != document_id);
        Ok(before - vectors.len())
    }

    async fn vector_count(&self) -> Result<u64> {
        Ok(self.vectors.read().len() as u64)
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

/// In-memory relationship graph.
pub struct InMemoryGraphStore {
    edges: RwLock<Vec<Relationship>>,
    healthy: AtomicBool,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            edges: RwLock::new(Vec::new()),
            healthy: AtomicBool::new(true),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn store_relationship(&self, relationship: &Relationship) -> Result<()> {
        let mut edges = self.edges.write();
        match edges.iter_mut().find(|e| e.key() == relationship.key()) {
            Some(existing) => *existing = relationship.clone(),
            None => edges.push(relationship.clone()),
        }
        Ok(())
    }

    async fn find_relationships(
        &self,
        entity: &str,
        direction: Direction,
    ) -> Result<Vec<Relationship>> {
        Ok(self
            .edges
            .read()
            .iter()
            .filter(|e| e.touches(entity, direction))
            .cloned()
            .collect())
    }

    async fn find_relationships_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<Relationship>> {
        Ok(self
            .edges
            .read()
            .iter()
            .filter(|e| e.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn delete_relationships(&self, document_id: &str) -> Result<usize> {
        let mut edges = self.edges.write();
        let before = edges.len();
        edges.retain(|e| e.document_id != document_id);
        Ok(before - edges.len())
    }

    async fn relationship_count(&self) -> Result<u64> {
        Ok(self.edges.read().len() as u64)
    }

    async fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::CompletionStream;
    use crate::models::{ChatMessage, ExtractedRelationship};
    use serde_json::json;

    /// Embeds text as `[len("alpha" hits), len("beta" hits), 1]`.
    struct KeywordEmbedder;

    #[async_trait]
    impl LanguageModel for KeywordEmbedder {
        fn model_name(&self) -> &str {
            "keyword"
        }
        async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
            let alpha = text.matches("alpha").count() as f32;
            let beta = text.matches("beta").count() as f32;
            Ok(vec![alpha, beta, 0.1])
        }
        async fn generate_chat_completion(&self, _: &[ChatMessage]) -> Result<String> {
            anyhow::bail!("unsupported")
        }
        async fn stream_chat_completion(&self, _: &[ChatMessage]) -> Result<CompletionStream> {
            anyhow::bail!("unsupported")
        }
        async fn generate_summary(&self, text: &str, _: usize) -> Result<String> {
            Ok(text.to_string())
        }
        async fn extract_relationships(&self, _: &str) -> Result<Vec<ExtractedRelationship>> {
            Ok(Vec::new())
        }
        async fn is_healthy(&self) -> bool {
            true
        }
    }

    fn chunk_meta(index: usize) -> Metadata {
        let mut m = Metadata::new();
        m.insert("chunk_index".into(), json!(index));
        m
    }

    #[tokio::test]
    async fn test_save_is_upsert() {
        let repo = InMemoryDocumentRepository::new();
        let doc = Document::with_id("d1", "same content");
        repo.save(&doc).await.unwrap();
        repo.save(&doc).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.exists("d1").await.unwrap());
    }

    #[tokio::test]
    async fn test_create_and_update_guard_existence() {
        let repo = InMemoryDocumentRepository::new();
        let doc = Document::with_id("d1", "v1");
        repo.create(&doc).await.unwrap();
        let err = repo.create(&doc).await.unwrap_err();
        assert!(matches!(err, RepositoryError::AlreadyExists { ref id } if id == "d1"));

        let missing = Document::with_id("d2", "v1");
        let err = repo.update(&missing).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { ref id } if id == "d2"));

        let mut changed = doc.clone();
        changed.content = "v2".into();
        repo.update(&changed).await.unwrap();
        assert_eq!(repo.get("d1").await.unwrap().unwrap().content, "v2");
    }

    #[tokio::test]
    async fn test_get_many_skips_missing_and_keeps_order() {
        let repo = InMemoryDocumentRepository::new();
        for id in ["a", "b", "c"] {
            repo.save(&Document::with_id(id, id)).await.unwrap();
        }
        let ids: Vec<String> = ["c", "zz", "a"].iter().map(|s| s.to_string()).collect();
        let docs = repo.get_many(&ids).await.unwrap();
        let got: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(got, vec!["c", "a"]);

        assert!(repo.delete("a").await.unwrap());
        assert!(!repo.delete("a").await.unwrap());
        assert_eq!(repo.get_all(0, 10).await.unwrap().len(), 2);
        assert_eq!(repo.get_all(1, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_vector_search_ranks_and_filters() {
        let store = InMemoryVectorStore::new(Arc::new(KeywordEmbedder));
        store.store_embeddings("d1", "alpha alpha", &chunk_meta(0)).await.unwrap();
        store.store_embeddings("d2", "beta", &chunk_meta(0)).await.unwrap();
        store.store_embeddings("d3", "alpha beta", &chunk_meta(0)).await.unwrap();

        let hits = store.search("alpha", 10, 0.5).await.unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.document_id.as_str()).collect();
        assert_eq!(ids, vec!["d1", "d3"]);
        assert!(hits[0].score >= hits[1].score);

        let top = store.search("alpha", 1, 0.0).await.unwrap();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn test_vector_reingest_replaces_chunk() {
        let store = InMemoryVectorStore::new(Arc::new(KeywordEmbedder));
        store.store_embeddings("d1", "alpha", &chunk_meta(0)).await.unwrap();
        store.store_embeddings("d1", "alpha", &chunk_meta(0)).await.unwrap();
        store.store_embeddings("d1", "beta", &chunk_meta(1)).await.unwrap();
        assert_eq!(store.vector_count().await.unwrap(), 2);
        assert_eq!(store.delete_embeddings("d1").await.unwrap(), 2);
        assert_eq!(store.vector_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_graph_uniqueness_and_directions() {
        let graph = InMemoryGraphStore::new();
        let edge = |s: &str, t: &str, c: f64, doc: &str| Relationship {
            source: s.into(),
            target: t.into(),
            relationship_type: "depends_on".into(),
            confidence: c,
            document_id: doc.into(),
            metadata: Metadata::new(),
        };
        graph.store_relationship(&edge("a", "b", 0.4, "d1")).await.unwrap();
        graph.store_relationship(&edge("a", "b", 0.9, "d1")).await.unwrap();
        graph.store_relationship(&edge("c", "a", 0.7, "d2")).await.unwrap();
        assert_eq!(graph.relationship_count().await.unwrap(), 2);

        let out = graph.find_relationships("a", Direction::Outgoing).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, 0.9);
        let both = graph.find_relationships("a", Direction::Both).await.unwrap();
        assert_eq!(both.len(), 2);

        let owned = graph.find_relationships_for_document("d2").await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].source, "c");
        assert!(graph
            .find_relationships_for_document("a")
            .await
            .unwrap()
            .is_empty());

        assert_eq!(graph.delete_relationships("d1").await.unwrap(), 1);
        assert_eq!(graph.relationship_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_health_toggles() {
        let repo = InMemoryDocumentRepository::new();
        assert!(repo.is_healthy().await);
        repo.set_healthy(false);
        assert!(!repo.is_healthy().await);
    }
}
