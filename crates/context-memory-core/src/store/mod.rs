//! Storage contracts for Context Memory.
//!
//! Three independent backing stores sit behind the orchestrator:
//!
//! - a [`DocumentRepository`], the source of truth for document existence;
//! - a [`VectorStore`], holding chunk embeddings for similarity search;
//! - a [`GraphStore`], holding typed relationships owned by documents.
//!
//! There is no transaction spanning them. Vector and graph entries are
//! derived from repository documents and may lag behind or outlive them.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::RepositoryError;
use crate::models::{Direction, Document, Metadata, Relationship, VectorMatch};

/// Durable keyed document store.
///
/// Concurrent writes to the same id are last-write-wins.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create`](DocumentRepository::create) | Insert; fails if the id exists |
/// | [`update`](DocumentRepository::update) | Replace; fails if the id is missing |
/// | [`save`](DocumentRepository::save) | Upsert |
/// | [`get`](DocumentRepository::get) / [`get_many`](DocumentRepository::get_many) | Lookup by id |
/// | [`get_all`](DocumentRepository::get_all) | Paged listing ordered by creation time |
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn create(&self, document: &Document) -> Result<Document, RepositoryError>;

    async fn update(&self, document: &Document) -> Result<Document, RepositoryError>;

    /// Insert or replace. Saving the same document twice leaves one copy.
    async fn save(&self, document: &Document) -> Result<Document, RepositoryError>;

    async fn get(&self, id: &str) -> Result<Option<Document>, RepositoryError>;

    /// Fetch the documents that exist among `ids`, in `ids` order.
    /// Missing ids are skipped.
    async fn get_many(&self, ids: &[String]) -> Result<Vec<Document>, RepositoryError>;

    async fn get_all(&self, skip: usize, take: usize) -> Result<Vec<Document>, RepositoryError>;

    /// Returns `false` if nothing was deleted.
    async fn delete(&self, id: &str) -> Result<bool, RepositoryError>;

    async fn count(&self) -> Result<u64, RepositoryError>;

    async fn exists(&self, id: &str) -> Result<bool, RepositoryError>;

    async fn is_healthy(&self) -> bool;
}

/// Semantic index over document chunks.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Embed `text` and store it under `document_id`.
    ///
    /// When `metadata` carries a `chunk_index`, the entry is keyed by
    /// `(document_id, chunk_index)` and replaces any earlier entry for that
    /// chunk. Returns the number of entries written.
    async fn store_embeddings(
        &self,
        document_id: &str,
        text: &str,
        metadata: &Metadata,
    ) -> Result<usize>;

    /// Ranked matches with `score >= min_score`, at most `limit`, best first.
    async fn search(&self, query: &str, limit: usize, min_score: f64) -> Result<Vec<VectorMatch>>;

    /// Remove every entry of a document; returns how many were removed.
    async fn delete_embeddings(&self, document_id: &str) -> Result<usize>;

    async fn vector_count(&self) -> Result<u64>;

    async fn is_healthy(&self) -> bool;
}

/// Typed relationship graph.
///
/// An edge is identified by `(source, target, type)`; storing an edge with
/// an existing identity replaces it.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn store_relationship(&self, relationship: &Relationship) -> Result<()>;

    /// Returns the number of edges written.
    async fn store_relationships(&self, relationships: &[Relationship]) -> Result<usize> {
        for relationship in relationships {
            self.store_relationship(relationship).await?;
        }
        Ok(relationships.len())
    }

    /// Edges touching `entity` in `direction`.
    async fn find_relationships(
        &self,
        entity: &str,
        direction: Direction,
    ) -> Result<Vec<Relationship>>;

    /// Edges owned by `document_id`, i.e. extracted from that document.
    async fn find_relationships_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<Relationship>>;

    /// Remove every edge owned by `document_id`; returns how many were removed.
    async fn delete_relationships(&self, document_id: &str) -> Result<usize>;

    async fn relationship_count(&self) -> Result<u64>;

    async fn is_healthy(&self) -> bool;
}

/// Read the `chunk_index` a caller attached to vector metadata.
pub fn metadata_chunk_index(metadata: &Metadata) -> Option<usize> {
    metadata
        .get("chunk_index")
        .and_then(|v| v.as_u64())
        .map(|v| v as usize)
}
