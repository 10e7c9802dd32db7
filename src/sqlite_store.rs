//! SQLite-backed stores.
//!
//! One database file holds all three stores in separate tables
//! (`documents`, `chunk_vectors`, `relationships`). Each store owns a
//! clone of the same [`SqlitePool`]; nothing spans tables in a
//! transaction, matching the independence the orchestrator assumes.
//!
//! Vector search is brute-force cosine similarity over every stored
//! embedding, like the in-memory store.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Row, Sqlite, SqlitePool};

use context_memory_core::chunk::{chunk_key, content_hash};
use context_memory_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use context_memory_core::error::RepositoryError;
use context_memory_core::language::LanguageModel;
use context_memory_core::models::{
    Direction, Document, DocumentSource, Metadata, Relationship, VectorMatch,
};
use context_memory_core::store::{
    metadata_chunk_index, DocumentRepository, GraphStore, VectorStore,
};

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn parse_metadata(raw: &str) -> Metadata {
    serde_json::from_str(raw).unwrap_or_default()
}

fn metadata_json(metadata: &Metadata) -> String {
    serde_json::to_string(metadata).unwrap_or_else(|_| "{}".to_string())
}

async fn ping(pool: &SqlitePool) -> bool {
    sqlx::query("SELECT 1").execute(pool).await.is_ok()
}

// ============ Documents ============

pub struct SqliteDocumentRepository {
    pool: SqlitePool,
}

impl SqliteDocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn write(&self, document: &Document, upsert: bool) -> Result<(), sqlx::Error> {
        let conflict = if upsert {
            r#"ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                metadata_json = excluded.metadata_json,
                source_type = excluded.source_type,
                source_path = excluded.source_path,
                source_modified_at = excluded.source_modified_at"#
        } else {
            ""
        };
        let sql = format!(
            r#"
            INSERT INTO documents (id, content, metadata_json, source_type, source_path,
                                   source_modified_at, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            {conflict}
            "#
        );
        sqlx::query(&sql)
            .bind(&document.id)
            .bind(&document.content)
            .bind(metadata_json(&document.metadata))
            .bind(&document.source.source_type)
            .bind(&document.source.path)
            .bind(document.source.modified_at.as_ref().map(format_ts))
            .bind(format_ts(&document.created_at))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_document(row: &SqliteRow) -> Document {
    let created_at: String = row.get("created_at");
    let modified_at: Option<String> = row.get("source_modified_at");
    let metadata: String = row.get("metadata_json");
    Document {
        id: row.get("id"),
        content: row.get("content"),
        metadata: parse_metadata(&metadata),
        source: DocumentSource {
            source_type: row.get("source_type"),
            path: row.get("source_path"),
            modified_at: modified_at.as_deref().and_then(parse_ts),
        },
        created_at: parse_ts(&created_at).unwrap_or_else(Utc::now),
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, content, metadata_json, source_type, source_path, source_modified_at, created_at";

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn create(&self, document: &Document) -> Result<Document, RepositoryError> {
        if self.exists(&document.id).await? {
            return Err(RepositoryError::AlreadyExists {
                id: document.id.clone(),
            });
        }
        self.write(document, false)
            .await
            .map_err(|e| RepositoryError::backend(&document.id, e))?;
        Ok(document.clone())
    }

    async fn update(&self, document: &Document) -> Result<Document, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET content = ?, metadata_json = ?, source_type = ?, source_path = ?,
                source_modified_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&document.content)
        .bind(metadata_json(&document.metadata))
        .bind(&document.source.source_type)
        .bind(&document.source.path)
        .bind(document.source.modified_at.as_ref().map(format_ts))
        .bind(&document.id)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::backend(&document.id, e))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound {
                id: document.id.clone(),
            });
        }
        Ok(document.clone())
    }

    async fn save(&self, document: &Document) -> Result<Document, RepositoryError> {
        self.write(document, true)
            .await
            .map_err(|e| RepositoryError::backend(&document.id, e))?;
        Ok(document.clone())
    }

    async fn get(&self, id: &str) -> Result<Option<Document>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepositoryError::backend(id, e))?;
        Ok(row.as_ref().map(row_to_document))
    }

    async fn get_many(&self, ids: &[String]) -> Result<Vec<Document>, RepositoryError> {
        let mut documents = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(document) = self.get(id).await? {
                documents.push(document);
            }
        }
        Ok(documents)
    }

    async fn get_all(&self, skip: usize, take: usize) -> Result<Vec<Document>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents ORDER BY created_at ASC, id ASC LIMIT ? OFFSET ?"
        ))
        .bind(take as i64)
        .bind(skip as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepositoryError::backend("*", e))?;
        Ok(rows.iter().map(row_to_document).collect())
    }

    async fn delete(&self, id: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::backend(id, e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<u64, RepositoryError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::backend("*", e))?;
        Ok(count as u64)
    }

    async fn exists(&self, id: &str) -> Result<bool, RepositoryError> {
        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| RepositoryError::backend(id, e))?;
        Ok(found > 0)
    }

    async fn is_healthy(&self) -> bool {
        ping(&self.pool).await
    }
}

// ============ Vectors ============

/// Chunk embeddings in the `chunk_vectors` table, embedded through the
/// injected language model.
pub struct SqliteVectorStore {
    pool: SqlitePool,
    embedder: Arc<dyn LanguageModel>,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool, embedder: Arc<dyn LanguageModel>) -> Self {
        Self { pool, embedder }
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn store_embeddings(
        &self,
        document_id: &str,
        text: &str,
        metadata: &Metadata,
    ) -> Result<usize> {
        let vector = self.embedder.generate_embedding(text).await?;
        let chunk_index = metadata_chunk_index(metadata);
        let key = match chunk_index {
            Some(index) => chunk_key(document_id, index),
            None => content_hash(&format!("{document_id}:{text}")),
        };

        sqlx::query(
            r#"
            INSERT INTO chunk_vectors (id, document_id, chunk_index, content, metadata_json, embedding)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                document_id = excluded.document_id,
                chunk_index = excluded.chunk_index,
                content = excluded.content,
                metadata_json = excluded.metadata_json,
                embedding = excluded.embedding
            "#,
        )
        .bind(&key)
        .bind(document_id)
        .bind(chunk_index.map(|i| i as i64))
        .bind(text)
        .bind(metadata_json(metadata))
        .bind(vec_to_blob(&vector))
        .execute(&self.pool)
        .await?;

        Ok(1)
    }

    async fn search(&self, query: &str, limit: usize, min_score: f64) -> Result<Vec<VectorMatch>> {
        let query_vec = self.embedder.generate_embedding(query).await?;
        let rows = sqlx::query("SELECT document_id, content, metadata_json, embedding FROM chunk_vectors")
            .fetch_all(&self.pool)
            .await?;

        let mut matches: Vec<VectorMatch> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let metadata: String = row.get("metadata_json");
                VectorMatch {
                    document_id: row.get("document_id"),
                    content: row.get("content"),
                    score: cosine_similarity(&query_vec, &blob_to_vec(&blob)),
                    metadata: parse_metadata(&metadata),
                }
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
        let result = sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn vector_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn is_healthy(&self) -> bool {
        ping(&self.pool).await
    }
}

// ============ Relationships ============

pub struct SqliteGraphStore {
    pool: SqlitePool,
}

impl SqliteGraphStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Edges are unique by `(source, target, rel_type)`; a re-stored edge takes
/// the newer confidence, owner and metadata.
const UPSERT_RELATIONSHIP: &str = r#"
    INSERT INTO relationships (source, target, rel_type, confidence, document_id, metadata_json)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT(source, target, rel_type) DO UPDATE SET
        confidence = excluded.confidence,
        document_id = excluded.document_id,
        metadata_json = excluded.metadata_json
"#;

const RELATIONSHIP_COLUMNS: &str =
    "source, target, rel_type, confidence, document_id, metadata_json";

fn bind_relationship<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    relationship: &'q Relationship,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    query
        .bind(&relationship.source)
        .bind(&relationship.target)
        .bind(&relationship.relationship_type)
        .bind(relationship.confidence)
        .bind(&relationship.document_id)
        .bind(metadata_json(&relationship.metadata))
}

fn row_to_relationship(row: &SqliteRow) -> Relationship {
    let metadata: String = row.get("metadata_json");
    Relationship {
        source: row.get("source"),
        target: row.get("target"),
        relationship_type: row.get("rel_type"),
        confidence: row.get("confidence"),
        document_id: row.get("document_id"),
        metadata: parse_metadata(&metadata),
    }
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn store_relationship(&self, relationship: &Relationship) -> Result<()> {
        bind_relationship(sqlx::query(UPSERT_RELATIONSHIP), relationship)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn store_relationships(&self, relationships: &[Relationship]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        for relationship in relationships {
            bind_relationship(sqlx::query(UPSERT_RELATIONSHIP), relationship)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(relationships.len())
    }

    async fn find_relationships(
        &self,
        entity: &str,
        direction: Direction,
    ) -> Result<Vec<Relationship>> {
        let filter = match direction {
            Direction::Outgoing => "source = ?1",
            Direction::Incoming => "target = ?1",
            Direction::Both => "source = ?1 OR target = ?1",
        };
        let rows = sqlx::query(&format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM relationships WHERE {filter} \
             ORDER BY confidence DESC, source, target"
        ))
        .bind(entity)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_relationship).collect())
    }

    async fn find_relationships_for_document(
        &self,
        document_id: &str,
    ) -> Result<Vec<Relationship>> {
        let rows = sqlx::query(&format!(
            "SELECT {RELATIONSHIP_COLUMNS} FROM relationships WHERE document_id = ? \
             ORDER BY confidence DESC, source, target"
        ))
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_relationship).collect())
    }

    async fn delete_relationships(&self, document_id: &str) -> Result<usize> {
        let result = sqlx::query("DELETE FROM relationships WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn relationship_count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM relationships")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn is_healthy(&self) -> bool {
        ping(&self.pool).await
    }
}
