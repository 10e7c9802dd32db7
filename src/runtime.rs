//! Wires a [`MemoryOrchestrator`] from configuration.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::config::Config;
use crate::db;
use crate::language::create_language_model;
use crate::migrate::apply_schema;
use crate::orchestrator::MemoryOrchestrator;
use crate::sqlite_store::{SqliteDocumentRepository, SqliteGraphStore, SqliteVectorStore};

/// Open the SQLite stores and language model named in `config`.
///
/// The schema is applied on open, so `ctxmem init` is optional.
pub async fn open_orchestrator(config: &Config) -> Result<MemoryOrchestrator> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;

    let language = create_language_model(&config.language)?;
    info!(
        db = %config.db.path.display(),
        provider = %config.language.provider,
        model = language.model_name(),
        "memory stores opened"
    );

    Ok(MemoryOrchestrator::new(
        Arc::new(SqliteDocumentRepository::new(pool.clone())),
        Arc::new(SqliteVectorStore::new(pool.clone(), language.clone())),
        Arc::new(SqliteGraphStore::new(pool)),
        language,
        config.orchestrator_params(),
    ))
}
