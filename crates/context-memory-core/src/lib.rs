//! # Context Memory Core
//!
//! Shared, I/O-free logic for Context Memory: data models, word chunking,
//! collaborator contracts (document repository, vector index, relationship
//! graph, language model), the error taxonomy, and in-memory reference
//! stores.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! Concrete backends and the memory orchestrator live in the
//! `context-memory` app crate.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod language;
pub mod models;
pub mod store;
