//! # Context Memory
//!
//! Document memory for AI tools: documents are persisted, split into
//! overlapping word chunks, embedded for semantic search, and mined for
//! typed entity relationships. Queries come back as ranked documents plus
//! the relationships around them and an optional summary.
//!
//! ## Architecture
//!
//! ```text
//!                   ┌────────────────────┐
//!  CLI (ctxmem) ──▶ │ MemoryOrchestrator │ ◀── HTTP (axum)
//!                   └─────────┬──────────┘
//!        ┌──────────────┬─────┴────────┬──────────────┐
//!        ▼              ▼              ▼              ▼
//!  ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//!  │ Document │   │  Vector  │   │  Graph   │   │ Language │
//!  │   repo   │   │  index   │   │  store   │   │  model   │
//!  └──────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! The stores are independent; the document repository decides whether
//! a document exists, and vector and graph entries are derived from it.
//!
//! ## Quick Start
//!
//! ```bash
//! ctxmem init                       # create database
//! ctxmem ingest-dir ./docs          # ingest markdown and text files
//! ctxmem search "deployment"        # semantic search
//! ctxmem context "deployment" --summary
//! ctxmem serve                      # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`orchestrator`] | Ingest, batch ingest, context, search, delete, statistics, readiness |
//! | [`config`] | TOML configuration parsing |
//! | [`sqlite_store`] | SQLite document repository, vector index and relationship graph |
//! | [`language`] | OpenAI-compatible and offline language models |
//! | [`server`] | HTTP API |
//! | [`metrics`] | Injected activity counters |
//! | [`connector_fs`] | Directory scanner |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod connector_fs;
pub mod db;
pub mod get;
pub mod ingest;
pub mod language;
pub mod metrics;
pub mod migrate;
pub mod orchestrator;
pub mod runtime;
pub mod search;
pub mod server;
pub mod sqlite_store;
pub mod stats;
