//! Activity counters for the memory orchestrator.
//!
//! Counters live in an explicit [`MemoryCounters`] object that is handed to
//! the orchestrator at construction, so separate orchestrators (and tests)
//! never share state.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct MemoryCounters {
    documents_ingested: AtomicU64,
    documents_failed: AtomicU64,
    chunks_stored: AtomicU64,
    relationships_stored: AtomicU64,
    enrichment_failures: AtomicU64,
    context_requests: AtomicU64,
    searches: AtomicU64,
    documents_deleted: AtomicU64,
}

/// Point-in-time copy of [`MemoryCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub documents_ingested: u64,
    pub documents_failed: u64,
    pub chunks_stored: u64,
    pub relationships_stored: u64,
    pub enrichment_failures: u64,
    pub context_requests: u64,
    pub searches: u64,
    pub documents_deleted: u64,
}

fn bump(counter: &AtomicU64, by: u64) {
    counter.fetch_add(by, Ordering::Relaxed);
}

impl MemoryCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_ingested(&self, chunks: usize, relationships: usize) {
        bump(&self.documents_ingested, 1);
        bump(&self.chunks_stored, chunks as u64);
        bump(&self.relationships_stored, relationships as u64);
    }

    pub fn record_ingest_failure(&self) {
        bump(&self.documents_failed, 1);
    }

    pub fn record_enrichment_failure(&self) {
        bump(&self.enrichment_failures, 1);
    }

    pub fn record_context_request(&self) {
        bump(&self.context_requests, 1);
    }

    pub fn record_search(&self) {
        bump(&self.searches, 1);
    }

    pub fn record_deleted(&self) {
        bump(&self.documents_deleted, 1);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CounterSnapshot {
            documents_ingested: load(&self.documents_ingested),
            documents_failed: load(&self.documents_failed),
            chunks_stored: load(&self.chunks_stored),
            relationships_stored: load(&self.relationships_stored),
            enrichment_failures: load(&self.enrichment_failures),
            context_requests: load(&self.context_requests),
            searches: load(&self.searches),
            documents_deleted: load(&self.documents_deleted),
        }
    }
}
