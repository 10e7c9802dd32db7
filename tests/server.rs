//! HTTP API tests against an in-process server backed by in-memory stores.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use context_memory::language::LocalLanguageModel;
use context_memory::orchestrator::{MemoryOrchestrator, OrchestratorParams};
use context_memory::server::build_router;
use context_memory_core::store::memory::{
    InMemoryDocumentRepository, InMemoryGraphStore, InMemoryVectorStore,
};

struct TestServer {
    base: String,
    graph: Arc<InMemoryGraphStore>,
    shutdown: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_server() -> TestServer {
    let language = Arc::new(LocalLanguageModel::new(64));
    let repo = Arc::new(InMemoryDocumentRepository::new());
    let vector = Arc::new(InMemoryVectorStore::new(language.clone()));
    let graph = Arc::new(InMemoryGraphStore::new());
    let orchestrator = Arc::new(MemoryOrchestrator::new(
        repo,
        vector,
        graph.clone(),
        language,
        OrchestratorParams::default(),
    ));

    let shutdown = CancellationToken::new();
    let app = build_router(orchestrator, shutdown.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let stop = shutdown.clone();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(stop.cancelled_owned())
            .await
            .unwrap();
    });

    TestServer {
        base: format!("http://{}", addr),
        graph,
        shutdown,
    }
}

async fn error_code(response: reqwest::Response) -> String {
    let body: Value = response.json().await.unwrap();
    body["error"]["code"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_reports_ready() {
    let server = start_server().await;
    let response = reqwest::get(format!("{}/health", server.base)).await.unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ready");
    assert_eq!(body["components"]["graph_store"], true);
}

#[tokio::test]
async fn test_unhealthy_store_gates_operations() {
    let server = start_server().await;
    server.graph.set_healthy(false);
    let client = reqwest::Client::new();

    let health = client
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(health.status(), 503);
    let body: Value = health.json().await.unwrap();
    assert_eq!(body["status"], "not_ready");

    let search = client
        .post(format!("{}/search", server.base))
        .json(&json!({ "query": "anything" }))
        .send()
        .await
        .unwrap();
    assert_eq!(search.status(), 503);
    assert_eq!(error_code(search).await, "not_ready");
}

#[tokio::test]
async fn test_document_lifecycle() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let ingest = client
        .post(format!("{}/documents", server.base))
        .json(&json!({
            "id": "runbook",
            "content": "Restart the ingest worker before rotating the database credentials.",
            "metadata": { "type": "runbook" }
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(ingest.status(), 200);
    let result: Value = ingest.json().await.unwrap();
    assert_eq!(result["document_id"], "runbook");
    assert_eq!(result["status"], "completed");
    assert_eq!(result["chunks_created"], 1);

    let fetched: Value = client
        .get(format!("{}/documents/runbook", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched["id"], "runbook");
    assert_eq!(fetched["metadata"]["type"], "runbook");

    let search: Value = client
        .post(format!("{}/search", server.base))
        .json(&json!({ "query": "rotating database credentials", "filters": { "type": "runbook" } }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(search["results"][0]["document"]["id"], "runbook");

    let deleted = client
        .delete(format!("{}/documents/runbook", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), 200);
    let body: Value = deleted.json().await.unwrap();
    assert_eq!(body["deleted"], true);

    let missing = client
        .get(format!("{}/documents/runbook", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);
    assert_eq!(error_code(missing).await, "not_found");

    let again = client
        .delete(format!("{}/documents/runbook", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn test_batch_ingest_and_stats() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let batch: Value = client
        .post(format!("{}/documents/batch", server.base))
        .json(&json!({
            "documents": [
                { "id": "a", "content": "alpha notes" },
                { "id": "b", "content": "beta notes" }
            ],
            "options": { "generate_summary": false }
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(batch["successful_documents"], 2);
    assert_eq!(batch["failed_documents"], 0);

    let stats: Value = client
        .get(format!("{}/stats", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["statistics"]["total_documents"], 2);
    assert_eq!(stats["statistics"]["total_vectors"], 2);
    assert_eq!(stats["counters"]["documents_ingested"], 2);
}

#[tokio::test]
async fn test_invalid_requests_are_rejected() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let empty_query = client
        .post(format!("{}/context", server.base))
        .json(&json!({ "query": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty_query.status(), 400);
    assert_eq!(error_code(empty_query).await, "bad_request");

    let bad_limit = client
        .post(format!("{}/search", server.base))
        .json(&json!({ "query": "q", "limit": 0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_limit.status(), 400);

    let bad_chunk = client
        .post(format!("{}/documents", server.base))
        .json(&json!({ "content": "text", "options": { "chunk_size": 50 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_chunk.status(), 400);

    // Overlap alone still has to fit under the default chunk size.
    let overlap_only = client
        .post(format!("{}/documents", server.base))
        .json(&json!({ "content": "text", "options": { "overlap": 600 } }))
        .send()
        .await
        .unwrap();
    assert_eq!(overlap_only.status(), 400);
    assert_eq!(error_code(overlap_only).await, "bad_request");

    let empty_batch = client
        .post(format!("{}/documents/batch", server.base))
        .json(&json!({ "documents": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(empty_batch.status(), 400);

    let malformed = client
        .post(format!("{}/documents", server.base))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), 400);
    assert_eq!(error_code(malformed).await, "bad_request");
}
