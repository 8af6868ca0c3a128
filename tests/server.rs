//! HTTP API tests: the router is served in-process on an ephemeral port and
//! exercised with reqwest.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::{harness, write_corpus, FakeEmbedder, FakeLlm};
use docqa::config::Config;
use docqa::server::{router, AppState};
use serde_json::{json, Value};
use tempfile::TempDir;

struct TestServer {
    base: String,
    embedder: Arc<FakeEmbedder>,
    llm: Arc<FakeLlm>,
    handle: tokio::task::JoinHandle<()>,
    _tmp: TempDir,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn start_server(with_docs: bool) -> TestServer {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    if with_docs {
        write_corpus(&docs);
    }

    let mut config = Config::default();
    config.paths.documents_dir = docs;
    config.chunking.chunk_size = 100;
    config.chunking.chunk_overlap = 20;

    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;
    let app = router(AppState {
        config: Arc::new(config),
        service: h.service,
    });
    let (embedder, llm) = (h.embedder, h.llm);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    TestServer {
        base: format!("http://127.0.0.1:{}", port),
        embedder,
        llm,
        handle,
        _tmp: tmp,
    }
}

fn assert_error(body: &Value, code: &str) {
    assert_eq!(body["error"]["code"], code, "body: {}", body);
    assert!(
        body["error"]["message"].as_str().is_some_and(|m| !m.is_empty()),
        "error message missing: {}",
        body
    );
}

#[tokio::test]
async fn test_root_reports_status() {
    let server = start_server(false).await;
    let resp = reqwest::get(format!("{}/", server.base)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "running");
    assert_eq!(body["indexed_documents"], 0);
    assert!(body["version"].is_string());
    assert!(body["timestamp"].is_string());
}

#[tokio::test]
async fn test_index_query_and_history_flow() {
    let server = start_server(true).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/index", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "completed");
    assert_eq!(body["total_chunks"], 45);
    assert_eq!(
        body["processed_files"],
        json!(["guides/payroll.txt", "vpn.txt", "zebra.txt"])
    );

    let resp = client
        .post(format!("{}/query", server.base))
        .json(&json!({"user_id": "alice", "query": "How do I connect to the VPN?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], "answer to: How do I connect to the VPN?");
    assert_eq!(body["conversation_id"], "alice");
    let docs = body["retrieved_documents"].as_array().unwrap();
    assert_eq!(docs.len(), 5);
    assert_eq!(docs[0]["metadata"]["source"], "vpn.txt");
    assert_eq!(docs[0]["metadata"]["file_type"], ".txt");
    assert!(docs[0]["content"].as_str().unwrap().chars().count() <= 203);
    let score = docs[0]["relevance_score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));

    let resp = client
        .get(format!("{}/history/alice", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let history: Value = resp.json().await.unwrap();
    let turns = history.as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[1]["role"], "assistant");

    let resp = client
        .get(format!("{}/stats", server.base))
        .send()
        .await
        .unwrap();
    let stats: Value = resp.json().await.unwrap();
    assert_eq!(stats["total_chunks"], 45);
    assert_eq!(stats["indexed_files"], 3);
    assert_eq!(stats["total_users"], 1);
    assert_eq!(stats["model"], "fake-chat");
    assert_eq!(stats["embedding_model"], "fake-embedding");
    assert_eq!(stats["max_history"], 10);

    let resp = client
        .delete(format!("{}/history/alice", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let history: Value = client
        .get(format!("{}/history/alice", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history, json!([]));
}

#[tokio::test]
async fn test_delete_document_and_clear_db() {
    let server = start_server(true).await;
    let client = reqwest::Client::new();
    client
        .post(format!("{}/index", server.base))
        .send()
        .await
        .unwrap();

    let resp = client
        .delete(format!("{}/documents/guides/payroll.txt", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["deleted_chunks"], 15);

    let resp = client
        .delete(format!("{}/clear-db", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let root: Value = reqwest::get(format!("{}/", server.base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(root["indexed_documents"], 0);
}

#[tokio::test]
async fn test_query_validation_errors() {
    let server = start_server(false).await;
    let client = reqwest::Client::new();
    let url = format!("{}/query", server.base);

    let resp = client
        .post(&url)
        .json(&json!({"user_id": "alice", "query": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_error(&resp.json().await.unwrap(), "bad_request");

    let resp = client
        .post(&url)
        .json(&json!({"query": "missing user"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_error(&resp.json().await.unwrap(), "bad_request");

    let resp = client
        .post(&url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_error(&resp.json().await.unwrap(), "bad_request");
}

#[tokio::test]
async fn test_index_missing_directory_is_bad_request() {
    let server = start_server(false).await;
    let resp = reqwest::Client::new()
        .post(format!("{}/index", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    assert_error(&resp.json().await.unwrap(), "bad_request");
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let server = start_server(false).await;
    let resp = reqwest::Client::new()
        .get(format!("{}/stats", server.base))
        .header("Origin", "http://example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
}

async fn history_len(client: &reqwest::Client, base: &str, user: &str) -> usize {
    let history: Value = client
        .get(format!("{}/history/{}", base, user))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    history.as_array().unwrap().len()
}

#[tokio::test]
async fn test_provider_failures_map_to_bad_gateway() {
    let server = start_server(false).await;
    let client = reqwest::Client::new();
    let url = format!("{}/query", server.base);

    let resp = client
        .post(&url)
        .json(&json!({"user_id": "alice", "query": "first"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(history_len(&client, &server.base, "alice").await, 2);

    server.llm.fail.store(true, Ordering::SeqCst);
    let resp = client
        .post(&url)
        .json(&json!({"user_id": "alice", "query": "second"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    assert_error(&resp.json().await.unwrap(), "generation_error");
    assert_eq!(history_len(&client, &server.base, "alice").await, 2);

    server.llm.fail.store(false, Ordering::SeqCst);
    server.embedder.fail.store(true, Ordering::SeqCst);
    let resp = client
        .post(&url)
        .json(&json!({"user_id": "alice", "query": "third"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 502);
    assert_error(&resp.json().await.unwrap(), "embedding_error");
    assert_eq!(history_len(&client, &server.base, "alice").await, 2);
}
