//! End-to-end tests of the indexing and query pipelines against a real
//! SQLite store and on-disk conversation memory, with fake providers.

mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{harness, text_of_len, write_corpus, FakeEmbedder};
use docqa::error::Error;
use docqa::memory::ConversationMemory;
use docqa::sqlite_store::SqliteVectorStore;
use docqa_core::models::Role;
use docqa_core::prompt::{ChatRole, NO_CONTEXT_NOTE};
use docqa_core::store::VectorStore;
use tempfile::TempDir;

#[tokio::test]
async fn test_index_reports_files_and_chunks() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);
    std::fs::write(docs.join("notes.md"), "# not indexed").unwrap();
    std::fs::write(docs.join(".hidden.txt"), "secret").unwrap();

    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;
    let stats = h.service.index_directory(&docs).await.unwrap();

    let files: Vec<&str> = stats.processed_files.iter().map(String::as_str).collect();
    assert_eq!(files, vec!["guides/payroll.txt", "vpn.txt", "zebra.txt"]);
    assert_eq!(stats.total_chunks, 45);
    assert_eq!(stats.skipped.len(), 1);
    assert_eq!(stats.skipped[0].filename, "notes.md");
    assert!(stats.skipped[0].reason.contains(".md"));

    let store_stats = h.service.store_stats().await.unwrap();
    assert_eq!(store_stats.total_chunks, 45);
    assert_eq!(store_stats.indexed_files, 3);
}

#[tokio::test]
async fn test_reindex_replaces_instead_of_duplicating() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);
    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;

    h.service.index_directory(&docs).await.unwrap();
    h.service.index_directory(&docs).await.unwrap();
    let stats = h.service.store_stats().await.unwrap();
    assert_eq!(stats.total_chunks, 45, "second run must not duplicate chunks");

    // Shrinking a file drops its stale trailing chunks.
    std::fs::write(docs.join("vpn.txt"), text_of_len("VPN moved. ", 90)).unwrap();
    let reindexed = h.service.index_directory(&docs).await.unwrap();
    assert_eq!(reindexed.total_chunks, 36);
    assert_eq!(h.service.store_stats().await.unwrap().total_chunks, 36);
}

#[tokio::test]
async fn test_failed_embedding_leaves_index_untouched() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);
    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;
    h.service.index_directory(&docs).await.unwrap();

    std::fs::write(docs.join("vpn.txt"), "replacement text").unwrap();
    h.embedder.fail.store(true, Ordering::SeqCst);
    let err = h.service.index_directory(&docs).await.unwrap_err();
    assert!(matches!(err, Error::Embedding(_)), "got {:?}", err);

    let stats = h.service.store_stats().await.unwrap();
    assert_eq!(stats.total_chunks, 45);
}

#[tokio::test]
async fn test_index_rejects_missing_or_empty_directories() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;

    let err = h
        .service
        .index_directory(&tmp.path().join("nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));

    let only_unsupported = tmp.path().join("misc");
    std::fs::create_dir_all(&only_unsupported).unwrap();
    std::fs::write(only_unsupported.join("data.csv"), "a,b\n1,2\n").unwrap();
    let err = h.service.index_directory(&only_unsupported).await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_index_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);
    let h = harness(
        tmp.path(),
        FakeEmbedder::slow(Duration::from_millis(300)),
        10,
    )
    .await;

    let (first, second) = tokio::join!(
        h.service.index_directory(&docs),
        h.service.index_directory(&docs)
    );
    assert_eq!(first.unwrap().total_chunks, 45);
    assert!(matches!(second, Err(Error::IndexInProgress)));

    // The lock is released once the first run finishes.
    assert!(h.service.index_directory(&docs).await.is_ok());
}

#[tokio::test]
async fn test_query_retrieves_relevant_chunks() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);
    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;
    h.service.index_directory(&docs).await.unwrap();

    let answer = h
        .service
        .answer("alice", "How do I connect to the corporate VPN?")
        .await
        .unwrap();

    assert_eq!(answer.answer, "answer to: How do I connect to the corporate VPN?");
    assert_eq!(answer.user_id, "alice");
    assert_eq!(answer.results.len(), 5);
    assert_eq!(answer.results[0].chunk.source_filename, "vpn.txt");
    for pair in answer.results.windows(2) {
        assert!(pair[0].similarity_score >= pair[1].similarity_score);
    }
    for r in &answer.results {
        assert!((0.0..=1.0).contains(&r.similarity_score));
    }

    let transcript = h.llm.last_transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, ChatRole::System);
    assert!(transcript[0].content.contains("(Source: vpn.txt"));
    assert_eq!(transcript[1].role, ChatRole::User);
}

#[tokio::test]
async fn test_history_feeds_follow_up_questions() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);
    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;
    h.service.index_directory(&docs).await.unwrap();

    assert!(h.service.history("bob").is_empty());
    h.service.answer("bob", "When does payroll run?").await.unwrap();

    let history = h.service.history("bob");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "When does payroll run?");
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "answer to: When does payroll run?");

    h.service.answer("bob", "And which day is that?").await.unwrap();
    let transcript = h.llm.last_transcript();
    let roles: Vec<ChatRole> = transcript.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            ChatRole::System,
            ChatRole::User,
            ChatRole::Assistant,
            ChatRole::User
        ]
    );
    assert_eq!(transcript[1].content, "When does payroll run?");

    // Other users do not see bob's conversation.
    assert!(h.service.history("carol").is_empty());
}

#[tokio::test]
async fn test_history_is_capped_at_max_history() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);
    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;
    h.service.index_directory(&docs).await.unwrap();

    for i in 1..=11 {
        h.service
            .answer("dave", &format!("question {}", i))
            .await
            .unwrap();
    }

    let history = h.service.history("dave");
    assert_eq!(history.len(), 10);
    assert_eq!(history[0].content, "question 7");
    assert_eq!(history[9].content, "answer to: question 11");
    for pair in history.windows(2) {
        assert!(pair[0].timestamp <= pair[1].timestamp);
    }
}

#[tokio::test]
async fn test_generation_failure_leaves_history_unchanged() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);
    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;
    h.service.index_directory(&docs).await.unwrap();
    h.service.answer("erin", "first question").await.unwrap();

    h.llm.fail.store(true, Ordering::SeqCst);
    let err = h.service.answer("erin", "second question").await.unwrap_err();
    assert!(matches!(err, Error::Generation(_)));

    let history = h.service.history("erin");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "first question");
}

#[tokio::test]
async fn test_query_embedding_failure_leaves_history_unchanged() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);
    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;
    h.service.index_directory(&docs).await.unwrap();
    h.service.answer("fay", "first question").await.unwrap();
    let generated = h.llm.transcripts.lock().len();

    h.embedder.fail.store(true, Ordering::SeqCst);
    let err = h.service.answer("fay", "second question").await.unwrap_err();
    assert!(matches!(err, Error::Embedding(_)), "got {:?}", err);

    assert_eq!(h.llm.transcripts.lock().len(), generated, "model must not be called");
    let history = h.service.history("fay");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].content, "answer to: first question");
}

#[tokio::test]
async fn test_empty_store_still_answers() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;

    let answer = h.service.answer("frank", "Is anything indexed?").await.unwrap();
    assert!(answer.results.is_empty());
    assert!(h.llm.last_transcript()[0].content.contains(NO_CONTEXT_NOTE));
    assert_eq!(h.service.history("frank").len(), 2);
}

#[tokio::test]
async fn test_blank_user_or_query_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;

    let err = h.service.answer("", "hello").await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));
    let err = h.service.answer("gina", "   ").await.unwrap_err();
    assert!(matches!(err, Error::BadRequest(_)));

    assert_eq!(h.embedder.calls.load(Ordering::SeqCst), 0);
    assert!(h.llm.transcripts.lock().is_empty());
    assert!(h.service.history("gina").is_empty());
}

#[tokio::test]
async fn test_delete_document_and_clear_index() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);
    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;
    h.service.index_directory(&docs).await.unwrap();

    assert_eq!(h.service.delete_document("guides/payroll.txt").await.unwrap(), 15);
    assert_eq!(h.service.delete_document("guides/payroll.txt").await.unwrap(), 0);
    assert_eq!(
        h.service.indexed_files().await.unwrap(),
        vec!["vpn.txt".to_string(), "zebra.txt".to_string()]
    );

    h.service.clear_index().await.unwrap();
    let stats = h.service.store_stats().await.unwrap();
    assert_eq!(stats.total_chunks, 0);
    assert_eq!(stats.indexed_files, 0);

    let answer = h.service.answer("hank", "payroll?").await.unwrap();
    assert!(answer.results.is_empty());
}

#[tokio::test]
async fn test_index_and_history_survive_restart() {
    let tmp = TempDir::new().unwrap();
    let docs = tmp.path().join("docs");
    write_corpus(&docs);
    {
        let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;
        h.service.index_directory(&docs).await.unwrap();
        h.service.answer("ivy", "Where do zebras graze?").await.unwrap();
    }

    let store = SqliteVectorStore::open(&tmp.path().join("db/vectors.sqlite"))
        .await
        .unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_chunks, 45);
    assert_eq!(stats.indexed_files, 3);
    store.close().await;

    let memory = ConversationMemory::open(&tmp.path().join("conversations"), 10).unwrap();
    let history = memory.get_history("ivy");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].content, "Where do zebras graze?");

    let h = harness(tmp.path(), FakeEmbedder::default(), 10).await;
    let answer = h.service.answer("ivy", "Tell me more about zebras").await.unwrap();
    assert_eq!(answer.results[0].chunk.source_filename, "zebra.txt");
    assert_eq!(h.llm.last_transcript().len(), 4);
}
