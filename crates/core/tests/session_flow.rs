use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use haven_core::title::SENTINEL_TITLE;
use haven_core::{
    Message, Role, SendCoordinator, SendError, SendOutcome,
    SessionStoreBuilder, StoreError,
};
use haven_remote::ChatBackend;
use haven_test_remote::TestBackend;

/// Lets spawned title resolutions run to completion.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn human(content: &str) -> haven_remote::HistoryMessage {
    haven_remote::HistoryMessage {
        role: haven_remote::TranscriptRole::Human,
        content: content.to_owned(),
    }
}

#[tokio::test]
async fn test_bootstrap_selects_most_recent() {
    let backend = TestBackend::seeded();
    let store = SessionStoreBuilder::with_backend(backend).build();

    store.bootstrap().await.unwrap();
    settle().await;

    assert_eq!(store.active_session_id().as_deref(), Some("demo-coding"));

    let transcript = store.active_transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[1].role, Role::Assistant);

    let listing = store.list_sessions();
    assert_eq!(listing.len(), 3);
    assert_eq!(
        store.title_for("demo-coding"),
        "Can you help me with..."
    );
    assert_eq!(
        store.title_for("demo-web"),
        "What are some good practices..."
    );
    assert_eq!(store.title_for("demo-empty"), SENTINEL_TITLE);
}

#[tokio::test]
async fn test_select_unknown_session() {
    let store =
        SessionStoreBuilder::with_backend(TestBackend::new()).build();
    store.bootstrap().await.unwrap();

    let err = store.select_session("nope").await.unwrap_err();
    assert_eq!(err, StoreError::SessionNotFound("nope".to_owned()));
}

#[tokio::test]
async fn test_refresh_failure_leaves_state() {
    let backend = TestBackend::seeded();
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();
    store.bootstrap().await.unwrap();
    let before = store.list_sessions();

    backend.set_list_failures(Some(0));
    let err = store.refresh_sessions().await.unwrap_err();
    assert!(matches!(err, StoreError::RemoteUnavailable(_)));
    assert_eq!(store.list_sessions(), before);
}

#[tokio::test]
async fn test_send_appends_user_then_reply() {
    let backend = TestBackend::new();
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();
    let session = store.create_session();
    let coordinator = SendCoordinator::new(store.clone());

    let outcome = coordinator
        .send_message(&session.id, "hello there")
        .await
        .unwrap();
    assert_eq!(outcome, SendOutcome::Delivered);

    let transcript = store.active_transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].role, Role::User);
    assert_eq!(transcript[0].content, "hello there");
    assert_eq!(transcript[1].role, Role::Assistant);
    assert!(!transcript[1].content.is_empty());

    assert_eq!(store.title_for(&session.id), "hello there");
    assert_eq!(backend.thread(&session.id).len(), 2);
}

#[tokio::test]
async fn test_send_failure_rolls_back() {
    let backend = TestBackend::new();
    backend.set_chat_failures(Some(0));
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();
    let session = store.create_session();
    let coordinator = SendCoordinator::new(store.clone());

    let err = coordinator
        .send_message(&session.id, "please keep this text")
        .await
        .unwrap_err();
    let SendError::Undelivered { text, .. } = err else {
        panic!("expected an undelivered error");
    };
    assert_eq!(text, "please keep this text");

    // The optimistic append and the derived title are both gone.
    assert!(store.active_transcript().is_empty());
    assert_eq!(store.title_for(&session.id), SENTINEL_TITLE);
    assert!(!coordinator.is_sending());
    assert!(backend.thread(&session.id).is_empty());
}

#[tokio::test]
async fn test_blank_send_ignored() {
    let backend = TestBackend::new();
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();
    let session = store.create_session();
    let coordinator = SendCoordinator::new(store);

    let outcome =
        coordinator.send_message(&session.id, "  \t ").await.unwrap();
    assert_eq!(outcome, SendOutcome::Ignored);
    assert_eq!(backend.chat_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_sends_single_flight() {
    let backend = TestBackend::new();
    backend.set_delay(Duration::from_secs(1));
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();
    let session = store.create_session();
    let coordinator = SendCoordinator::new(store.clone());

    let (first, second) = tokio::join!(
        coordinator.send_message(&session.id, "first"),
        coordinator.send_message(&session.id, "second"),
    );
    assert_eq!(first.unwrap(), SendOutcome::Delivered);
    assert_eq!(second.unwrap(), SendOutcome::Ignored);

    assert_eq!(backend.chat_calls(), 1);
    let transcript = store.active_transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].content, "first");
}

#[tokio::test]
async fn test_delete_active_selects_next() {
    let backend = TestBackend::seeded();
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();
    store.bootstrap().await.unwrap();

    store.delete_session("demo-coding").await.unwrap();

    assert_eq!(store.active_session_id().as_deref(), Some("demo-web"));
    assert_eq!(store.active_transcript().len(), 1);
    assert!(
        store.list_sessions().iter().all(|s| s.id != "demo-coding")
    );
    assert!(backend.thread("demo-coding").is_empty());
}

#[tokio::test]
async fn test_delete_last_session_creates_fresh() {
    let store =
        SessionStoreBuilder::with_backend(TestBackend::new()).build();
    store.bootstrap().await.unwrap();
    let first = store.active_session_id().unwrap();

    store.delete_session(&first).await.unwrap();

    let replacement = store.active_session_id().unwrap();
    assert_ne!(replacement, first);
    assert!(store.active_transcript().is_empty());
    assert_eq!(store.title_for(&replacement), SENTINEL_TITLE);
    assert_eq!(store.list_sessions().len(), 1);
}

#[tokio::test]
async fn test_delete_unknown_session() {
    let store =
        SessionStoreBuilder::with_backend(TestBackend::new()).build();
    let err = store.delete_session("nope").await.unwrap_err();
    assert_eq!(err, StoreError::SessionNotFound("nope".to_owned()));
}

#[tokio::test]
async fn test_title_locks_on_first_user_message() {
    let store =
        SessionStoreBuilder::with_backend(TestBackend::new()).build();
    let session = store.create_session();

    store
        .append_message(&session.id, Message::user("a b c d e f g"))
        .unwrap();
    assert_eq!(store.title_for(&session.id), "a b c d e...");

    // Later messages never retitle the session.
    store
        .append_message(
            &session.id,
            Message::user("completely different words here instead now"),
        )
        .unwrap();
    assert_eq!(store.title_for(&session.id), "a b c d e...");
}

#[tokio::test]
async fn test_title_resolution_is_deduplicated() {
    let backend = TestBackend::new();
    backend.insert_thread(
        "s1",
        vec![human("alpha beta gamma delta epsilon zeta")],
    );
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();

    store.refresh_sessions().await.unwrap();
    settle().await;

    store.resolve_title("s1").await;
    store.resolve_title("s1").await;

    assert_eq!(backend.history_calls("s1"), 1);
    assert_eq!(
        store.title_for("s1"),
        "alpha beta gamma delta epsilon..."
    );
}

#[tokio::test(start_paused = true)]
async fn test_stale_history_response_is_dropped() {
    let backend = TestBackend::new();
    backend.insert_thread("older", vec![human("from the older thread")]);
    backend.insert_thread("newer", vec![human("from the newer thread")]);
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();
    store.refresh_sessions().await.unwrap();
    settle().await;

    // The first selection's fetch is still pending when a second
    // selection lands; its late response must be discarded.
    backend.set_history_delay(Duration::from_secs(1));
    let slow = {
        let store = store.clone();
        tokio::spawn(async move { store.select_session("older").await })
    };
    tokio::task::yield_now().await;

    store.select_session("newer").await.unwrap();
    slow.await.unwrap().unwrap();

    assert_eq!(store.active_session_id().as_deref(), Some("newer"));
    let transcript = store.active_transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].content, "from the newer thread");
    // The superseded fetch must not have populated its transcript.
    assert!(store.session("older").unwrap().messages.is_empty());
}

#[tokio::test]
async fn test_refresh_drops_remotely_deleted_sessions() {
    let backend = TestBackend::seeded();
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();
    store.bootstrap().await.unwrap();

    // A fresh chat that has not been sent anywhere yet.
    let local = store.create_session();

    // Another client deletes a thread behind our back.
    backend.reset("demo-web").await.unwrap();
    store.refresh_sessions().await.unwrap();

    let ids: Vec<String> =
        store.list_sessions().iter().map(|s| s.id.clone()).collect();
    assert!(ids.contains(&local.id));
    assert!(ids.iter().any(|id| id == "demo-coding"));
    assert!(ids.iter().all(|id| id != "demo-web"));
}

#[tokio::test]
async fn test_refresh_replaces_vanished_active_session() {
    let backend = TestBackend::seeded();
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();
    store.bootstrap().await.unwrap();
    assert_eq!(store.active_session_id().as_deref(), Some("demo-coding"));

    backend.reset("demo-coding").await.unwrap();
    store.refresh_sessions().await.unwrap();

    assert_eq!(store.active_session_id().as_deref(), Some("demo-web"));
    assert_eq!(store.active_transcript().len(), 1);
}

#[tokio::test]
async fn test_refresh_creates_fresh_when_all_vanish() {
    let backend = TestBackend::new();
    backend.insert_thread("only", vec![human("hello")]);
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();
    store.bootstrap().await.unwrap();

    backend.reset("only").await.unwrap();
    store.refresh_sessions().await.unwrap();

    let active = store.active_session_id().unwrap();
    assert_ne!(active, "only");
    assert!(store.active_transcript().is_empty());
    assert_eq!(store.title_for(&active), SENTINEL_TITLE);
    assert_eq!(store.list_sessions().len(), 1);
}

#[tokio::test]
async fn test_failed_selection_reverts() {
    let backend = TestBackend::seeded();
    let store =
        SessionStoreBuilder::with_backend(backend.clone()).build();
    store.bootstrap().await.unwrap();

    backend.set_history_failures(Some(0));
    let err = store.select_session("demo-web").await.unwrap_err();
    assert!(matches!(err, StoreError::RemoteUnavailable(_)));
    assert_eq!(store.active_session_id().as_deref(), Some("demo-coding"));
}

#[tokio::test]
async fn test_change_callback_fires() {
    let changes = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&changes);
    let store = SessionStoreBuilder::with_backend(TestBackend::new())
        .on_change(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    let session = store.create_session();
    let after_create = changes.load(Ordering::SeqCst);
    assert!(after_create > 0);

    store
        .append_message(&session.id, Message::user("hi"))
        .unwrap();
    assert!(changes.load(Ordering::SeqCst) > after_create);
}

#[tokio::test]
async fn test_custom_word_limit() {
    let store = SessionStoreBuilder::with_backend(TestBackend::new())
        .title_word_limit(4)
        .build();
    let session = store.create_session();

    store
        .append_message(&session.id, Message::user("one two three four five"))
        .unwrap();
    assert_eq!(store.title_for(&session.id), "one two three four...");
}
