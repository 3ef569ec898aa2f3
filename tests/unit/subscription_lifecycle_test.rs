//! Change subscription lifecycle: open, replace, release and late responses.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::time::Duration;

use bookmark_sync::managers::BookmarkSynchronizer;
use bookmark_sync::types::bookmark::{BookmarkId, OwnerId};
use bookmark_sync::types::change::{ChangeEvent, ChangeKind, SubscriptionScope};
use bookmark_sync::types::settings::SyncSettings;

use common::{fast_settings, synchronizer, titles, wait_for_count, wait_for_state, RecordingStore};

fn alice() -> OwnerId {
    OwnerId::new("alice")
}

#[tokio::test]
async fn test_subscribe_opens_one_subscription() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let sync = synchronizer(&store);

    sync.subscribe(&alice()).await.unwrap();

    assert!(sync.is_subscribed().await);
    assert_eq!(store.inner.active_subscriptions(), 1);
}

#[tokio::test]
async fn test_repeated_subscribe_does_not_stack() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let sync = synchronizer(&store);

    for _ in 0..5 {
        sync.subscribe(&alice()).await.unwrap();
    }

    assert_eq!(store.subscribe_calls(), 5);
    assert_eq!(store.inner.active_subscriptions(), 1);
}

#[tokio::test]
async fn test_change_from_other_session_reloads_list() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let viewer = synchronizer(&store);
    let writer = synchronizer(&store);
    let owner = alice();

    viewer.subscribe(&owner).await.unwrap();
    viewer.initialize(&owner).await.unwrap();
    assert!(viewer.state().bookmarks.is_empty());

    writer
        .add_bookmark(Some(&owner), "From elsewhere", "https://elsewhere.example")
        .await
        .unwrap();

    let state = wait_for_state(&viewer, |s| !s.bookmarks.is_empty()).await;
    assert_eq!(titles(&state), vec!["From elsewhere"]);
}

#[tokio::test]
async fn test_delete_from_other_session_reloads_list() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let viewer = synchronizer(&store);
    let writer = synchronizer(&store);
    let owner = alice();

    writer
        .add_bookmark(Some(&owner), "Short lived", "https://short.example")
        .await
        .unwrap();
    let id = writer.state().bookmarks[0].id.clone();

    viewer.subscribe(&owner).await.unwrap();
    viewer.initialize(&owner).await.unwrap();
    assert_eq!(viewer.state().bookmarks.len(), 1);

    writer.delete_bookmark(Some(&owner), &id).await.unwrap();

    wait_for_state(&viewer, |s| s.bookmarks.is_empty()).await;
}

#[tokio::test]
async fn test_deleting_missing_row_publishes_nothing() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let viewer = synchronizer(&store);
    let writer = synchronizer(&store);
    let owner = alice();

    viewer.subscribe(&owner).await.unwrap();
    viewer.initialize(&owner).await.unwrap();
    let before = viewer.fetch_count();

    writer
        .delete_bookmark(Some(&owner), &BookmarkId::new("missing"))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(viewer.fetch_count(), before);
}

#[tokio::test]
async fn test_teardown_releases_subscription_once() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let sync = synchronizer(&store);
    sync.subscribe(&alice()).await.unwrap();

    sync.teardown().await;
    assert!(sync.is_released());
    assert!(!sync.is_subscribed().await);
    assert_eq!(store.inner.active_subscriptions(), 0);

    // Second teardown is a no-op.
    sync.teardown().await;
    assert_eq!(store.inner.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_subscribe_after_teardown_is_ignored() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let sync = synchronizer(&store);
    sync.teardown().await;

    sync.subscribe(&alice()).await.unwrap();

    assert_eq!(store.subscribe_calls(), 0);
    assert_eq!(store.inner.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let sync = synchronizer(&store);
    sync.subscribe(&alice()).await.unwrap();

    sync.unsubscribe().await;
    sync.unsubscribe().await;

    assert_eq!(store.inner.active_subscriptions(), 0);
    assert!(!sync.is_released());
}

#[tokio::test]
async fn test_dropping_synchronizer_releases_subscription() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let sync = synchronizer(&store);
    let clone = sync.clone();
    sync.subscribe(&alice()).await.unwrap();

    drop(sync);
    assert_eq!(store.inner.active_subscriptions(), 1);

    drop(clone);
    assert_eq!(store.inner.active_subscriptions(), 0);
}

#[tokio::test]
async fn test_events_after_teardown_do_not_reload() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let viewer = synchronizer(&store);
    let writer = synchronizer(&store);
    let owner = alice();
    viewer.subscribe(&owner).await.unwrap();
    viewer.initialize(&owner).await.unwrap();
    viewer.teardown().await;
    let before = viewer.fetch_count();

    writer
        .add_bookmark(Some(&owner), "Unseen", "https://unseen.example")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(viewer.fetch_count(), before);
    assert!(viewer.state().bookmarks.is_empty());
}

#[tokio::test]
async fn test_response_arriving_after_teardown_is_discarded() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let owner = alice();
    synchronizer(&store)
        .add_bookmark(Some(&owner), "Late", "https://late.example")
        .await
        .unwrap();

    let sync = synchronizer(&store);
    let gate = store.hold_queries().await;
    let queries_before = store.query_calls();

    let pending = {
        let sync = sync.clone();
        let owner = owner.clone();
        tokio::spawn(async move { sync.initialize(&owner).await })
    };
    let counter = Arc::clone(&store);
    wait_for_count(move || counter.query_calls(), queries_before + 1).await;

    sync.teardown().await;
    let frozen = sync.state();
    drop(gate);

    pending.await.unwrap().unwrap();
    assert_eq!(sync.state(), frozen);
    assert!(sync.state().bookmarks.is_empty());
}

#[tokio::test]
async fn test_stale_response_for_previous_owner_is_discarded() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let sync = synchronizer(&store);
    let gate = store.hold_queries().await;

    let pending = {
        let sync = sync.clone();
        tokio::spawn(async move { sync.initialize(&alice()).await })
    };
    let counter = Arc::clone(&store);
    wait_for_count(move || counter.query_calls(), 1).await;

    // Sign-out happens while alice's load is parked.
    sync.clear().await;
    drop(gate);
    pending.await.unwrap().unwrap();

    let state = sync.state();
    assert!(state.bookmarks.is_empty());
    assert!(!state.loading);
}

#[tokio::test]
async fn test_loading_stays_set_while_any_fetch_is_in_flight() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let sync = synchronizer(&store);
    sync.initialize(&alice()).await.unwrap();
    assert!(!sync.state().loading);

    let gate = store.hold_queries().await;
    let pending = {
        let sync = sync.clone();
        tokio::spawn(async move { sync.refresh().await })
    };
    let counter = Arc::clone(&store);
    wait_for_count(move || counter.query_calls(), 2).await;
    assert!(sync.state().loading);

    drop(gate);
    pending.await.unwrap().unwrap();
    assert!(!sync.state().loading);
}

/// Parks an event-triggered reload at the query gate, then runs `replace`
/// while it is still in flight. Returns the synchronizer once the gate opens.
async fn reload_interrupted_by<F, Fut>(replace: F) -> BookmarkSynchronizer<RecordingStore>
where
    F: FnOnce(BookmarkSynchronizer<RecordingStore>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let sync = synchronizer(&store);
    let owner = alice();
    sync.subscribe(&owner).await.unwrap();
    sync.initialize(&owner).await.unwrap();

    let gate = store.hold_queries().await;
    store
        .inner
        .feed()
        .publish(&ChangeEvent::new(ChangeKind::Update, "bookmarks"));
    let counter = Arc::clone(&store);
    wait_for_count(move || counter.query_calls(), 2).await;
    assert!(sync.state().loading);

    replace(sync.clone()).await;
    drop(gate);
    sync
}

#[tokio::test]
async fn test_resubscribe_during_event_reload_settles_loading() {
    let sync = reload_interrupted_by(|sync| async move {
        sync.subscribe(&alice()).await.unwrap();
    })
    .await;

    let state = wait_for_state(&sync, |s| !s.loading).await;
    assert!(state.last_error.is_none());
    assert!(sync.is_subscribed().await);
}

#[tokio::test]
async fn test_unsubscribe_during_event_reload_settles_loading() {
    let sync = reload_interrupted_by(|sync| async move {
        sync.unsubscribe().await;
    })
    .await;

    wait_for_state(&sync, |s| !s.loading).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!sync.state().loading);
}

#[tokio::test]
async fn test_foreign_owner_event_is_ignored() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let sync = synchronizer(&store);
    let owner = alice();
    sync.subscribe(&owner).await.unwrap();
    sync.initialize(&owner).await.unwrap();
    let before = sync.fetch_count();

    let event = ChangeEvent::new(ChangeKind::Insert, "bookmarks")
        .with_row(BookmarkId::new("b-1"), OwnerId::new("bob"));
    assert_eq!(store.inner.feed().publish(&event), 1);
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(sync.fetch_count(), before);
}

#[tokio::test]
async fn test_foreign_owner_event_reloads_when_filter_disabled() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let settings = SyncSettings {
        filter_foreign_events: false,
        ..fast_settings()
    };
    let sync = BookmarkSynchronizer::new(Arc::clone(&store), settings);
    let owner = alice();
    sync.subscribe(&owner).await.unwrap();
    sync.initialize(&owner).await.unwrap();
    let before = sync.fetch_count() as usize;

    let event = ChangeEvent::new(ChangeKind::Update, "bookmarks")
        .with_row(BookmarkId::new("b-1"), OwnerId::new("bob"));
    store.inner.feed().publish(&event);

    let watched = sync.clone();
    wait_for_count(move || watched.fetch_count() as usize, before + 1).await;
}

#[tokio::test]
async fn test_owner_scope_filters_at_the_store() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let settings = SyncSettings {
        subscription_scope: SubscriptionScope::Owner,
        ..fast_settings()
    };
    let sync = BookmarkSynchronizer::new(Arc::clone(&store), settings);
    sync.subscribe(&alice()).await.unwrap();

    let foreign = ChangeEvent::new(ChangeKind::Insert, "bookmarks")
        .with_row(BookmarkId::new("b-1"), OwnerId::new("bob"));
    assert_eq!(store.inner.feed().publish(&foreign), 0);

    let own = ChangeEvent::new(ChangeKind::Insert, "bookmarks")
        .with_row(BookmarkId::new("a-1"), alice());
    assert_eq!(store.inner.feed().publish(&own), 1);
}

#[tokio::test]
async fn test_other_collection_events_are_not_delivered() {
    let store = Arc::new(RecordingStore::signed_in("alice"));
    let sync = synchronizer(&store);
    sync.subscribe(&alice()).await.unwrap();

    let event = ChangeEvent::new(ChangeKind::Insert, "notes");
    assert_eq!(store.inner.feed().publish(&event), 0);
}
