//! Property-based tests for change event handling.
//!
//! Whatever kind a change event carries, and whether or not it names a row,
//! a subscribed synchronizer reacts with exactly one full reload.

#[path = "../common/mod.rs"]
mod common;

use std::sync::Arc;
use std::time::Duration;

use bookmark_sync::types::bookmark::{BookmarkId, OwnerId};
use bookmark_sync::types::change::{ChangeEvent, ChangeKind};
use proptest::prelude::*;

use common::{synchronizer, wait_for_count, RecordingStore};

fn arb_kind() -> impl Strategy<Value = ChangeKind> {
    prop_oneof![
        Just(ChangeKind::Insert),
        Just(ChangeKind::Update),
        Just(ChangeKind::Delete),
    ]
}

/// Own-owner events, with or without row details.
fn arb_event() -> impl Strategy<Value = ChangeEvent> {
    (arb_kind(), proptest::option::of("[a-z0-9-]{1,12}")).prop_map(|(kind, id)| {
        let event = ChangeEvent::new(kind, "bookmarks");
        match id {
            Some(id) => event.with_row(BookmarkId::new(id), OwnerId::new("alice")),
            None => event,
        }
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn each_event_triggers_exactly_one_full_reload(event in arb_event()) {
        let (reloads, listed) = runtime().block_on(async {
            let store = Arc::new(RecordingStore::signed_in("alice"));
            let owner = OwnerId::new("alice");
            let writer = synchronizer(&store);
            writer.add_bookmark(Some(&owner), "Existing", "https://existing.example").await.unwrap();

            let sync = synchronizer(&store);
            sync.subscribe(&owner).await.unwrap();
            sync.initialize(&owner).await.unwrap();
            let before = sync.fetch_count();

            store.inner.feed().publish(&event);

            let watched = sync.clone();
            wait_for_count(move || watched.fetch_count() as usize, before as usize + 1).await;
            tokio::time::sleep(Duration::from_millis(20)).await;

            (sync.fetch_count() - before, sync.state().bookmarks.len())
        });

        prop_assert_eq!(reloads, 1);
        // A full reload, not a patch driven by the event payload.
        prop_assert_eq!(listed, 1);
    }

    #[test]
    fn events_round_trip_through_json(event in arb_event()) {
        let json = serde_json::to_string(&event).unwrap();
        let parsed: ChangeEvent = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed, event);
    }
}

#[test]
fn bare_update_payload_parses_without_row_details() {
    let event: ChangeEvent =
        serde_json::from_str(r#"{"kind":"update","table":"bookmarks"}"#).unwrap();
    assert_eq!(event.kind, ChangeKind::Update);
    assert_eq!(event.table, "bookmarks");
    assert!(event.id.is_none());
    assert!(event.owner.is_none());
}
