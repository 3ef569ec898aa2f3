// Bookmark sync state managers
// Managers own mutable state and reconcile it with the store.

pub mod bookmark_synchronizer;

pub use bookmark_synchronizer::{BookmarkSynchronizer, SyncState};
