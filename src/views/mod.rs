//! Headless presentation models for the bookmark list and the add form.
//!
//! They render whatever [`crate::managers::SyncState`] holds and call the
//! synchronizer's actions; they never touch the list directly.

pub mod bookmark_form;
pub mod bookmark_list;

pub use bookmark_form::{BookmarkForm, FormState};
pub use bookmark_list::{BookmarkListView, BookmarkRow, ListBody};
