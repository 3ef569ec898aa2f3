use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::managers::SyncState;
use crate::types::bookmark::Bookmark;

/// Placeholder rows shown while the first load is in flight.
pub const LOADING_PLACEHOLDERS: usize = 3;

pub const EMPTY_HEADING: &str = "No bookmarks yet";
pub const EMPTY_HINT: &str = "Start by adding your first bookmark above!";

/// One rendered bookmark.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookmarkRow {
    pub id: String,
    pub title: String,
    pub url: String,
    /// e.g. "Added Oct 17, 2026"
    pub added: String,
}

impl BookmarkRow {
    pub fn from_bookmark(bookmark: &Bookmark) -> Self {
        Self {
            id: bookmark.id.to_string(),
            title: bookmark.title.clone(),
            url: bookmark.url.clone(),
            added: format_added(&bookmark.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ListBody {
    Loading { placeholders: usize },
    Empty { heading: String, hint: String },
    Items { rows: Vec<BookmarkRow>, refreshing: bool },
}

/// The bookmark list as the user sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookmarkListView {
    pub body: ListBody,
    /// User-facing message of the last failure, if any.
    pub error: Option<String>,
}

impl BookmarkListView {
    /// Renders a state snapshot.
    ///
    /// Placeholders only replace an empty list; a reload over existing rows
    /// keeps them on screen and flags `refreshing` instead.
    pub fn from_state(state: &SyncState) -> Self {
        let body = if state.bookmarks.is_empty() {
            if state.loading {
                ListBody::Loading {
                    placeholders: LOADING_PLACEHOLDERS,
                }
            } else {
                ListBody::Empty {
                    heading: EMPTY_HEADING.to_string(),
                    hint: EMPTY_HINT.to_string(),
                }
            }
        } else {
            ListBody::Items {
                rows: state.bookmarks.iter().map(BookmarkRow::from_bookmark).collect(),
                refreshing: state.loading,
            }
        };

        Self {
            body,
            error: state.last_error.as_ref().map(|e| e.to_string()),
        }
    }

    pub fn rows(&self) -> &[BookmarkRow] {
        match &self.body {
            ListBody::Items { rows, .. } => rows.as_slice(),
            _ => &[],
        }
    }
}

/// Formats a creation time the way the list shows it, in UTC.
pub fn format_added(created_at: &DateTime<Utc>) -> String {
    format!("Added {}", created_at.format("%b %-d, %Y"))
}
