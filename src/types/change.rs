use serde::{Deserialize, Serialize};

use super::bookmark::{BookmarkId, OwnerId};

/// Kind of row change carried by a [`ChangeEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Notification that some row in a watched collection changed.
///
/// `id` and `owner` are best-effort: delete notifications from a real backend
/// frequently carry only the primary key, and some carry nothing at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub table: String,
    #[serde(default)]
    pub id: Option<BookmarkId>,
    #[serde(default)]
    pub owner: Option<OwnerId>,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, table: impl Into<String>) -> Self {
        Self {
            kind,
            table: table.into(),
            id: None,
            owner: None,
        }
    }

    pub fn with_row(mut self, id: BookmarkId, owner: OwnerId) -> Self {
        self.id = Some(id);
        self.owner = Some(owner);
        self
    }

    /// True only when the event names an owner and that owner is not `owner`.
    /// Events without owner information are never considered foreign.
    pub fn is_foreign_to(&self, owner: &OwnerId) -> bool {
        matches!(&self.owner, Some(o) if o != owner)
    }
}

/// How wide a change subscription is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionScope {
    /// Every row of the collection; the store's access policy decides what is visible.
    #[default]
    Table,
    /// Only rows belonging to the subscribing owner.
    Owner,
}
