//! Remote store contract consumed by the synchronizer.
//!
//! The store is an opaque collaborator: it owns the bookmark rows, enforces
//! the owner access policy, and pushes change notifications. [`SqliteStore`]
//! is the local reference implementation.

pub mod change_feed;
pub mod sqlite_store;

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark, OwnerId};
use crate::types::change::ChangeEvent;
use crate::types::errors::StoreError;

pub use change_feed::ChangeFeed;
pub use sqlite_store::SqliteStore;

/// Locks `mutex`, recovering the guard if a previous holder panicked.
///
/// Every value guarded this way stays consistent between statements, so a
/// poisoned lock still holds usable data.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Column a query can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderField {
    CreatedAt,
    Title,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: OrderField,
    pub direction: SortDirection,
}

impl OrderBy {
    /// Newest first, the order the bookmark list is displayed in.
    pub fn newest_first() -> Self {
        Self {
            field: OrderField::CreatedAt,
            direction: SortDirection::Descending,
        }
    }
}

/// `SELECT ... WHERE owner = ? ORDER BY ...` over a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkQuery {
    pub collection: String,
    pub owner: OwnerId,
    pub order_by: OrderBy,
}

/// `DELETE ... WHERE id = ? AND owner = ?` over a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteFilter {
    pub collection: String,
    pub id: BookmarkId,
    pub owner: OwnerId,
}

/// Which change events a subscription receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeFilter {
    pub collection: String,
    /// `None` watches the whole collection.
    pub owner: Option<OwnerId>,
}

impl ChangeFilter {
    pub fn table(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            owner: None,
        }
    }

    pub fn owner(collection: impl Into<String>, owner: OwnerId) -> Self {
        Self {
            collection: collection.into(),
            owner: Some(owner),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.collection {
            return false;
        }
        match &self.owner {
            None => true,
            Some(owner) => event.owner.as_ref() == Some(owner),
        }
    }
}

/// Identifies one open change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub(crate) u64);

/// An open change subscription: its handle plus the event stream.
///
/// The stream ends once the store releases the subscription.
#[derive(Debug)]
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

/// Operations the synchronizer needs from a bookmark backend.
#[async_trait]
pub trait RemoteStore: Send + Sync + 'static {
    /// Returns every visible bookmark owned by `query.owner`, in `query.order_by` order.
    async fn query(&self, query: &BookmarkQuery) -> Result<Vec<Bookmark>, StoreError>;

    async fn insert(&self, collection: &str, record: NewBookmark) -> Result<(), StoreError>;

    /// Deleting a row that no longer exists is not an error.
    async fn delete_where(&self, filter: &DeleteFilter) -> Result<(), StoreError>;

    async fn subscribe_changes(&self, filter: ChangeFilter) -> Result<Subscription, StoreError>;

    /// Releases a subscription. Unknown or already-released handles are ignored.
    fn unsubscribe(&self, handle: SubscriptionHandle);

    /// Identity of the signed-in user, if any.
    async fn current_identity(&self) -> Option<OwnerId>;
}
