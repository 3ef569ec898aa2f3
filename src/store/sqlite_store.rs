//! SQLite-backed implementation of [`RemoteStore`].
//!
//! Emulates a hosted backend: a single table of bookmark rows guarded by an
//! owner access policy, a session holding the signed-in identity, and a change
//! feed that announces every successful write. Several synchronizers sharing
//! one `SqliteStore` behave like several browser tabs on one account.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;
use tracing::{debug, info};
use uuid::Uuid;

use super::{
    lock, BookmarkQuery, ChangeFeed, ChangeFilter, DeleteFilter, OrderBy, OrderField, RemoteStore,
    SortDirection, Subscription, SubscriptionHandle,
};
use crate::database::Database;
use crate::types::bookmark::{Bookmark, BookmarkId, NewBookmark, OwnerId};
use crate::types::change::{ChangeEvent, ChangeKind};
use crate::types::errors::StoreError;

pub struct SqliteStore {
    db: Mutex<Database>,
    collection: String,
    session: Mutex<Option<OwnerId>>,
    feed: ChangeFeed,
}

impl SqliteStore {
    /// Wraps an open database. `collection` is the only collection name the store answers to.
    pub fn new(db: Database, collection: impl Into<String>) -> Self {
        Self {
            db: Mutex::new(db),
            collection: collection.into(),
            session: Mutex::new(None),
            feed: ChangeFeed::new(),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P, collection: impl Into<String>) -> Result<Self, StoreError> {
        Ok(Self::new(Database::open(path)?, collection))
    }

    /// In-memory store serving the `bookmarks` collection.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::new(Database::open_in_memory()?, "bookmarks"))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn sign_in(&self, owner: OwnerId) {
        info!(owner = %owner, "session started");
        *lock(&self.session) = Some(owner);
    }

    pub fn sign_out(&self) {
        if let Some(owner) = lock(&self.session).take() {
            info!(owner = %owner, "session ended");
        }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn active_subscriptions(&self) -> usize {
        self.feed.active_subscriptions()
    }

    fn session_owner(&self) -> Option<OwnerId> {
        lock(&self.session).clone()
    }

    fn check_collection(&self, collection: &str) -> Result<(), StoreError> {
        if collection == self.collection {
            Ok(())
        } else {
            Err(StoreError::UnknownCollection(collection.to_string()))
        }
    }

    fn order_clause(order_by: &OrderBy) -> &'static str {
        match (order_by.field, order_by.direction) {
            (OrderField::CreatedAt, SortDirection::Descending) => "created_at DESC, rowid DESC",
            (OrderField::CreatedAt, SortDirection::Ascending) => "created_at ASC, rowid ASC",
            (OrderField::Title, SortDirection::Descending) => "title DESC, rowid DESC",
            (OrderField::Title, SortDirection::Ascending) => "title ASC, rowid ASC",
        }
    }

    /// Reads a single `Bookmark` row into a struct.
    fn row_to_bookmark(row: &rusqlite::Row) -> rusqlite::Result<Bookmark> {
        let created_ms: i64 = row.get(4)?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(created_ms)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(4, created_ms))?;
        Ok(Bookmark {
            id: BookmarkId::new(row.get::<_, String>(0)?),
            owner_id: OwnerId::new(row.get::<_, String>(1)?),
            title: row.get(2)?,
            url: row.get(3)?,
            created_at,
        })
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn query(&self, query: &BookmarkQuery) -> Result<Vec<Bookmark>, StoreError> {
        self.check_collection(&query.collection)?;

        // Rows of other owners are invisible, so the result is simply empty.
        if self.session_owner().as_ref() != Some(&query.owner) {
            debug!(owner = %query.owner, "query outside session scope returns no rows");
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT id, owner_id, title, url, created_at FROM bookmarks \
             WHERE owner_id = ?1 ORDER BY {}",
            Self::order_clause(&query.order_by)
        );
        let db = lock(&self.db);
        let mut stmt = db.connection().prepare(&sql)?;
        let rows = stmt.query_map(params![query.owner.as_str()], Self::row_to_bookmark)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    async fn insert(&self, collection: &str, record: NewBookmark) -> Result<(), StoreError> {
        self.check_collection(collection)?;

        if self.session_owner().as_ref() != Some(&record.owner_id) {
            return Err(StoreError::PolicyDenied(format!(
                "insert for owner {} outside the signed-in session",
                record.owner_id
            )));
        }

        let id = BookmarkId::new(Uuid::new_v4().to_string());
        let now = Utc::now().timestamp_millis();
        {
            let db = lock(&self.db);
            db.connection().execute(
                "INSERT INTO bookmarks (id, owner_id, title, url, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id.as_str(), record.owner_id.as_str(), record.title, record.url, now],
            )?;
        }

        let event = ChangeEvent::new(ChangeKind::Insert, &self.collection)
            .with_row(id, record.owner_id);
        self.feed.publish(&event);
        Ok(())
    }

    async fn delete_where(&self, filter: &DeleteFilter) -> Result<(), StoreError> {
        self.check_collection(&filter.collection)?;

        // The policy hides other owners' rows, so such a delete matches nothing.
        if self.session_owner().as_ref() != Some(&filter.owner) {
            debug!(id = %filter.id, "delete outside session scope matches no rows");
            return Ok(());
        }

        let affected = {
            let db = lock(&self.db);
            db.connection().execute(
                "DELETE FROM bookmarks WHERE id = ?1 AND owner_id = ?2",
                params![filter.id.as_str(), filter.owner.as_str()],
            )?
        };

        if affected > 0 {
            let event = ChangeEvent::new(ChangeKind::Delete, &self.collection)
                .with_row(filter.id.clone(), filter.owner.clone());
            self.feed.publish(&event);
        }
        Ok(())
    }

    async fn subscribe_changes(&self, filter: ChangeFilter) -> Result<Subscription, StoreError> {
        self.check_collection(&filter.collection)?;
        Ok(self.feed.subscribe(filter))
    }

    fn unsubscribe(&self, handle: SubscriptionHandle) {
        self.feed.unsubscribe(handle);
    }

    async fn current_identity(&self) -> Option<OwnerId> {
        self.session_owner()
    }
}
