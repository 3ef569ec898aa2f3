//! Bookmark Synchronizer.
//!
//! Owns the in-memory list of the signed-in user's bookmarks and keeps it
//! consistent with a [`RemoteStore`] across local mutations, change
//! notifications from other sessions, and concurrent writers.
//!
//! Reconciliation is always a full refetch: an initial load, a successful add
//! or delete, and every inbound change event all re-query the owner's whole
//! list and replace the displayed list with the response. No diffing or
//! patching is done. One user's bookmarks are a small dataset, and a full
//! refetch is idempotent, so overlapping refreshes are harmless and the last
//! response to arrive wins.
//!
//! State is published on a [`tokio::sync::watch`] channel. Views subscribe to
//! it and never mutate the list themselves.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::store::{
    lock, BookmarkQuery, ChangeFilter, DeleteFilter, OrderBy, RemoteStore, Subscription,
    SubscriptionHandle,
};
use crate::types::bookmark::{Bookmark, BookmarkId, BookmarkInput, OwnerId};
use crate::types::change::{ChangeEvent, SubscriptionScope};
use crate::types::errors::{RemoteOperation, StoreError, SyncError};
use crate::types::settings::SyncSettings;

/// What the presentation layer renders.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncState {
    /// Newest first.
    pub bookmarks: Vec<Bookmark>,
    /// True while at least one fetch is in flight.
    pub loading: bool,
    pub last_error: Option<SyncError>,
}

impl SyncState {
    /// State of a freshly mounted list: empty and waiting for its first load.
    pub fn mounted() -> Self {
        Self {
            bookmarks: Vec::new(),
            loading: true,
            last_error: None,
        }
    }
}

/// An open change subscription and the task draining it.
///
/// Dropping it stops the task and releases the store subscription, so release
/// happens exactly once however the synchronizer goes away.
struct ActiveSubscription<S: RemoteStore> {
    store: Arc<S>,
    handle: SubscriptionHandle,
    listener: JoinHandle<()>,
}

impl<S: RemoteStore> Drop for ActiveSubscription<S> {
    fn drop(&mut self) {
        self.listener.abort();
        self.store.unsubscribe(self.handle);
        info!("released bookmark change subscription");
    }
}

struct Inner<S: RemoteStore> {
    store: Arc<S>,
    settings: SyncSettings,
    state: watch::Sender<SyncState>,
    /// Owner of the most recent load; `refresh` reloads for this owner.
    owner: Mutex<Option<OwnerId>>,
    subscription: tokio::sync::Mutex<Option<ActiveSubscription<S>>>,
    in_flight: AtomicUsize,
    fetches: AtomicU64,
    released: AtomicBool,
}

/// Keeps one user's bookmark list in step with the remote store.
///
/// Cheap to clone; clones share the same list and subscription.
pub struct BookmarkSynchronizer<S: RemoteStore> {
    inner: Arc<Inner<S>>,
}

impl<S: RemoteStore> Clone for BookmarkSynchronizer<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: RemoteStore> BookmarkSynchronizer<S> {
    pub fn new(store: Arc<S>, settings: SyncSettings) -> Self {
        let (state, _) = watch::channel(SyncState::mounted());
        Self {
            inner: Arc::new(Inner {
                store,
                settings,
                state,
                owner: Mutex::new(None),
                subscription: tokio::sync::Mutex::new(None),
                in_flight: AtomicUsize::new(0),
                fetches: AtomicU64::new(0),
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.inner.store
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SyncState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    pub fn watch(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    /// Number of full reloads started so far.
    pub fn fetch_count(&self) -> u64 {
        self.inner.fetches.load(Ordering::SeqCst)
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }

    pub async fn is_subscribed(&self) -> bool {
        self.inner.subscription.lock().await.is_some()
    }

    /// Loads `owner`'s bookmarks and replaces the list with the result.
    ///
    /// On failure the previous list stays, the error is recorded in the state
    /// and also returned. Transient store errors are retried with backoff first.
    pub async fn initialize(&self, owner: &OwnerId) -> Result<(), SyncError> {
        if self.is_released() {
            debug!(owner = %owner, "ignoring load on released synchronizer");
            return Ok(());
        }

        *lock(&self.inner.owner) = Some(owner.clone());
        self.inner.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.state.send_modify(|s| s.loading = true);

        let in_flight = InFlight::enter(&self.inner);
        let result = self.fetch_with_retry(owner).await;
        let still_loading = in_flight.finish();

        if self.is_released() {
            debug!(owner = %owner, "discarding bookmark response after release");
            return Ok(());
        }
        if lock(&self.inner.owner).as_ref() != Some(owner) {
            debug!(owner = %owner, "discarding bookmark response for previous owner");
            if !still_loading {
                self.inner.state.send_modify(|s| s.loading = false);
            }
            return Ok(());
        }

        match result {
            Ok(bookmarks) => {
                debug!(owner = %owner, count = bookmarks.len(), "bookmark list replaced");
                self.inner.state.send_modify(|s| {
                    s.bookmarks = bookmarks;
                    s.loading = still_loading;
                    s.last_error = None;
                });
                Ok(())
            }
            Err(e) => {
                error!(owner = %owner, error = %e, "failed to load bookmarks");
                let err = SyncError::remote(RemoteOperation::Load, e);
                self.inner.state.send_modify(|s| {
                    s.loading = still_loading;
                    s.last_error = Some(err.clone());
                });
                Err(err)
            }
        }
    }

    /// Reloads the list for the owner of the last load.
    ///
    /// This is what the add form and other views receive to trigger a reload.
    /// With no owner loaded yet it only settles the loading flag.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let owner = lock(&self.inner.owner).clone();
        match owner {
            Some(owner) => self.initialize(&owner).await,
            None => {
                debug!("refresh requested with no owner loaded");
                if !self.is_released() && self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                    self.inner.state.send_modify(|s| s.loading = false);
                }
                Ok(())
            }
        }
    }

    /// Opens the change subscription for `owner`, replacing any open one.
    ///
    /// Every event received afterwards triggers one full reload.
    pub async fn subscribe(&self, owner: &OwnerId) -> Result<(), SyncError> {
        let mut slot = self.inner.subscription.lock().await;
        if self.is_released() {
            debug!(owner = %owner, "ignoring subscribe on released synchronizer");
            return Ok(());
        }

        // Release before opening so repeated calls never stack subscriptions.
        drop(slot.take());

        let collection = self.inner.settings.collection.clone();
        let filter = match self.inner.settings.subscription_scope {
            SubscriptionScope::Table => ChangeFilter::table(collection),
            SubscriptionScope::Owner => ChangeFilter::owner(collection, owner.clone()),
        };

        let Subscription { handle, events } =
            match self.inner.store.subscribe_changes(filter).await {
                Ok(subscription) => subscription,
                Err(e) => {
                    error!(owner = %owner, error = %e, "failed to subscribe to bookmark changes");
                    let err = SyncError::remote(RemoteOperation::Subscribe, e);
                    self.inner
                        .state
                        .send_modify(|s| s.last_error = Some(err.clone()));
                    return Err(err);
                }
            };

        let listener = tokio::spawn(listen(
            Arc::downgrade(&self.inner),
            owner.clone(),
            events,
        ));
        *slot = Some(ActiveSubscription {
            store: Arc::clone(&self.inner.store),
            handle,
            listener,
        });
        info!(owner = %owner, scope = ?self.inner.settings.subscription_scope, "subscribed to bookmark changes");
        Ok(())
    }

    /// Closes the change subscription if one is open. Safe to call repeatedly.
    pub async fn unsubscribe(&self) {
        drop(self.inner.subscription.lock().await.take());
    }

    /// Adds a bookmark for `owner` and reloads the list.
    ///
    /// Input is validated and the session checked before anything is sent.
    /// The reload runs even though the store will also announce the insert;
    /// it only shortens the time until the new row is visible.
    pub async fn add_bookmark(
        &self,
        owner: Option<&OwnerId>,
        title: &str,
        url: &str,
    ) -> Result<(), SyncError> {
        let input = BookmarkInput::parse(title, url)?;
        let owner = owner.ok_or(SyncError::Unauthenticated)?;

        let record = input.into_record(owner.clone());
        if let Err(e) = self
            .inner
            .store
            .insert(&self.inner.settings.collection, record)
            .await
        {
            error!(owner = %owner, error = %e, "failed to insert bookmark");
            return Err(SyncError::remote(RemoteOperation::Add, e));
        }
        info!(owner = %owner, "bookmark added");

        // A failed reload is already recorded in the state; the insert itself succeeded.
        let _ = self.initialize(owner).await;
        Ok(())
    }

    /// Deletes the bookmark `id` belonging to `owner` and reloads the list.
    ///
    /// The row is never removed locally ahead of the store: on failure it
    /// stays visible. Deleting a row that is already gone succeeds.
    pub async fn delete_bookmark(
        &self,
        owner: Option<&OwnerId>,
        id: &BookmarkId,
    ) -> Result<(), SyncError> {
        let owner = owner.ok_or(SyncError::Unauthenticated)?;

        let filter = DeleteFilter {
            collection: self.inner.settings.collection.clone(),
            id: id.clone(),
            owner: owner.clone(),
        };
        if let Err(e) = self.inner.store.delete_where(&filter).await {
            error!(owner = %owner, id = %id, error = %e, "failed to delete bookmark");
            let err = SyncError::remote(RemoteOperation::Delete, e);
            if !self.is_released() {
                self.inner
                    .state
                    .send_modify(|s| s.last_error = Some(err.clone()));
            }
            return Err(err);
        }
        info!(owner = %owner, id = %id, "bookmark deleted");

        let _ = self.initialize(owner).await;
        Ok(())
    }

    /// Forgets the loaded owner and empties the list, e.g. after sign-out.
    pub async fn clear(&self) {
        self.unsubscribe().await;
        *lock(&self.inner.owner) = None;
        // Fetches still in flight belong to the old owner and will be discarded.
        if !self.is_released() {
            self.inner.state.send_modify(|s| {
                s.bookmarks.clear();
                s.loading = false;
                s.last_error = None;
            });
        }
    }

    /// Releases the subscription and stops all further state updates.
    ///
    /// Fetches still in flight complete normally but their responses are
    /// dropped. Calling this more than once has no further effect.
    pub async fn teardown(&self) {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return;
        }
        self.unsubscribe().await;
        debug!("bookmark synchronizer torn down");
    }

    async fn fetch_with_retry(&self, owner: &OwnerId) -> Result<Vec<Bookmark>, StoreError> {
        let query = BookmarkQuery {
            collection: self.inner.settings.collection.clone(),
            owner: owner.clone(),
            order_by: OrderBy::newest_first(),
        };
        let max_attempts = self.inner.settings.fetch.max_attempts.max(1);
        let mut backoff = Duration::from_millis(self.inner.settings.fetch.initial_backoff_ms);
        let mut attempt = 1;

        loop {
            debug!(owner = %owner, attempt, "fetching bookmarks");
            match self.inner.store.query(&query).await {
                Ok(bookmarks) => return Ok(bookmarks),
                Err(e) if e.is_retryable() && attempt < max_attempts && !self.is_released() => {
                    warn!(owner = %owner, attempt, error = %e, "bookmark fetch failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Drains change events, reloading the list once per event.
///
/// Holds only a weak reference so an abandoned synchronizer can be dropped
/// while its listener is parked on the stream.
async fn listen<S: RemoteStore>(
    inner: Weak<Inner<S>>,
    owner: OwnerId,
    mut events: mpsc::UnboundedReceiver<ChangeEvent>,
) {
    while let Some(event) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let sync = BookmarkSynchronizer { inner };

        if sync.inner.settings.filter_foreign_events && event.is_foreign_to(&owner) {
            warn!(owner = %owner, kind = ?event.kind, "ignoring change event for another owner");
            continue;
        }

        debug!(owner = %owner, kind = ?event.kind, table = %event.table, "change event received");
        let _ = sync.initialize(&owner).await;
    }
    debug!(owner = %owner, "bookmark change stream closed");
}

/// Counts one fetch as in flight.
///
/// A fetch that completes calls [`InFlight::finish`] and publishes the flag
/// along with its result. A fetch dropped before completing, e.g. in a
/// listener aborted by a resubscribe, settles the published flag itself.
struct InFlight<'a, S: RemoteStore> {
    inner: &'a Inner<S>,
    finished: bool,
}

impl<'a, S: RemoteStore> InFlight<'a, S> {
    fn enter(inner: &'a Inner<S>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self {
            inner,
            finished: false,
        }
    }

    /// Leaves the in-flight set; returns whether other fetches are still running.
    fn finish(mut self) -> bool {
        self.finished = true;
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) > 1
    }
}

impl<S: RemoteStore> Drop for InFlight<'_, S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let still_loading = self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) > 1;
        if !still_loading && !self.inner.released.load(Ordering::SeqCst) {
            debug!("bookmark fetch cancelled, settling loading flag");
            self.inner.state.send_modify(|s| s.loading = false);
        }
    }
}
