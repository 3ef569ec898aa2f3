//! App core for bookmark-sync.
//!
//! Wires the local store, the synchronizer and the add form together and
//! drives the session lifecycle: sign-in subscribes and loads, sign-out
//! clears, shutdown tears the synchronizer down.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::managers::BookmarkSynchronizer;
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::store::{RemoteStore, SqliteStore};
use crate::types::bookmark::OwnerId;
use crate::types::errors::{StoreError, SyncError};
use crate::types::settings::SyncSettings;
use crate::views::{BookmarkForm, BookmarkListView};

pub struct App {
    pub store: Arc<SqliteStore>,
    pub sync: BookmarkSynchronizer<SqliteStore>,
    pub form: Mutex<BookmarkForm<SqliteStore>>,
    /// Persisted settings. The synchronizer keeps the values it was built
    /// with; edits apply from the next start.
    pub settings_engine: std::sync::Mutex<SettingsEngine>,
}

impl App {
    /// Opens the store at `db_path` and builds a synchronizer from the
    /// engine's current settings.
    pub fn new<P: AsRef<Path>>(db_path: P, settings_engine: SettingsEngine) -> Result<Self, StoreError> {
        let collection = settings_engine.get_settings().collection.clone();
        let store = SqliteStore::open(db_path, collection)?;
        Ok(Self::with_store(Arc::new(store), settings_engine))
    }

    pub fn with_store(store: Arc<SqliteStore>, settings_engine: SettingsEngine) -> Self {
        let settings: SyncSettings = settings_engine.get_settings().clone();
        let sync = BookmarkSynchronizer::new(Arc::clone(&store), settings);
        let form = Mutex::new(BookmarkForm::new(sync.clone()));
        Self {
            store,
            sync,
            form,
            settings_engine: std::sync::Mutex::new(settings_engine),
        }
    }

    /// Resumes an existing session, or settles the list as signed out.
    pub async fn startup(&self) -> Result<(), SyncError> {
        match self.store.current_identity().await {
            Some(owner) => self.open_session(&owner).await,
            None => self.sync.refresh().await,
        }
    }

    pub async fn sign_in(&self, owner: OwnerId) -> Result<(), SyncError> {
        self.store.sign_in(owner.clone());
        self.open_session(&owner).await
    }

    pub async fn sign_out(&self) {
        self.store.sign_out();
        self.sync.clear().await;
        info!("signed out, bookmark list cleared");
    }

    pub async fn shutdown(&self) {
        self.sync.teardown().await;
    }

    pub fn list_view(&self) -> BookmarkListView {
        BookmarkListView::from_state(&self.sync.state())
    }

    /// Subscribes before the first load so no change between the two is missed.
    ///
    /// The list is loaded even when the subscription cannot be opened; the
    /// first error is returned.
    async fn open_session(&self, owner: &OwnerId) -> Result<(), SyncError> {
        let subscribed = self.sync.subscribe(owner).await;
        if let Err(e) = &subscribed {
            warn!(owner = %owner, error = %e, "live updates unavailable, loading once");
        }
        let loaded = self.sync.initialize(owner).await;
        subscribed.and(loaded)
    }
}
