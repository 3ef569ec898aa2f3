//! Add-bookmark form model.
//!
//! The form is handed its [`BookmarkSynchronizer`] at construction, and the
//! synchronizer reloads the list after a successful add; nothing is looked up
//! through shared global state.

use serde::Serialize;

use crate::managers::BookmarkSynchronizer;
use crate::store::RemoteStore;
use crate::types::errors::SyncError;

pub const LOGIN_REQUIRED: &str = "You must be logged in to add bookmarks";

/// Serializable snapshot of the form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormState {
    pub title: String,
    pub url: String,
    pub error: Option<String>,
    pub submitting: bool,
}

pub struct BookmarkForm<S: RemoteStore> {
    sync: BookmarkSynchronizer<S>,
    title: String,
    url: String,
    error: Option<String>,
    submitting: bool,
}

impl<S: RemoteStore> BookmarkForm<S> {
    pub fn new(sync: BookmarkSynchronizer<S>) -> Self {
        Self {
            sync,
            title: String::new(),
            url: String::new(),
            error: None,
            submitting: false,
        }
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = url.into();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    /// Submits the current fields as a new bookmark for the signed-in user.
    ///
    /// Success clears both fields. Any failure leaves them as typed and sets
    /// the error message.
    pub async fn submit(&mut self) -> Result<(), SyncError> {
        self.error = None;
        self.submitting = true;

        let owner = self.sync.store().current_identity().await;
        let result = self
            .sync
            .add_bookmark(owner.as_ref(), &self.title, &self.url)
            .await;

        self.submitting = false;
        match &result {
            Ok(()) => {
                self.title.clear();
                self.url.clear();
            }
            Err(e) => self.error = Some(form_message(e)),
        }
        result
    }

    pub fn snapshot(&self) -> FormState {
        FormState {
            title: self.title.clone(),
            url: self.url.clone(),
            error: self.error.clone(),
            submitting: self.submitting,
        }
    }
}

fn form_message(err: &SyncError) -> String {
    match err {
        SyncError::Unauthenticated => LOGIN_REQUIRED.to_string(),
        other => other.to_string(),
    }
}
