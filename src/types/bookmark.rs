use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::errors::ValidationError;

/// Stable reference to an authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque bookmark identifier assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookmarkId(String);

impl BookmarkId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A saved bookmark row as returned by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub title: String,
    pub url: String,
    pub owner_id: OwnerId,
    pub created_at: DateTime<Utc>,
}

/// A bookmark row to be inserted. The store assigns `id` and `created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBookmark {
    pub title: String,
    pub url: String,
    pub owner_id: OwnerId,
}

/// Title and URL accepted from user input, trimmed and checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkInput {
    pub title: String,
    pub url: String,
}

impl BookmarkInput {
    /// Trims both fields, requires them to be non-empty, and requires the URL
    /// to parse as an absolute URL.
    pub fn parse(title: &str, url: &str) -> Result<Self, ValidationError> {
        let title = title.trim();
        let url = url.trim();
        if title.is_empty() || url.is_empty() {
            return Err(ValidationError::MissingFields);
        }
        Url::parse(url).map_err(|e| ValidationError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            title: title.to_string(),
            url: url.to_string(),
        })
    }

    pub fn into_record(self, owner_id: OwnerId) -> NewBookmark {
        NewBookmark {
            title: self.title,
            url: self.url,
            owner_id,
        }
    }
}
