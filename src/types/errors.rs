use thiserror::Error;

// === ValidationError ===

/// Bookmark input rejected locally, before any store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Title or URL is empty after trimming whitespace.
    #[error("Both title and URL are required")]
    MissingFields,
    /// The URL does not parse as an absolute URL.
    #[error("Please enter a valid URL")]
    InvalidUrl(String),
}

// === StoreError ===

/// Failures reported by a remote store implementation.
///
/// The message carried by each variant is backend detail meant for logs,
/// never for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store could not be reached or the connection failed mid-request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    /// The store's access policy rejected the request.
    #[error("Access policy denied request: {0}")]
    PolicyDenied(String),
    /// The store accepted the request but failed to execute it.
    #[error("Store database error: {0}")]
    Database(String),
    /// The named collection does not exist.
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),
}

impl StoreError {
    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Database(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

// === SyncError ===

/// Remote operation a [`SyncError::Remote`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOperation {
    Load,
    Add,
    Delete,
    Subscribe,
}

impl RemoteOperation {
    /// Generic retryable message shown instead of the backend error.
    pub fn user_message(&self) -> &'static str {
        match self {
            RemoteOperation::Load => "Failed to load bookmarks. Please try again.",
            RemoteOperation::Add => "Failed to add bookmark. Please try again.",
            RemoteOperation::Delete => "Failed to delete bookmark. Please try again.",
            RemoteOperation::Subscribe => "Live updates are unavailable. Please reload.",
        }
    }
}

/// Errors surfaced by the bookmark synchronizer.
///
/// `Display` is always safe to show to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("You must be logged in to manage bookmarks")]
    Unauthenticated,
    #[error("{}", .operation.user_message())]
    Remote {
        operation: RemoteOperation,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    pub fn remote(operation: RemoteOperation, source: StoreError) -> Self {
        SyncError::Remote { operation, source }
    }

    /// Whether the user retrying the action may succeed. Bad input and a
    /// missing session fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Remote { source, .. } => source.is_retryable(),
            SyncError::Validation(_) | SyncError::Unauthenticated => false,
        }
    }
}

// === SettingsError ===

/// Errors related to settings operations.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read or write the settings file.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The specified settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided value is invalid for the settings key.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}
