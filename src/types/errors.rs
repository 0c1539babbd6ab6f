use thiserror::Error;

use super::tab::{TabId, WindowId};

// === BookmarkError ===

/// Errors raised by the bookmark store.
#[derive(Debug, Error)]
pub enum BookmarkError {
    /// Bookmark with the given ID was not found.
    #[error("Bookmark not found: {0}")]
    NotFound(String),
    /// The target folder was not found.
    #[error("Bookmark folder not found: {0}")]
    FolderNotFound(String),
    /// A folder still has children and cannot be removed on its own.
    #[error("Bookmark folder is not empty: {0}")]
    FolderNotEmpty(String),
    /// Database operation failed.
    #[error("Bookmark database error: {0}")]
    DatabaseError(String),
}

impl From<rusqlite::Error> for BookmarkError {
    fn from(e: rusqlite::Error) -> Self {
        BookmarkError::DatabaseError(e.to_string())
    }
}

// === HostError ===

/// Errors raised by the tab/window control surface.
#[derive(Debug, Error)]
pub enum HostError {
    /// Tab with the given ID does not exist (possibly closed concurrently).
    #[error("Tab not found: {0}")]
    TabNotFound(TabId),
    /// Window with the given ID does not exist.
    #[error("Window not found: {0}")]
    WindowNotFound(WindowId),
    /// The host refused the operation (e.g. a privileged URL).
    #[error("Host rejected operation: {0}")]
    Rejected(String),
    /// The provided tab index is out of bounds.
    #[error("Invalid tab index: {0}")]
    InvalidIndex(usize),
}

// === SessionError ===

/// Errors related to session lifecycle operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A session needs at least one tab or record.
    #[error("Session cannot be empty")]
    EmptySession,
    /// Session with the given ID was not found in the store.
    #[error("Session not found: {0}")]
    NotFound(String),
    /// The session already owns a dedicated window.
    #[error("Session already has a window: {0}")]
    WindowAlreadySet(WindowId),
    /// A window can only be attached before any tab is associated.
    #[error("Cannot attach a window to session {0} after tabs were added")]
    TabsAlreadyAdded(String),
    /// The tab is not mapped to this session.
    #[error("Tab {tab_id} is not part of session {session_id}")]
    TabNotInSession { tab_id: TabId, session_id: String },
    /// The record is already claimed by another live tab.
    #[error("Record {record_id} is already associated with tab {tab_id}")]
    RecordAlreadyMapped { record_id: String, tab_id: TabId },
    /// The session instance has reached a terminal state.
    #[error("Session is no longer active: {0}")]
    NotActive(String),
    /// Another restore of the same session has not finished yet.
    #[error("Session is already being restored: {0}")]
    Busy(String),
    /// Moving a tab into the session window reported no affected tab.
    #[error("Failed to move tab {0} into the session window")]
    MoveFailed(TabId),
    #[error(transparent)]
    Bookmark(#[from] BookmarkError),
    #[error(transparent)]
    Host(#[from] HostError),
}

// === SettingsError ===

/// Errors related to options persistence.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing options.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize options.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided options key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided options value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}
