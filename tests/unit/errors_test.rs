use tabs_aside::types::errors::*;

// === BookmarkError Tests ===

#[test]
fn bookmark_error_display_variants() {
    assert_eq!(
        BookmarkError::NotFound("bm-1".to_string()).to_string(),
        "Bookmark not found: bm-1"
    );
    assert_eq!(
        BookmarkError::FolderNotFound("folder-1".to_string()).to_string(),
        "Bookmark folder not found: folder-1"
    );
    assert_eq!(
        BookmarkError::FolderNotEmpty("folder-2".to_string()).to_string(),
        "Bookmark folder is not empty: folder-2"
    );
    assert_eq!(
        BookmarkError::DatabaseError("connection lost".to_string()).to_string(),
        "Bookmark database error: connection lost"
    );
}

#[test]
fn bookmark_error_from_rusqlite() {
    let err: BookmarkError = rusqlite::Error::QueryReturnedNoRows.into();
    assert!(matches!(err, BookmarkError::DatabaseError(_)));
}

// === HostError Tests ===

#[test]
fn host_error_display_variants() {
    assert_eq!(HostError::TabNotFound(7).to_string(), "Tab not found: 7");
    assert_eq!(HostError::WindowNotFound(3).to_string(), "Window not found: 3");
    assert_eq!(
        HostError::Rejected("Illegal URL: about:config".to_string()).to_string(),
        "Host rejected operation: Illegal URL: about:config"
    );
    assert_eq!(HostError::InvalidIndex(99).to_string(), "Invalid tab index: 99");
}

#[test]
fn host_error_implements_error_trait() {
    let err: Box<dyn std::error::Error> = Box::new(HostError::TabNotFound(1));
    assert!(err.source().is_none());
}

// === SessionError Tests ===

#[test]
fn session_error_display_variants() {
    assert_eq!(SessionError::EmptySession.to_string(), "Session cannot be empty");
    assert_eq!(
        SessionError::NotFound("s-1".to_string()).to_string(),
        "Session not found: s-1"
    );
    assert_eq!(
        SessionError::WindowAlreadySet(4).to_string(),
        "Session already has a window: 4"
    );
    assert_eq!(
        SessionError::TabsAlreadyAdded("s-2".to_string()).to_string(),
        "Cannot attach a window to session s-2 after tabs were added"
    );
    assert_eq!(
        SessionError::TabNotInSession {
            tab_id: 12,
            session_id: "s-3".to_string()
        }
        .to_string(),
        "Tab 12 is not part of session s-3"
    );
    assert_eq!(
        SessionError::RecordAlreadyMapped {
            record_id: "r-1".to_string(),
            tab_id: 5
        }
        .to_string(),
        "Record r-1 is already associated with tab 5"
    );
    assert_eq!(
        SessionError::NotActive("s-4".to_string()).to_string(),
        "Session is no longer active: s-4"
    );
    assert_eq!(
        SessionError::Busy("s-5".to_string()).to_string(),
        "Session is already being restored: s-5"
    );
    assert_eq!(
        SessionError::MoveFailed(8).to_string(),
        "Failed to move tab 8 into the session window"
    );
}

#[test]
fn session_error_wraps_store_and_host_errors() {
    let err: SessionError = BookmarkError::NotFound("bm-9".to_string()).into();
    assert!(matches!(err, SessionError::Bookmark(BookmarkError::NotFound(_))));
    assert_eq!(err.to_string(), "Bookmark not found: bm-9");

    let err: SessionError = HostError::WindowNotFound(2).into();
    assert!(matches!(err, SessionError::Host(HostError::WindowNotFound(2))));
    assert_eq!(err.to_string(), "Window not found: 2");
}

// === SettingsError Tests ===

#[test]
fn settings_error_display_variants() {
    assert_eq!(
        SettingsError::IoError("disk full".to_string()).to_string(),
        "Settings I/O error: disk full"
    );
    assert_eq!(
        SettingsError::SerializationError("bad json".to_string()).to_string(),
        "Settings serialization error: bad json"
    );
    assert_eq!(
        SettingsError::InvalidKey("nope".to_string()).to_string(),
        "Invalid settings key: nope"
    );
    assert_eq!(
        SettingsError::InvalidValue("wrong type".to_string()).to_string(),
        "Invalid settings value: wrong type"
    );
}
