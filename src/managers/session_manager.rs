//! Session Manager for Tabs Aside.
//!
//! Registry of active sessions. Guarantees at most one [`ActiveSession`]
//! per session id and routes requests either to that instance or, for
//! passive sessions, straight to the bookmark store.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::host::Host;
use crate::managers::active_session::{ActiveRegistry, ActiveSession, OpenRecordOptions};
use crate::types::bookmark::BookmarkChanges;
use crate::types::errors::{BookmarkError, SessionError};
use crate::types::events::ChangeKind;
use crate::types::session::{SessionState, SessionSummary, BOOKMARK_ID_KEY, SESSION_ID_KEY};
use crate::types::tab::{Tab, TabId, TabUpdateProperties, WindowId};

/// Marks a session id as being constructed until dropped.
struct ConstructionGuard<'a> {
    pending: &'a Mutex<HashSet<String>>,
    session_id: String,
}

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        self.pending.lock().remove(&self.session_id);
    }
}

pub struct SessionManager {
    host: Host,
    active: Arc<ActiveRegistry>,
    pending: Mutex<HashSet<String>>,
}

impl SessionManager {
    pub fn new(host: Host) -> Self {
        Self {
            host,
            active: Arc::new(Mutex::new(Default::default())),
            pending: Mutex::new(HashSet::new()),
        }
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn get_active(&self, session_id: &str) -> Option<Arc<ActiveSession>> {
        self.active.lock().get(session_id).cloned()
    }

    pub fn is_active(&self, session_id: &str) -> bool {
        self.active.lock().contains_key(session_id)
    }

    pub fn state(&self, session_id: &str) -> SessionState {
        if self.is_active(session_id) {
            SessionState::Active
        } else {
            SessionState::Passive
        }
    }

    pub fn active_sessions(&self) -> Vec<Arc<ActiveSession>> {
        self.active.lock().values().cloned().collect()
    }

    /// The active session a live tab belongs to.
    pub fn session_for_tab(&self, tab_id: TabId) -> Option<Arc<ActiveSession>> {
        self.active
            .lock()
            .values()
            .find(|session| session.contains_tab(tab_id))
            .cloned()
    }

    fn begin(&self, session_id: &str) -> Result<ConstructionGuard<'_>, SessionError> {
        if !self.pending.lock().insert(session_id.to_string()) {
            return Err(SessionError::Busy(session_id.to_string()));
        }
        Ok(ConstructionGuard {
            pending: &self.pending,
            session_id: session_id.to_string(),
        })
    }

    fn register(&self, session: &Arc<ActiveSession>) {
        if session.is_active() {
            self.active
                .lock()
                .insert(session.id().to_string(), session.clone());
            debug!(target: "tabs_aside.manager", session_id = session.id(), "session registered");
        }
    }

    /// Restores a whole session. An already active one is highlighted instead.
    pub async fn restore(&self, session_id: &str) -> Result<Arc<ActiveSession>, SessionError> {
        let _guard = self.begin(session_id)?;
        if let Some(existing) = self.get_active(session_id) {
            existing.highlight().await;
            return Ok(existing);
        }
        let session = ActiveSession::restore_all(self.host.clone(), &self.active, session_id).await?;
        self.register(&session);
        Ok(session)
    }

    /// Opens a single record, joining the active instance of its session if
    /// there is one.
    pub async fn restore_record(&self, record_id: &str) -> Result<Arc<ActiveSession>, SessionError> {
        let record = self.host.bookmarks.get(record_id).await.map_err(not_found(record_id))?;
        let session_id = record
            .parent_id
            .clone()
            .ok_or_else(|| SessionError::NotFound(record_id.to_string()))?;
        let _guard = self.begin(&session_id)?;

        if let Some(session) = self.get_active(&session_id) {
            match session.tab_for_record(record_id) {
                Some(tab_id) => {
                    self.host
                        .tabs
                        .update_tab(
                            tab_id,
                            TabUpdateProperties {
                                active: Some(true),
                                ..Default::default()
                            },
                        )
                        .await?;
                }
                None => {
                    let open = OpenRecordOptions {
                        make_active: true,
                        suppress_create_event: true,
                        keep_record_order: true,
                        ..Default::default()
                    };
                    session.open_record_as_tab(&record, open).await?;
                    self.host.notifier.notify(&session_id, ChangeKind::Contents);
                }
            }
            return Ok(session);
        }

        let session = ActiveSession::restore_single(self.host.clone(), &self.active, record_id).await?;
        self.register(&session);
        Ok(session)
    }

    /// Creates an active session from open tabs.
    pub async fn create_session(&self, tabs: Vec<Tab>, title: &str) -> Result<Arc<ActiveSession>, SessionError> {
        let session = ActiveSession::create_from_tabs(self.host.clone(), &self.active, tabs, title).await?;
        self.register(&session);
        info!(target: "tabs_aside.manager", session_id = session.id(), title, "session created");
        Ok(session)
    }

    /// Creates an active session owning an existing window.
    pub async fn create_window_session(&self, window_id: WindowId, title: &str) -> Result<Arc<ActiveSession>, SessionError> {
        let session = ActiveSession::create_from_window(self.host.clone(), &self.active, window_id, title).await?;
        self.register(&session);
        info!(target: "tabs_aside.manager", session_id = session.id(), title, window_id, "window session created");
        Ok(session)
    }

    /// Stores open tabs as a new session and closes them. Returns the
    /// session id.
    pub async fn aside_tabs(&self, tabs: Vec<Tab>, title: &str) -> Result<String, SessionError> {
        let session = self.create_session(tabs, title).await?;
        session.set_tabs_or_window_aside().await?;
        Ok(session.id().to_string())
    }

    /// Stores a window as a new session and closes it. Returns the session id.
    pub async fn aside_window(&self, window_id: WindowId, title: &str) -> Result<String, SessionError> {
        let session = self.create_window_session(window_id, title).await?;
        session.set_tabs_or_window_aside().await?;
        Ok(session.id().to_string())
    }

    /// Closes the live tabs of a session. Passive sessions only need to exist.
    pub async fn set_aside(&self, session_id: &str) -> Result<(), SessionError> {
        match self.get_active(session_id) {
            Some(session) => session.set_tabs_or_window_aside().await,
            None => {
                self.host
                    .bookmarks
                    .get(session_id)
                    .await
                    .map_err(not_found(session_id))?;
                Ok(())
            }
        }
    }

    pub async fn set_tab_aside(&self, session_id: &str, tab_id: TabId) -> Result<(), SessionError> {
        let session = self
            .get_active(session_id)
            .ok_or_else(|| SessionError::NotActive(session_id.to_string()))?;
        session.set_tab_aside(tab_id).await
    }

    /// Deletes a session, closing its live tabs first.
    pub async fn remove_session(&self, session_id: &str) -> Result<(), SessionError> {
        if let Some(session) = self.get_active(session_id) {
            session.set_tabs_or_window_aside().await?;
        }
        self.host
            .bookmarks
            .remove_tree(session_id)
            .await
            .map_err(not_found(session_id))?;
        info!(target: "tabs_aside.manager", session_id, "session removed");
        self.host.notifier.notify(session_id, ChangeKind::Removed);
        Ok(())
    }

    /// Deletes one record. A session left without records is removed.
    pub async fn remove_record(&self, record_id: &str) -> Result<(), SessionError> {
        let record = self.host.bookmarks.get(record_id).await.map_err(not_found(record_id))?;
        let session_id = record
            .parent_id
            .ok_or_else(|| SessionError::NotFound(record_id.to_string()))?;

        if let Some(session) = self.get_active(&session_id) {
            return session.remove_record(record_id).await;
        }

        self.host.bookmarks.remove(record_id).await?;
        if self.host.bookmarks.get_children(Some(&session_id)).await?.is_empty() {
            self.host.bookmarks.remove_tree(&session_id).await?;
            info!(target: "tabs_aside.manager", session_id = %session_id, "last record removed, session deleted");
            self.host.notifier.notify(&session_id, ChangeKind::Removed);
        } else {
            self.host.notifier.notify(&session_id, ChangeKind::Contents);
        }
        Ok(())
    }

    pub async fn rename_session(&self, session_id: &str, title: &str) -> Result<(), SessionError> {
        self.host
            .bookmarks
            .update(
                session_id,
                BookmarkChanges {
                    title: Some(title.to_string()),
                    ..Default::default()
                },
            )
            .await
            .map_err(not_found(session_id))?;
        match self.get_active(session_id) {
            Some(session) => session.update_title(title).await,
            None => {
                self.host.notifier.notify(session_id, ChangeKind::Contents);
                Ok(())
            }
        }
    }

    /// Every session folder under the root folder.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, SessionError> {
        let root = self.host.options.options().root_folder_id;
        let folders = self.host.bookmarks.get_children(root.as_deref()).await?;

        let mut sessions = Vec::new();
        for folder in folders.into_iter().filter(|node| node.is_folder()) {
            let record_count = self
                .host
                .bookmarks
                .get_children(Some(&folder.id))
                .await?
                .iter()
                .filter(|node| !node.is_folder())
                .count();
            sessions.push(SessionSummary {
                state: self.state(&folder.id),
                id: folder.id,
                title: folder.title,
                record_count,
            });
        }
        Ok(sessions)
    }

    /// Re-adopts windows and tabs still carrying session values after a
    /// restart. Returns the number of sessions reactivated.
    pub async fn reactivate_all(&self) -> Result<usize, SessionError> {
        let windows = self.host.tabs.get_all_windows().await?;
        let mut reactivated = 0;
        let mut claimed = HashSet::new();

        for window in &windows {
            let Some(session_id) = self.host.values.get_window_value(window.id, SESSION_ID_KEY).await? else {
                continue;
            };
            if self.is_active(&session_id) || !self.session_exists(&session_id).await {
                debug!(target: "tabs_aside.manager", session_id = %session_id, window_id = window.id, "stale window value");
                self.host.values.remove_window_value(window.id, SESSION_ID_KEY).await?;
                continue;
            }
            match ActiveSession::reactivate_window(self.host.clone(), &self.active, &session_id, window.id).await {
                Ok(session) => {
                    self.register(&session);
                    claimed.insert(window.id);
                    reactivated += 1;
                }
                Err(e) => {
                    warn!(target: "tabs_aside.manager", session_id = %session_id, window_id = window.id, error = %e, "window reactivation failed");
                }
            }
        }

        let mut loose: BTreeMap<String, Vec<Tab>> = BTreeMap::new();
        for window in windows.iter().filter(|w| !claimed.contains(&w.id)) {
            for tab in &window.tabs {
                if let Some(session_id) = self.host.values.get_tab_value(tab.id, SESSION_ID_KEY).await? {
                    loose.entry(session_id).or_default().push(tab.clone());
                }
            }
        }

        for (session_id, tabs) in loose {
            if self.is_active(&session_id) || !self.session_exists(&session_id).await {
                debug!(target: "tabs_aside.manager", session_id = %session_id, tabs = tabs.len(), "stale tab values");
                for tab in &tabs {
                    for key in [SESSION_ID_KEY, BOOKMARK_ID_KEY] {
                        self.host.values.remove_tab_value(tab.id, key).await?;
                    }
                }
                continue;
            }
            match ActiveSession::reactivate_tabs(self.host.clone(), &self.active, &session_id, tabs).await {
                Ok(session) => {
                    self.register(&session);
                    reactivated += 1;
                }
                Err(e) => {
                    warn!(target: "tabs_aside.manager", session_id = %session_id, error = %e, "tab reactivation failed");
                }
            }
        }

        info!(target: "tabs_aside.manager", reactivated, "recovery finished");
        Ok(reactivated)
    }

    /// Drops every active session, leaving tabs open and unmarked.
    pub async fn free_all(&self) {
        for session in self.active_sessions() {
            session.free().await;
        }
    }

    /// Drops every active session, leaving tabs open and marked for recovery.
    pub async fn suspend_all(&self) {
        for session in self.active_sessions() {
            session.suspend().await;
        }
    }

    async fn session_exists(&self, session_id: &str) -> bool {
        self.host
            .bookmarks
            .get(session_id)
            .await
            .is_ok_and(|node| node.is_folder())
    }
}

fn not_found(id: &str) -> impl FnOnce(BookmarkError) -> SessionError + '_ {
    move |e| match e {
        BookmarkError::NotFound(_) | BookmarkError::FolderNotFound(_) => {
            SessionError::NotFound(id.to_string())
        }
        other => other.into(),
    }
}
