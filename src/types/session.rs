use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::tab::TabId;

/// Side-channel key naming the session a live tab or window belongs to.
pub const SESSION_ID_KEY: &str = "sessionID";

/// Side-channel key naming the record a live tab is stored as.
pub const BOOKMARK_ID_KEY: &str = "bookmarkID";

/// Liveness of a session as seen by the session manager.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionState {
    /// Bookmarks only.
    Passive,
    /// Has an active session instance with live tabs.
    Active,
}

/// Summary of a stored session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub record_count: usize,
    pub state: SessionState,
}

/// Lifecycle phase of one active session instance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SessionPhase {
    /// Tabs are being opened or associated; no host subscriptions yet.
    Restoring,
    /// Subscribed to host events, mapping is live.
    Active,
    /// Subscriptions torn down, live tabs closed.
    SettingAside,
    /// Subscriptions torn down, live tabs left open.
    Freed,
}

impl SessionPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionPhase::SettingAside | SessionPhase::Freed)
    }
}

/// Bidirectional association between live tabs and tab records.
///
/// Keys are unique in both directions.
#[derive(Debug, Clone, Default)]
pub struct TabRecordMap {
    by_tab: HashMap<TabId, String>,
    by_record: HashMap<String, TabId>,
}

impl TabRecordMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Associates `tab_id` with `record_id`.
    ///
    /// Re-inserting the same pair is a no-op. If the record is claimed by a
    /// different tab the map is left unchanged and that tab is returned.
    pub fn insert(&mut self, tab_id: TabId, record_id: &str) -> Result<(), TabId> {
        if let Some(&owner) = self.by_record.get(record_id) {
            if owner != tab_id {
                return Err(owner);
            }
            return Ok(());
        }
        if let Some(previous) = self.by_tab.insert(tab_id, record_id.to_string()) {
            self.by_record.remove(&previous);
        }
        self.by_record.insert(record_id.to_string(), tab_id);
        Ok(())
    }

    /// Drops a tab, returning the record it was associated with.
    pub fn remove_tab(&mut self, tab_id: TabId) -> Option<String> {
        let record_id = self.by_tab.remove(&tab_id)?;
        self.by_record.remove(&record_id);
        Some(record_id)
    }

    /// Drops a record, returning the tab it was associated with.
    pub fn remove_record(&mut self, record_id: &str) -> Option<TabId> {
        let tab_id = self.by_record.remove(record_id)?;
        self.by_tab.remove(&tab_id);
        Some(tab_id)
    }

    pub fn record_for(&self, tab_id: TabId) -> Option<&str> {
        self.by_tab.get(&tab_id).map(String::as_str)
    }

    pub fn tab_for(&self, record_id: &str) -> Option<TabId> {
        self.by_record.get(record_id).copied()
    }

    pub fn contains_tab(&self, tab_id: TabId) -> bool {
        self.by_tab.contains_key(&tab_id)
    }

    pub fn tab_ids(&self) -> Vec<TabId> {
        let mut ids: Vec<TabId> = self.by_tab.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.by_tab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_tab.is_empty()
    }
}
