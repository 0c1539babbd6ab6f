use serde::{Deserialize, Serialize};

/// Identifier the host assigns to a live tab.
pub type TabId = i64;

/// Identifier the host assigns to a browser window.
pub type WindowId = i64;

/// Container used by tabs that were not opened in a contextual identity.
pub const DEFAULT_COOKIE_STORE: &str = "firefox-default";

/// A live tab as observed through the host's tab surface.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tab {
    pub id: TabId,
    pub window_id: WindowId,
    pub index: usize,
    pub url: String,
    pub title: String,
    pub fav_icon_url: Option<String>,
    pub pinned: bool,
    pub muted: bool,
    pub active: bool,
    pub discarded: bool,
    pub status: TabStatus,
    pub opener_tab_id: Option<TabId>,
    pub cookie_store_id: Option<String>,
}

/// Loading state of a tab.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    #[default]
    Complete,
}

/// Parameters for opening a new live tab.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TabCreateProperties {
    pub url: Option<String>,
    pub window_id: Option<WindowId>,
    pub index: Option<usize>,
    pub active: bool,
    pub pinned: bool,
    pub muted: bool,
    pub discarded: bool,
    /// Title shown for discarded tabs until they load.
    pub title: Option<String>,
    pub cookie_store_id: Option<String>,
    pub opener_tab_id: Option<TabId>,
}

/// Partial update of a live tab.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TabUpdateProperties {
    pub url: Option<String>,
    pub active: Option<bool>,
    pub pinned: Option<bool>,
    pub muted: Option<bool>,
}

/// Fields reported as changed by a tab-updated notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TabChangeInfo {
    pub status: Option<TabStatus>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub muted: Option<bool>,
    pub pinned: Option<bool>,
    pub fav_icon_url: Option<String>,
    pub discarded: Option<bool>,
}

impl TabChangeInfo {
    /// Whether the change touches state that is persisted in a tab record.
    pub fn affects_record(&self) -> bool {
        self.status == Some(TabStatus::Complete)
            || self.url.is_some()
            || self.title.is_some()
            || self.muted.is_some()
            || self.pinned.is_some()
    }
}

/// A browser window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Window {
    pub id: WindowId,
    pub title_preface: Option<String>,
    pub focused: bool,
    pub tabs: Vec<Tab>,
}

/// Parameters for opening a new window.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WindowCreateProperties {
    /// URL of the placeholder tab the window opens with.
    pub url: Option<String>,
    pub focused: bool,
    pub title_preface: Option<String>,
}
