use serde::{Deserialize, Serialize};

/// User-configurable behavior of the extension.
///
/// Every field falls back to its default so option files written by older
/// versions keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Options {
    /// Restore and create sessions in a dedicated window.
    pub windowed_sessions: bool,
    /// Restore tabs discarded (unloaded) until they are first selected.
    pub lazy_loading: bool,
    /// What happens to a record when its live tab is closed.
    pub tab_closing: TabClosingBehavior,
    /// Bookmark folder holding all sessions. Bootstrapped on first start.
    pub root_folder_id: Option<String>,
    /// Title used when the root folder has to be created.
    pub root_folder_title: String,
    /// Debounce applied to record removals after tabs close.
    pub removal_delay_ms: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            windowed_sessions: false,
            lazy_loading: true,
            tab_closing: TabClosingBehavior::RemoveRecord,
            root_folder_id: None,
            root_folder_title: "Tabs Aside".to_string(),
            removal_delay_ms: 250,
        }
    }
}

/// Policy applied to a tab record when its live tab closes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TabClosingBehavior {
    #[default]
    RemoveRecord,
    KeepRecord,
}
