//! Tab snapshot codec.
//!
//! Converts between live tabs, tab records (bookmark entries) and the
//! parameters needed to reopen a tab. The record keeps the page URL and
//! title in the bookmark's own fields; everything else lives in a small
//! versioned JSON document stored as the bookmark's metadata.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as B64, Engine as _};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::bookmark::{BookmarkChanges, BookmarkNode, CreateBookmarkDetails};
use crate::types::tab::{Tab, TabCreateProperties, DEFAULT_COOKIE_STORE};

/// Version written into new record metadata.
pub const METADATA_VERSION: u32 = 1;

/// Placeholder page opened when the host refuses a record's URL.
pub const RESTORE_FAILED_PAGE: &str = "ext+tabsaside://restore-failed";

/// Restorable state of one tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub url: String,
    pub title: String,
    pub pinned: bool,
    pub muted: bool,
    pub cookie_store_id: String,
    pub fav_icon_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordMetadata {
    #[serde(default)]
    v: u32,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    muted: bool,
    #[serde(default)]
    container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fav_icon_url: Option<String>,
}

impl TabSnapshot {
    /// Captures the restorable state of a live tab.
    pub fn from_live_tab(tab: &Tab) -> Self {
        Self {
            url: tab.url.clone(),
            title: tab.title.clone(),
            pinned: tab.pinned,
            muted: tab.muted,
            cookie_store_id: tab
                .cookie_store_id
                .clone()
                .unwrap_or_else(|| DEFAULT_COOKIE_STORE.to_string()),
            fav_icon_url: tab.fav_icon_url.clone(),
        }
    }

    /// Decodes a tab record. Returns `None` for folders.
    ///
    /// Records written before metadata existed, or with unreadable metadata,
    /// decode as unpinned, unmuted tabs in the default container.
    pub fn from_record(record: &BookmarkNode) -> Option<Self> {
        let url = record.url.clone()?;
        let meta = match record.metadata.as_deref() {
            Some(raw) => serde_json::from_str::<RecordMetadata>(raw).unwrap_or_else(|e| {
                debug!(target: "tabs_aside.codec", record_id = %record.id, error = %e, "unreadable record metadata");
                RecordMetadata::legacy()
            }),
            None => RecordMetadata::legacy(),
        };

        Some(Self {
            url,
            title: record.title.clone(),
            pinned: meta.pinned,
            muted: meta.muted,
            cookie_store_id: meta
                .container
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| DEFAULT_COOKIE_STORE.to_string()),
            fav_icon_url: meta.fav_icon_url,
        })
    }

    /// Fields for creating the record of this snapshot inside `parent_id`.
    pub fn to_bookmark_create_args(&self, parent_id: &str, index: Option<usize>) -> CreateBookmarkDetails {
        CreateBookmarkDetails {
            parent_id: Some(parent_id.to_string()),
            index,
            title: self.title.clone(),
            url: Some(self.url.clone()),
            metadata: Some(self.encode_metadata()),
        }
    }

    /// Partial update covering what can change after creation.
    pub fn to_bookmark_update_args(&self) -> BookmarkChanges {
        BookmarkChanges {
            title: Some(self.title.clone()),
            url: Some(self.url.clone()),
            metadata: Some(self.encode_metadata()),
        }
    }

    /// Parameters for reopening this snapshot as a live tab.
    pub fn to_tab_create_args(&self, lazy: bool) -> TabCreateProperties {
        TabCreateProperties {
            url: Some(self.url.clone()),
            pinned: self.pinned,
            muted: self.muted,
            discarded: lazy,
            title: lazy.then(|| self.title.clone()),
            cookie_store_id: (self.cookie_store_id != DEFAULT_COOKIE_STORE)
                .then(|| self.cookie_store_id.clone()),
            ..Default::default()
        }
    }

    fn encode_metadata(&self) -> String {
        let meta = RecordMetadata {
            v: METADATA_VERSION,
            pinned: self.pinned,
            muted: self.muted,
            container: Some(self.cookie_store_id.clone()),
            fav_icon_url: self.fav_icon_url.clone(),
        };
        // Serializing a struct of plain fields cannot fail.
        serde_json::to_string(&meta).unwrap_or_default()
    }
}

impl RecordMetadata {
    fn legacy() -> Self {
        Self {
            v: 0,
            pinned: false,
            muted: false,
            container: None,
            fav_icon_url: None,
        }
    }
}

/// URL of the placeholder page shown instead of an unopenable record.
pub fn restore_failed_url(url: &str, title: &str) -> String {
    format!(
        "{}?url={}&title={}",
        RESTORE_FAILED_PAGE,
        B64.encode(url),
        B64.encode(title)
    )
}

pub fn is_restore_failed_url(url: &str) -> bool {
    url.starts_with(RESTORE_FAILED_PAGE)
}

/// Recovers the original URL and title from a placeholder page URL.
pub fn decode_restore_failed_url(url: &str) -> Option<(String, String)> {
    let query = url.strip_prefix(RESTORE_FAILED_PAGE)?.strip_prefix('?')?;
    let mut original = None;
    let mut title = String::new();
    for pair in query.split('&') {
        let (key, value) = pair.split_once('=')?;
        let decoded = String::from_utf8(B64.decode(value).ok()?).ok()?;
        match key {
            "url" => original = Some(decoded),
            "title" => title = decoded,
            _ => {}
        }
    }
    Some((original?, title))
}
