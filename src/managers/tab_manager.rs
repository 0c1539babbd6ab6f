//! Tab/window control surface and side-channel values.
//!
//! [`TabHostTrait`] and [`SessionValuesTrait`] describe what the session
//! core needs from the browser. [`TabManager`] is a complete in-memory
//! browser implementing both: windows with ordered tab strips, pinned tabs
//! kept to the left, discarded tabs, per-tab and per-window values, and
//! lifecycle events published through an [`EventHub`].

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::services::event_hub::EventHub;
use crate::types::errors::HostError;
use crate::types::events::HostEvent;
use crate::types::tab::{
    Tab, TabChangeInfo, TabCreateProperties, TabId, TabStatus, TabUpdateProperties, Window,
    WindowCreateProperties, WindowId,
};

/// Page opened in new windows and tabs without a URL.
pub const NEW_TAB_URL: &str = "about:newtab";

/// Tab and window primitives of the host browser.
///
/// Operations that affect nothing (e.g. moving unknown tabs) report an empty
/// result instead of failing; callers decide whether that is an error.
#[async_trait]
pub trait TabHostTrait: Send + Sync {
    async fn get_tab(&self, tab_id: TabId) -> Result<Tab, HostError>;
    /// Tabs of one window, or of all windows, in strip order.
    async fn query_tabs(&self, window_id: Option<WindowId>) -> Result<Vec<Tab>, HostError>;
    async fn create_tab(&self, props: TabCreateProperties) -> Result<Tab, HostError>;
    async fn update_tab(&self, tab_id: TabId, props: TabUpdateProperties) -> Result<Tab, HostError>;
    /// Moves tabs into `window_id` at `index` (end of strip when `None`).
    async fn move_tabs(&self, tab_ids: &[TabId], window_id: WindowId, index: Option<usize>) -> Result<Vec<Tab>, HostError>;
    async fn remove_tabs(&self, tab_ids: &[TabId]) -> Result<(), HostError>;
    async fn highlight(&self, window_id: WindowId, tab_indices: &[usize]) -> Result<(), HostError>;
    async fn get_window(&self, window_id: WindowId) -> Result<Window, HostError>;
    async fn get_all_windows(&self) -> Result<Vec<Window>, HostError>;
    async fn create_window(&self, props: WindowCreateProperties) -> Result<Window, HostError>;
    async fn remove_window(&self, window_id: WindowId) -> Result<(), HostError>;
    async fn set_window_title_preface(&self, window_id: WindowId, preface: Option<String>) -> Result<(), HostError>;
}

/// Small persistent key-value attachments on tabs and windows.
#[async_trait]
pub trait SessionValuesTrait: Send + Sync {
    async fn set_tab_value(&self, tab_id: TabId, key: &str, value: &str) -> Result<(), HostError>;
    async fn get_tab_value(&self, tab_id: TabId, key: &str) -> Result<Option<String>, HostError>;
    async fn remove_tab_value(&self, tab_id: TabId, key: &str) -> Result<(), HostError>;
    async fn set_window_value(&self, window_id: WindowId, key: &str, value: &str) -> Result<(), HostError>;
    async fn get_window_value(&self, window_id: WindowId, key: &str) -> Result<Option<String>, HostError>;
    async fn remove_window_value(&self, window_id: WindowId, key: &str) -> Result<(), HostError>;
}

struct TabState {
    tab: Tab,
    values: HashMap<String, String>,
}

#[derive(Default)]
struct WindowState {
    order: Vec<TabId>,
    title_preface: Option<String>,
    values: HashMap<String, String>,
    highlighted: Vec<TabId>,
}

#[derive(Default)]
struct BrowserState {
    next_tab_id: TabId,
    next_window_id: WindowId,
    windows: BTreeMap<WindowId, WindowState>,
    tabs: HashMap<TabId, TabState>,
    focused_window: Option<WindowId>,
}

impl BrowserState {
    fn tab(&self, tab_id: TabId) -> Result<&TabState, HostError> {
        self.tabs.get(&tab_id).ok_or(HostError::TabNotFound(tab_id))
    }

    fn window(&self, window_id: WindowId) -> Result<&WindowState, HostError> {
        self.windows
            .get(&window_id)
            .ok_or(HostError::WindowNotFound(window_id))
    }

    fn window_mut(&mut self, window_id: WindowId) -> Result<&mut WindowState, HostError> {
        self.windows
            .get_mut(&window_id)
            .ok_or(HostError::WindowNotFound(window_id))
    }

    fn open_window(&mut self) -> WindowId {
        self.next_window_id += 1;
        let id = self.next_window_id;
        self.windows.insert(id, WindowState::default());
        self.focused_window = Some(id);
        id
    }

    /// Count of pinned tabs in a window (they are always at the left).
    fn pinned_count(&self, window_id: WindowId) -> usize {
        self.windows.get(&window_id).map_or(0, |w| {
            w.order
                .iter()
                .filter(|id| self.tabs.get(id).is_some_and(|t| t.tab.pinned))
                .count()
        })
    }

    /// Clamps a requested strip position so pinned tabs stay left.
    fn clamp_index(&self, window_id: WindowId, requested: Option<usize>, pinned: bool, len: usize) -> usize {
        let pinned_count = self.pinned_count(window_id);
        let index = requested.unwrap_or(len).min(len);
        if pinned {
            index.min(pinned_count)
        } else {
            index.max(pinned_count)
        }
    }

    /// Rewrites `index`/`window_id` of every tab in the window.
    fn reindex(&mut self, window_id: WindowId) {
        let Some(window) = self.windows.get(&window_id) else {
            return;
        };
        for (i, id) in window.order.iter().enumerate() {
            if let Some(state) = self.tabs.get_mut(id) {
                state.tab.index = i;
                state.tab.window_id = window_id;
            }
        }
    }

    fn snapshot_window(&self, window_id: WindowId) -> Result<Window, HostError> {
        let window = self.window(window_id)?;
        Ok(Window {
            id: window_id,
            title_preface: window.title_preface.clone(),
            focused: self.focused_window == Some(window_id),
            tabs: window
                .order
                .iter()
                .filter_map(|id| self.tabs.get(id).map(|t| t.tab.clone()))
                .collect(),
        })
    }

    /// Detaches a tab from its window strip without emitting anything.
    fn unlink(&mut self, tab_id: TabId) -> Option<(WindowId, usize)> {
        let window_id = self.tabs.get(&tab_id)?.tab.window_id;
        let window = self.windows.get_mut(&window_id)?;
        let position = window.order.iter().position(|id| *id == tab_id)?;
        window.order.remove(position);
        window.highlighted.retain(|id| *id != tab_id);
        self.reindex(window_id);
        Some((window_id, position))
    }

    /// Drops a window that has no tabs left.
    fn close_if_empty(&mut self, window_id: WindowId, events: &mut Vec<HostEvent>) {
        if self.windows.get(&window_id).is_some_and(|w| w.order.is_empty()) {
            self.windows.remove(&window_id);
            if self.focused_window == Some(window_id) {
                self.focused_window = self.windows.keys().next_back().copied();
            }
            events.push(HostEvent::WindowRemoved(window_id));
        }
    }

    fn activate(&mut self, window_id: WindowId, tab_id: TabId) {
        let ids: Vec<TabId> = self
            .windows
            .get(&window_id)
            .map(|w| w.order.clone())
            .unwrap_or_default();
        for id in ids {
            if let Some(state) = self.tabs.get_mut(&id) {
                state.tab.active = id == tab_id;
                if id == tab_id {
                    state.tab.discarded = false;
                }
            }
        }
    }
}

/// In-memory browser for the demo binary and the test-suite.
pub struct TabManager {
    state: Mutex<BrowserState>,
    events: Arc<EventHub>,
}

impl TabManager {
    pub fn new(events: Arc<EventHub>) -> Self {
        Self {
            state: Mutex::new(BrowserState::default()),
            events,
        }
    }

    /// The hub this browser publishes its lifecycle events to.
    pub fn events(&self) -> Arc<EventHub> {
        self.events.clone()
    }

    fn publish(&self, events: Vec<HostEvent>) {
        for event in events {
            self.events.emit(event);
        }
    }

    /// URLs a browser extension is not allowed to open.
    pub fn is_privileged_url(url: &str) -> bool {
        let url = url.trim().to_ascii_lowercase();
        if url == "about:blank" || url == NEW_TAB_URL {
            return false;
        }
        ["about:", "chrome:", "file:", "javascript:", "data:", "view-source:"]
            .iter()
            .any(|scheme| url.starts_with(scheme))
    }

    /// Simulates a page finishing to load with the given title.
    pub fn complete_load(&self, tab_id: TabId, title: &str) -> Result<Tab, HostError> {
        let mut state = self.state.lock();
        let tab_state = state
            .tabs
            .get_mut(&tab_id)
            .ok_or(HostError::TabNotFound(tab_id))?;
        tab_state.tab.title = title.to_string();
        tab_state.tab.status = TabStatus::Complete;
        tab_state.tab.discarded = false;
        let tab = tab_state.tab.clone();
        drop(state);

        self.publish(vec![HostEvent::TabUpdated {
            tab_id,
            change: TabChangeInfo {
                status: Some(TabStatus::Complete),
                title: Some(title.to_string()),
                ..Default::default()
            },
            tab: tab.clone(),
        }]);
        Ok(tab)
    }

    /// Simulates the favicon of a tab changing.
    pub fn change_favicon(&self, tab_id: TabId, fav_icon_url: &str) -> Result<Tab, HostError> {
        let mut state = self.state.lock();
        let tab_state = state
            .tabs
            .get_mut(&tab_id)
            .ok_or(HostError::TabNotFound(tab_id))?;
        tab_state.tab.fav_icon_url = Some(fav_icon_url.to_string());
        let tab = tab_state.tab.clone();
        drop(state);

        self.publish(vec![HostEvent::TabUpdated {
            tab_id,
            change: TabChangeInfo {
                fav_icon_url: Some(fav_icon_url.to_string()),
                ..Default::default()
            },
            tab: tab.clone(),
        }]);
        Ok(tab)
    }

    /// Tabs currently highlighted (multi-selected) in a window.
    pub fn highlighted(&self, window_id: WindowId) -> Vec<TabId> {
        self.state
            .lock()
            .windows
            .get(&window_id)
            .map(|w| w.highlighted.clone())
            .unwrap_or_default()
    }

    pub fn tab_count(&self) -> usize {
        self.state.lock().tabs.len()
    }

    pub fn window_count(&self) -> usize {
        self.state.lock().windows.len()
    }

    fn create_tab_sync(&self, props: TabCreateProperties) -> Result<Tab, HostError> {
        let url = props.url.clone().unwrap_or_else(|| NEW_TAB_URL.to_string());
        if Self::is_privileged_url(&url) {
            return Err(HostError::Rejected(format!("Illegal URL: {}", url)));
        }

        let mut state = self.state.lock();
        let mut events = Vec::new();
        let window_id = match props.window_id.or(state.focused_window) {
            Some(id) => {
                state.window(id)?;
                id
            }
            None => state.open_window(),
        };

        state.next_tab_id += 1;
        let id = state.next_tab_id;
        let len = state.window(window_id)?.order.len();
        let index = state.clamp_index(window_id, props.index, props.pinned, len);
        let discarded = props.discarded && !props.active;
        let tab = Tab {
            id,
            window_id,
            index,
            title: props.title.clone().unwrap_or_else(|| url.clone()),
            url,
            fav_icon_url: None,
            pinned: props.pinned,
            muted: props.muted,
            active: false,
            discarded,
            status: TabStatus::Complete,
            opener_tab_id: props.opener_tab_id,
            cookie_store_id: props.cookie_store_id.clone(),
        };
        state.tabs.insert(
            id,
            TabState {
                tab,
                values: HashMap::new(),
            },
        );
        state.window_mut(window_id)?.order.insert(index, id);
        state.reindex(window_id);
        let has_active = state
            .window(window_id)?
            .order
            .iter()
            .any(|t| state.tabs.get(t).is_some_and(|s| s.tab.active));
        if props.active || !has_active {
            state.activate(window_id, id);
        }

        let tab = state.tab(id)?.tab.clone();
        events.push(HostEvent::TabCreated(tab.clone()));
        drop(state);
        self.publish(events);
        Ok(tab)
    }

    fn update_tab_sync(&self, tab_id: TabId, props: TabUpdateProperties) -> Result<Tab, HostError> {
        if let Some(url) = &props.url {
            if Self::is_privileged_url(url) {
                return Err(HostError::Rejected(format!("Illegal URL: {}", url)));
            }
        }

        let mut state = self.state.lock();
        let mut events = Vec::new();
        let mut change = TabChangeInfo::default();
        let window_id = state.tab(tab_id)?.tab.window_id;

        if let Some(pinned) = props.pinned {
            let current = state.tab(tab_id)?.tab.clone();
            if current.pinned != pinned {
                let pinned_before = state.pinned_count(window_id);
                if let Some(s) = state.tabs.get_mut(&tab_id) {
                    s.tab.pinned = pinned;
                }
                let window = state.window_mut(window_id)?;
                window.order.retain(|id| *id != tab_id);
                // Pinned tabs go to the end of the pinned section, unpinned
                // ones right after it.
                let target = if pinned { pinned_before } else { pinned_before - 1 };
                let target = target.min(window.order.len());
                window.order.insert(target, tab_id);
                state.reindex(window_id);
                change.pinned = Some(pinned);
                if target != current.index {
                    events.push(HostEvent::TabMoved {
                        tab_id,
                        window_id,
                        from_index: current.index,
                        to_index: target,
                    });
                }
            }
        }

        let tab_state = state
            .tabs
            .get_mut(&tab_id)
            .ok_or(HostError::TabNotFound(tab_id))?;
        if let Some(muted) = props.muted {
            if tab_state.tab.muted != muted {
                tab_state.tab.muted = muted;
                change.muted = Some(muted);
            }
        }
        if let Some(url) = props.url {
            tab_state.tab.title = url.clone();
            tab_state.tab.url = url.clone();
            tab_state.tab.status = TabStatus::Loading;
            tab_state.tab.discarded = false;
            change.url = Some(url);
            change.status = Some(TabStatus::Loading);
        }
        if props.active == Some(true) {
            state.activate(window_id, tab_id);
        }

        let tab = state.tab(tab_id)?.tab.clone();
        if change != TabChangeInfo::default() {
            events.push(HostEvent::TabUpdated {
                tab_id,
                change,
                tab: tab.clone(),
            });
        }
        drop(state);
        self.publish(events);
        Ok(tab)
    }

    fn move_tabs_sync(&self, tab_ids: &[TabId], window_id: WindowId, index: Option<usize>) -> Result<Vec<Tab>, HostError> {
        let mut state = self.state.lock();
        state.window(window_id)?;
        let mut events = Vec::new();
        let mut moved = Vec::new();
        let mut next_index = index;

        for &tab_id in tab_ids {
            let Ok(current) = state.tab(tab_id).map(|s| s.tab.clone()) else {
                continue;
            };
            let Some((old_window, old_position)) = state.unlink(tab_id) else {
                continue;
            };
            let len = state.window(window_id)?.order.len();
            let target = state.clamp_index(window_id, next_index, current.pinned, len);
            state.window_mut(window_id)?.order.insert(target, tab_id);
            state.reindex(window_id);
            next_index = next_index.map(|_| target + 1);

            if old_window == window_id {
                if old_position != target {
                    events.push(HostEvent::TabMoved {
                        tab_id,
                        window_id,
                        from_index: old_position,
                        to_index: target,
                    });
                }
            } else {
                if current.active {
                    if let Some(s) = state.tabs.get_mut(&tab_id) {
                        s.tab.active = false;
                    }
                }
                events.push(HostEvent::TabDetached {
                    tab_id,
                    old_window_id: old_window,
                    old_position,
                });
                events.push(HostEvent::TabAttached {
                    tab_id,
                    new_window_id: window_id,
                    new_position: target,
                });
                state.close_if_empty(old_window, &mut events);
            }
            moved.push(state.tab(tab_id)?.tab.clone());
        }

        drop(state);
        self.publish(events);
        Ok(moved)
    }

    fn remove_tabs_sync(&self, tab_ids: &[TabId], window_closing: bool) -> Result<(), HostError> {
        let mut state = self.state.lock();
        let mut events = Vec::new();
        let mut missing = None;

        for &tab_id in tab_ids {
            let Some((window_id, _)) = state.unlink(tab_id) else {
                missing.get_or_insert(tab_id);
                continue;
            };
            state.tabs.remove(&tab_id);
            events.push(HostEvent::TabRemoved {
                tab_id,
                window_id,
                is_window_closing: window_closing,
            });
            state.close_if_empty(window_id, &mut events);
        }

        drop(state);
        self.publish(events);
        match missing {
            Some(tab_id) => Err(HostError::TabNotFound(tab_id)),
            None => Ok(()),
        }
    }

    fn highlight_sync(&self, window_id: WindowId, tab_indices: &[usize]) -> Result<(), HostError> {
        if tab_indices.is_empty() {
            return Err(HostError::Rejected("No tabs to highlight".to_string()));
        }
        let mut state = self.state.lock();
        let window = state.window(window_id)?;
        let mut selected = Vec::with_capacity(tab_indices.len());
        for &i in tab_indices {
            let id = *window.order.get(i).ok_or(HostError::InvalidIndex(i))?;
            selected.push(id);
        }
        state.activate(window_id, selected[0]);
        state.window_mut(window_id)?.highlighted = selected;
        state.focused_window = Some(window_id);
        Ok(())
    }

    fn create_window_sync(&self, props: WindowCreateProperties) -> Result<Window, HostError> {
        let window_id = {
            let mut state = self.state.lock();
            let id = state.open_window();
            state.window_mut(id)?.title_preface = props.title_preface.clone();
            id
        };
        self.create_tab_sync(TabCreateProperties {
            url: props.url,
            window_id: Some(window_id),
            active: true,
            ..Default::default()
        })?;
        self.state.lock().snapshot_window(window_id)
    }
}

#[async_trait]
impl TabHostTrait for TabManager {
    async fn get_tab(&self, tab_id: TabId) -> Result<Tab, HostError> {
        Ok(self.state.lock().tab(tab_id)?.tab.clone())
    }

    async fn query_tabs(&self, window_id: Option<WindowId>) -> Result<Vec<Tab>, HostError> {
        let state = self.state.lock();
        let window_ids: Vec<WindowId> = match window_id {
            Some(id) => {
                state.window(id)?;
                vec![id]
            }
            None => state.windows.keys().copied().collect(),
        };
        let mut tabs = Vec::new();
        for id in window_ids {
            tabs.extend(state.snapshot_window(id)?.tabs);
        }
        Ok(tabs)
    }

    async fn create_tab(&self, props: TabCreateProperties) -> Result<Tab, HostError> {
        self.create_tab_sync(props)
    }

    async fn update_tab(&self, tab_id: TabId, props: TabUpdateProperties) -> Result<Tab, HostError> {
        self.update_tab_sync(tab_id, props)
    }

    async fn move_tabs(&self, tab_ids: &[TabId], window_id: WindowId, index: Option<usize>) -> Result<Vec<Tab>, HostError> {
        self.move_tabs_sync(tab_ids, window_id, index)
    }

    async fn remove_tabs(&self, tab_ids: &[TabId]) -> Result<(), HostError> {
        self.remove_tabs_sync(tab_ids, false)
    }

    async fn highlight(&self, window_id: WindowId, tab_indices: &[usize]) -> Result<(), HostError> {
        self.highlight_sync(window_id, tab_indices)
    }

    async fn get_window(&self, window_id: WindowId) -> Result<Window, HostError> {
        self.state.lock().snapshot_window(window_id)
    }

    async fn get_all_windows(&self) -> Result<Vec<Window>, HostError> {
        let state = self.state.lock();
        state
            .windows
            .keys()
            .map(|id| state.snapshot_window(*id))
            .collect()
    }

    async fn create_window(&self, props: WindowCreateProperties) -> Result<Window, HostError> {
        self.create_window_sync(props)
    }

    async fn remove_window(&self, window_id: WindowId) -> Result<(), HostError> {
        let ids = self.state.lock().window(window_id)?.order.clone();
        self.remove_tabs_sync(&ids, true)
    }

    async fn set_window_title_preface(&self, window_id: WindowId, preface: Option<String>) -> Result<(), HostError> {
        self.state.lock().window_mut(window_id)?.title_preface = preface;
        Ok(())
    }
}

#[async_trait]
impl SessionValuesTrait for TabManager {
    async fn set_tab_value(&self, tab_id: TabId, key: &str, value: &str) -> Result<(), HostError> {
        let mut state = self.state.lock();
        let tab = state
            .tabs
            .get_mut(&tab_id)
            .ok_or(HostError::TabNotFound(tab_id))?;
        tab.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_tab_value(&self, tab_id: TabId, key: &str) -> Result<Option<String>, HostError> {
        Ok(self.state.lock().tab(tab_id)?.values.get(key).cloned())
    }

    async fn remove_tab_value(&self, tab_id: TabId, key: &str) -> Result<(), HostError> {
        let mut state = self.state.lock();
        let tab = state
            .tabs
            .get_mut(&tab_id)
            .ok_or(HostError::TabNotFound(tab_id))?;
        tab.values.remove(key);
        Ok(())
    }

    async fn set_window_value(&self, window_id: WindowId, key: &str, value: &str) -> Result<(), HostError> {
        self.state
            .lock()
            .window_mut(window_id)?
            .values
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_window_value(&self, window_id: WindowId, key: &str) -> Result<Option<String>, HostError> {
        Ok(self.state.lock().window(window_id)?.values.get(key).cloned())
    }

    async fn remove_window_value(&self, window_id: WindowId, key: &str) -> Result<(), HostError> {
        self.state.lock().window_mut(window_id)?.values.remove(key);
        Ok(())
    }
}
