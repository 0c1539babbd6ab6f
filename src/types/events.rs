use serde::{Deserialize, Serialize};

use super::tab::{Tab, TabChangeInfo, TabId, WindowId};

/// Lifecycle notification delivered by the host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum HostEvent {
    TabCreated(Tab),
    TabRemoved {
        tab_id: TabId,
        window_id: WindowId,
        is_window_closing: bool,
    },
    TabUpdated {
        tab_id: TabId,
        change: TabChangeInfo,
        tab: Tab,
    },
    TabMoved {
        tab_id: TabId,
        window_id: WindowId,
        from_index: usize,
        to_index: usize,
    },
    TabAttached {
        tab_id: TabId,
        new_window_id: WindowId,
        new_position: usize,
    },
    TabDetached {
        tab_id: TabId,
        old_window_id: WindowId,
        old_position: usize,
    },
    WindowRemoved(WindowId),
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::TabCreated(_) => EventKind::TabCreated,
            HostEvent::TabRemoved { .. } => EventKind::TabRemoved,
            HostEvent::TabUpdated { .. } => EventKind::TabUpdated,
            HostEvent::TabMoved { .. } => EventKind::TabMoved,
            HostEvent::TabAttached { .. } => EventKind::TabAttached,
            HostEvent::TabDetached { .. } => EventKind::TabDetached,
            HostEvent::WindowRemoved(_) => EventKind::WindowRemoved,
        }
    }
}

/// Subscription key for host events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EventKind {
    TabCreated,
    TabRemoved,
    TabUpdated,
    TabMoved,
    TabAttached,
    TabDetached,
    WindowRemoved,
}

impl EventKind {
    /// Events every active session listens to.
    pub const TAB_EVENTS: [EventKind; 4] = [
        EventKind::TabCreated,
        EventKind::TabRemoved,
        EventKind::TabUpdated,
        EventKind::TabMoved,
    ];

    /// Events only meaningful for sessions owning a dedicated window.
    pub const WINDOW_EVENTS: [EventKind; 3] = [
        EventKind::TabAttached,
        EventKind::TabDetached,
        EventKind::WindowRemoved,
    ];
}

/// Outbound signal consumed by the UI layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionChange {
    pub session_id: String,
    pub kind: ChangeKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeKind {
    /// Records or live tabs of the session changed.
    Contents,
    /// The session gained live tabs.
    Activated,
    /// The session returned to its passive, bookmark-only form.
    SetAside,
    /// The session folder no longer exists.
    Removed,
}
