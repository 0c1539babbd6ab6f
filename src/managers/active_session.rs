//! Active Session for Tabs Aside.
//!
//! An [`ActiveSession`] keeps the live tabs of one session and the records
//! in its bookmark folder synchronized while the session is open. It is
//! built by one of the constructors below (restore, create, reactivate),
//! subscribes to host events once its tabs are associated, and ends either
//! set aside (tabs closed) or freed (tabs left open, association dropped).
//!
//! Shared state lives behind a `parking_lot::Mutex` that is only ever held
//! inside synchronous blocks. Every read-then-write of the mapping happens
//! before the next suspension point.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::{join_all, FutureExt};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::host::Host;
use crate::managers::removal_queue::{FlushFn, RemovalQueue};
use crate::services::event_hub::{Listener, ListenerId};
use crate::services::tab_codec::{is_restore_failed_url, restore_failed_url, TabSnapshot};
use crate::types::bookmark::{BookmarkDestination, BookmarkNode, CreateBookmarkDetails};
use crate::types::errors::{BookmarkError, HostError, SessionError};
use crate::types::events::{ChangeKind, EventKind, HostEvent};
use crate::types::options::TabClosingBehavior;
use crate::types::session::{SessionPhase, TabRecordMap, BOOKMARK_ID_KEY, SESSION_ID_KEY};
use crate::types::tab::{
    Tab, TabChangeInfo, TabId, TabUpdateProperties, WindowCreateProperties, WindowId,
};

/// Transient URL of tabs that have not started loading yet.
const BLANK_URL: &str = "about:blank";

/// How long an expected tab-creation event is waited for.
const EXPECTATION_TTL: Duration = Duration::from_secs(5);

/// Active sessions by session id. Sessions remove themselves when they end.
pub type ActiveRegistry = Mutex<HashMap<String, Arc<ActiveSession>>>;

/// How [`ActiveSession::open_record_as_tab`] opens a record.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenRecordOptions {
    /// Select the new tab (this also loads it).
    pub make_active: bool,
    /// Open discarded until first selected.
    pub lazy: bool,
    /// Ignore the host's creation event for this tab.
    pub suppress_create_event: bool,
    /// Added to the record's position to get the strip index.
    pub index_offset: Option<usize>,
    /// Place the tab next to the tabs of its neighbouring records so the
    /// strip follows the folder order. Overrides `index_offset`.
    pub keep_record_order: bool,
}

enum Lifecycle {
    Restoring,
    Active { subscriptions: Vec<ListenerId> },
    SettingAside,
    Freed,
}

impl Lifecycle {
    fn phase(&self) -> SessionPhase {
        match self {
            Lifecycle::Restoring => SessionPhase::Restoring,
            Lifecycle::Active { .. } => SessionPhase::Active,
            Lifecycle::SettingAside => SessionPhase::SettingAside,
            Lifecycle::Freed => SessionPhase::Freed,
        }
    }

    fn into_subscriptions(self) -> Vec<ListenerId> {
        match self {
            Lifecycle::Active { subscriptions } => subscriptions,
            _ => Vec::new(),
        }
    }
}

/// A tab-creation event the session triggered itself.
struct ExpectedCreation {
    tab_id: Option<TabId>,
    window_id: Option<WindowId>,
    registered: Instant,
}

struct Inner {
    lifecycle: Lifecycle,
    title: String,
    window_id: Option<WindowId>,
    tabs: TabRecordMap,
    /// Tabs between the start and the end of `add_existing_tab`.
    in_flight: HashSet<TabId>,
    expected: HashMap<u64, ExpectedCreation>,
    next_token: u64,
}

impl Inner {
    fn ensure_live(&self, session_id: &str) -> Result<(), SessionError> {
        if self.lifecycle.phase().is_terminal() {
            return Err(SessionError::NotActive(session_id.to_string()));
        }
        Ok(())
    }

    fn expect_creation(&mut self) -> u64 {
        self.next_token += 1;
        let token = self.next_token;
        self.expected.insert(
            token,
            ExpectedCreation {
                tab_id: None,
                window_id: self.window_id,
                registered: Instant::now(),
            },
        );
        token
    }

    fn bind_expectation(&mut self, token: u64, tab_id: TabId) {
        if let Some(entry) = self.expected.get_mut(&token) {
            entry.tab_id = Some(tab_id);
        }
    }

    /// Consumes the expectation matching `tab`, if any.
    ///
    /// Unbound expectations match any tab created in the session window.
    fn consume_expectation(&mut self, tab: &Tab) -> bool {
        let now = Instant::now();
        self.expected
            .retain(|_, e| now.duration_since(e.registered) < EXPECTATION_TTL);

        let token = self
            .expected
            .iter()
            .find(|(_, e)| e.tab_id == Some(tab.id))
            .or_else(|| {
                self.expected
                    .iter()
                    .find(|(_, e)| e.tab_id.is_none() && e.window_id == Some(tab.window_id))
            })
            .map(|(token, _)| *token);

        match token {
            Some(token) => self.expected.remove(&token).is_some(),
            None => false,
        }
    }

    fn is_unmapped(&self) -> bool {
        self.tabs.is_empty() && self.in_flight.is_empty()
    }
}

/// What was live when a session left the active phase.
struct Retired {
    tabs: TabRecordMap,
    window_id: Option<WindowId>,
}

pub struct ActiveSession {
    id: String,
    host: Host,
    registry: Weak<ActiveRegistry>,
    inner: Mutex<Inner>,
    removals: RemovalQueue,
}

impl std::fmt::Debug for ActiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveSession").field("id", &self.id).finish_non_exhaustive()
    }
}

impl ActiveSession {
    fn new(host: Host, registry: &Arc<ActiveRegistry>, id: String, title: String) -> Arc<Self> {
        let delay = Duration::from_millis(host.options.options().removal_delay_ms);
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let flush: FlushFn = {
                let host = host.clone();
                let id = id.clone();
                let weak = weak.clone();
                Arc::new(move |batch: Vec<String>| {
                    flush_removals(host.clone(), id.clone(), weak.clone(), batch).boxed()
                })
            };
            Self {
                id,
                host,
                registry: Arc::downgrade(registry),
                inner: Mutex::new(Inner {
                    lifecycle: Lifecycle::Restoring,
                    title,
                    window_id: None,
                    tabs: TabRecordMap::new(),
                    in_flight: HashSet::new(),
                    expected: HashMap::new(),
                    next_token: 0,
                }),
                removals: RemovalQueue::new(delay, flush),
            }
        })
    }

    // ------------------------------------------------------------------
    // Constructors
    // ------------------------------------------------------------------

    /// Opens every record of a session as a live tab.
    pub async fn restore_all(
        host: Host,
        registry: &Arc<ActiveRegistry>,
        session_id: &str,
    ) -> Result<Arc<Self>, SessionError> {
        let folder = load_session_folder(&host, session_id).await?;
        let records: Vec<BookmarkNode> = host
            .bookmarks
            .get_children(Some(session_id))
            .await?
            .into_iter()
            .filter(|node| !node.is_folder())
            .collect();
        if records.is_empty() {
            return Err(SessionError::EmptySession);
        }

        let options = host.options.options();
        let session = Self::new(host, registry, folder.id, folder.title);
        info!(
            target: "tabs_aside.session",
            session_id,
            records = records.len(),
            windowed = options.windowed_sessions,
            "restoring session"
        );

        let placeholder = if options.windowed_sessions {
            let (_, tab_id) = session.create_session_window().await?;
            Some(tab_id)
        } else {
            None
        };

        let open = OpenRecordOptions {
            make_active: false,
            lazy: options.lazy_loading,
            suppress_create_event: false,
            // The pinned placeholder occupies index 0 until it is closed.
            index_offset: placeholder.map(|_| 1),
            keep_record_order: false,
        };
        let results = join_all(
            records
                .iter()
                .map(|record| session.open_record_as_tab(record, open)),
        )
        .await;

        let mut opened = 0;
        let mut first_error = None;
        for (record, result) in records.iter().zip(results) {
            match result {
                Ok(_) => opened += 1,
                Err(e) => {
                    warn!(target: "tabs_aside.session", session_id, record_id = %record.id, error = %e, "record could not be restored");
                    first_error.get_or_insert(e);
                }
            }
        }

        if opened == 0 {
            session.abandon().await;
            return Err(first_error.unwrap_or(SessionError::EmptySession));
        }
        if let Some(tab_id) = placeholder {
            if let Err(e) = session.host.tabs.remove_tabs(&[tab_id]).await {
                warn!(target: "tabs_aside.session", session_id, tab_id, error = %e, "failed to close window placeholder");
            }
        }
        Ok(session.go_live())
    }

    /// Opens a single record, activating its session with only that tab.
    pub async fn restore_single(
        host: Host,
        registry: &Arc<ActiveRegistry>,
        record_id: &str,
    ) -> Result<Arc<Self>, SessionError> {
        let record = host.bookmarks.get(record_id).await?;
        if record.is_folder() {
            return Err(SessionError::NotFound(record_id.to_string()));
        }
        let session_id = record
            .parent_id
            .clone()
            .ok_or_else(|| SessionError::NotFound(record_id.to_string()))?;
        let folder = load_session_folder(&host, &session_id).await?;
        let windowed = host.options.options().windowed_sessions;

        let session = Self::new(host, registry, folder.id, folder.title);
        info!(target: "tabs_aside.session", session_id = %session.id, record_id, windowed, "restoring single record");

        let placeholder = if windowed {
            let (_, tab_id) = session.create_session_window().await?;
            Some(tab_id)
        } else {
            None
        };

        // Always loaded, regardless of the lazy loading option.
        let open = OpenRecordOptions {
            make_active: true,
            ..Default::default()
        };
        if let Err(e) = session.open_record_as_tab(&record, open).await {
            session.abandon().await;
            return Err(e);
        }
        if let Some(tab_id) = placeholder {
            if let Err(e) = session.host.tabs.remove_tabs(&[tab_id]).await {
                warn!(target: "tabs_aside.session", session_id = %session.id, tab_id, error = %e, "failed to close window placeholder");
            }
        }
        Ok(session.go_live())
    }

    /// Creates a new session folder holding the given live tabs.
    pub async fn create_from_tabs(
        host: Host,
        registry: &Arc<ActiveRegistry>,
        mut tabs: Vec<Tab>,
        title: &str,
    ) -> Result<Arc<Self>, SessionError> {
        if tabs.is_empty() {
            return Err(SessionError::EmptySession);
        }
        tabs.sort_by_key(|tab| (tab.window_id, tab.index));

        let folder = create_session_folder(&host, title).await?;
        let session = Self::new(host, registry, folder.id, folder.title);
        info!(target: "tabs_aside.session", session_id = %session.id, title, tabs = tabs.len(), "creating session from tabs");
        session.adopt_new_tabs(tabs).await
    }

    /// Creates a new session whose dedicated window is `window_id`.
    pub async fn create_from_window(
        host: Host,
        registry: &Arc<ActiveRegistry>,
        window_id: WindowId,
        title: &str,
    ) -> Result<Arc<Self>, SessionError> {
        let tabs = host.tabs.query_tabs(Some(window_id)).await?;
        if tabs.is_empty() {
            return Err(SessionError::EmptySession);
        }

        let folder = create_session_folder(&host, title).await?;
        let session = Self::new(host, registry, folder.id, folder.title);
        info!(target: "tabs_aside.session", session_id = %session.id, title, window_id, "creating session from window");
        if let Err(e) = session.set_window(window_id).await {
            session.discard_folder().await;
            return Err(e);
        }
        session.adopt_new_tabs(tabs).await
    }

    /// Rebuilds the mapping of a session whose window survived a restart.
    pub async fn reactivate_window(
        host: Host,
        registry: &Arc<ActiveRegistry>,
        session_id: &str,
        window_id: WindowId,
    ) -> Result<Arc<Self>, SessionError> {
        let folder = load_session_folder(&host, session_id).await?;
        let session = Self::new(host, registry, folder.id, folder.title);
        session.set_window(window_id).await?;

        let tabs = session.host.tabs.query_tabs(Some(window_id)).await?;
        let mut adopted = 0;
        for tab in tabs {
            let tab_id = tab.id;
            let record_id = session.recorded_record(&tab).await;
            match session.add_existing_tab(tab, record_id).await {
                Ok(()) => adopted += 1,
                Err(e) => {
                    warn!(target: "tabs_aside.session", session_id, tab_id, error = %e, "failed to reattach tab");
                }
            }
        }

        if adopted == 0 {
            session.free().await;
            return Err(SessionError::EmptySession);
        }
        info!(target: "tabs_aside.session", session_id, window_id, tabs = adopted, "session window reactivated");
        Ok(session.go_live())
    }

    /// Rebuilds the mapping of loose tabs that survived a restart.
    ///
    /// Tabs whose record is gone lose their side-channel values.
    pub async fn reactivate_tabs(
        host: Host,
        registry: &Arc<ActiveRegistry>,
        session_id: &str,
        tabs: Vec<Tab>,
    ) -> Result<Arc<Self>, SessionError> {
        let folder = load_session_folder(&host, session_id).await?;
        let session = Self::new(host, registry, folder.id, folder.title);

        let mut adopted = 0;
        for tab in tabs {
            let tab_id = tab.id;
            match session.recorded_record(&tab).await {
                Some(record_id) => match session.add_existing_tab(tab, Some(record_id)).await {
                    Ok(()) => adopted += 1,
                    Err(e) => {
                        warn!(target: "tabs_aside.session", session_id, tab_id, error = %e, "failed to reattach tab");
                    }
                },
                None => {
                    debug!(target: "tabs_aside.session", session_id, tab_id, "stale side-channel values");
                    session.strip_tab_values(tab_id).await;
                }
            }
        }

        if adopted == 0 {
            session.free().await;
            return Err(SessionError::EmptySession);
        }
        info!(target: "tabs_aside.session", session_id, tabs = adopted, "session tabs reactivated");
        Ok(session.go_live())
    }

    async fn adopt_new_tabs(self: Arc<Self>, tabs: Vec<Tab>) -> Result<Arc<Self>, SessionError> {
        let results = join_all(
            tabs.into_iter()
                .enumerate()
                .map(|(index, tab)| self.record_and_add(tab, index)),
        )
        .await;

        let mut adopted = 0;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(()) => adopted += 1,
                Err(e) => {
                    warn!(target: "tabs_aside.session", session_id = %self.id, error = %e, "tab could not be added");
                    first_error.get_or_insert(e);
                }
            }
        }

        if adopted == 0 {
            self.retire(Lifecycle::Freed);
            self.discard_folder().await;
            return Err(first_error.unwrap_or(SessionError::EmptySession));
        }
        Ok(self.go_live())
    }

    async fn record_and_add(&self, tab: Tab, index: usize) -> Result<(), SessionError> {
        let snapshot = TabSnapshot::from_live_tab(&tab);
        let record = self
            .host
            .bookmarks
            .create(snapshot.to_bookmark_create_args(&self.id, Some(index)))
            .await?;
        self.add_existing_tab(tab, Some(record.id)).await
    }

    /// Record a surviving tab points at, if it still belongs to this session.
    async fn recorded_record(&self, tab: &Tab) -> Option<String> {
        let record_id = self
            .host
            .values
            .get_tab_value(tab.id, BOOKMARK_ID_KEY)
            .await
            .ok()
            .flatten()?;
        let record = self.host.bookmarks.get(&record_id).await.ok()?;
        let belongs = !record.is_folder()
            && record.parent_id.as_deref() == Some(self.id.as_str())
            && self.tab_for_record(&record.id).is_none();
        belongs.then_some(record.id)
    }

    /// Subscribes to host events and enters the active phase.
    fn go_live(self: Arc<Self>) -> Arc<Self> {
        let mut kinds = EventKind::TAB_EVENTS.to_vec();
        if self.window_id().is_some() {
            kinds.extend(EventKind::WINDOW_EVENTS);
        }
        let subscriptions = self.subscribe(&kinds);

        let leftover = {
            let mut inner = self.inner.lock();
            if matches!(inner.lifecycle, Lifecycle::Restoring) {
                inner.lifecycle = Lifecycle::Active { subscriptions };
                Vec::new()
            } else {
                subscriptions
            }
        };
        for id in leftover {
            self.host.events.remove_listener(id);
        }

        debug!(target: "tabs_aside.session", session_id = %self.id, tabs = self.tab_count(), "session active");
        self.host.notifier.notify(&self.id, ChangeKind::Activated);
        self
    }

    fn subscribe(self: &Arc<Self>, kinds: &[EventKind]) -> Vec<ListenerId> {
        kinds
            .iter()
            .map(|&kind| {
                let weak = Arc::downgrade(self);
                let listener: Listener = Arc::new(move |event: HostEvent| {
                    let weak = weak.clone();
                    async move {
                        if let Some(session) = weak.upgrade() {
                            session.handle_event(event).await;
                        }
                    }
                    .boxed()
                });
                self.host.events.add_listener(kind, listener)
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> String {
        self.inner.lock().title.clone()
    }

    pub fn window_id(&self) -> Option<WindowId> {
        self.inner.lock().window_id
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.lock().lifecycle.phase()
    }

    pub fn is_active(&self) -> bool {
        self.phase() == SessionPhase::Active
    }

    /// Mapped live tabs, sorted by id.
    pub fn tab_ids(&self) -> Vec<TabId> {
        self.inner.lock().tabs.tab_ids()
    }

    pub fn tab_count(&self) -> usize {
        self.inner.lock().tabs.len()
    }

    pub fn contains_tab(&self, tab_id: TabId) -> bool {
        self.inner.lock().tabs.contains_tab(tab_id)
    }

    pub fn record_for_tab(&self, tab_id: TabId) -> Option<String> {
        self.inner.lock().tabs.record_for(tab_id).map(str::to_string)
    }

    pub fn tab_for_record(&self, record_id: &str) -> Option<TabId> {
        self.inner.lock().tabs.tab_for(record_id)
    }

    /// Records waiting for the delayed removal.
    pub fn pending_removals(&self) -> usize {
        self.removals.len()
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    /// Associates a live tab with this session.
    ///
    /// Without `record_id` a new record is created from the tab. Tabs
    /// outside the dedicated window are moved to the end of it first.
    pub async fn add_existing_tab(&self, tab: Tab, record_id: Option<String>) -> Result<(), SessionError> {
        let tab_id = tab.id;
        let window_id = {
            let mut inner = self.inner.lock();
            inner.ensure_live(&self.id)?;
            if let Some(record_id) = &record_id {
                if let Some(owner) = inner.tabs.tab_for(record_id).filter(|owner| *owner != tab_id) {
                    return Err(SessionError::RecordAlreadyMapped {
                        record_id: record_id.clone(),
                        tab_id: owner,
                    });
                }
            }
            inner.in_flight.insert(tab_id);
            inner.window_id
        };

        let result = self.associate(tab, record_id, window_id).await;
        self.inner.lock().in_flight.remove(&tab_id);
        result
    }

    async fn associate(
        &self,
        mut tab: Tab,
        record_id: Option<String>,
        window_id: Option<WindowId>,
    ) -> Result<(), SessionError> {
        if let Some(window_id) = window_id.filter(|w| *w != tab.window_id) {
            let moved = self.host.tabs.move_tabs(&[tab.id], window_id, None).await?;
            tab = moved
                .into_iter()
                .next()
                .ok_or(SessionError::MoveFailed(tab.id))?;
            debug!(target: "tabs_aside.session", session_id = %self.id, tab_id = tab.id, window_id, "moved tab into session window");
        }

        let record_id = match record_id {
            Some(record_id) => record_id,
            None => {
                let snapshot = TabSnapshot::from_live_tab(&tab);
                self.host
                    .bookmarks
                    .create(snapshot.to_bookmark_create_args(&self.id, None))
                    .await?
                    .id
            }
        };

        self.host.values.set_tab_value(tab.id, SESSION_ID_KEY, &self.id).await?;
        self.host.values.set_tab_value(tab.id, BOOKMARK_ID_KEY, &record_id).await?;

        let mut inner = self.inner.lock();
        inner.ensure_live(&self.id)?;
        inner
            .tabs
            .insert(tab.id, &record_id)
            .map_err(|owner| SessionError::RecordAlreadyMapped {
                record_id: record_id.clone(),
                tab_id: owner,
            })?;
        debug!(target: "tabs_aside.session", session_id = %self.id, tab_id = tab.id, record_id = %record_id, "tab associated");
        Ok(())
    }

    /// Opens one record as a new live tab and associates it.
    ///
    /// URLs the host refuses open the restore-failed placeholder page instead.
    pub async fn open_record_as_tab(&self, record: &BookmarkNode, options: OpenRecordOptions) -> Result<Tab, SessionError> {
        let snapshot = TabSnapshot::from_record(record)
            .ok_or_else(|| SessionError::NotFound(record.id.clone()))?;
        let slot = if options.keep_record_order {
            self.strip_slot_for(&record.id).await?
        } else {
            None
        };
        let (window_id, token) = {
            let mut inner = self.inner.lock();
            inner.ensure_live(&self.id)?;
            let token = options.suppress_create_event.then(|| inner.expect_creation());
            (inner.window_id, token)
        };

        let mut props = snapshot.to_tab_create_args(options.lazy && !options.make_active);
        props.active = options.make_active;
        props.window_id = window_id;
        props.index = options.index_offset.map(|offset| record.index + offset);
        if let Some((slot_window, slot_index)) = slot {
            props.window_id = Some(slot_window);
            props.index = Some(slot_index);
        }

        let created = match self.host.tabs.create_tab(props.clone()).await {
            Err(HostError::Rejected(reason)) => {
                warn!(target: "tabs_aside.session", session_id = %self.id, record_id = %record.id, url = %snapshot.url, %reason, "url refused, opening placeholder");
                props.url = Some(restore_failed_url(&snapshot.url, &snapshot.title));
                props.title = Some(snapshot.title.clone());
                props.discarded = false;
                self.host.tabs.create_tab(props).await
            }
            other => other,
        };
        let tab = match created {
            Ok(tab) => tab,
            Err(e) => {
                if let Some(token) = token {
                    self.inner.lock().expected.remove(&token);
                }
                return Err(e.into());
            }
        };
        if let Some(token) = token {
            self.inner.lock().bind_expectation(token, tab.id);
        }

        self.add_existing_tab(tab.clone(), Some(record.id.clone())).await?;
        Ok(tab)
    }

    /// Closes one tab while keeping its record.
    pub async fn set_tab_aside(&self, tab_id: TabId) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.lock();
            inner.ensure_live(&self.id)?;
            if inner.tabs.remove_tab(tab_id).is_none() {
                return Err(SessionError::TabNotInSession {
                    tab_id,
                    session_id: self.id.clone(),
                });
            }
        }
        self.host.tabs.remove_tabs(&[tab_id]).await?;
        info!(target: "tabs_aside.session", session_id = %self.id, tab_id, "tab set aside");
        self.settle().await
    }

    /// Ends the session and closes its live tabs (or its window).
    ///
    /// Calling it again, or after `free`, does nothing.
    pub async fn set_tabs_or_window_aside(&self) -> Result<(), SessionError> {
        let Some(retired) = self.retire(Lifecycle::SettingAside) else {
            debug!(target: "tabs_aside.session", session_id = %self.id, "session already ended");
            return Ok(());
        };
        info!(
            target: "tabs_aside.session",
            session_id = %self.id,
            tabs = retired.tabs.len(),
            window_id = ?retired.window_id,
            "setting session aside"
        );
        self.close_live(retired).await;
        self.host.notifier.notify(&self.id, ChangeKind::SetAside);
        Ok(())
    }

    /// Ends the session without closing tabs and strips their side-channel
    /// values.
    pub async fn free(&self) {
        self.release(true).await;
    }

    /// Ends the session without closing tabs, keeping side-channel values so
    /// a later process can reactivate it.
    pub async fn suspend(&self) {
        self.release(false).await;
    }

    async fn release(&self, strip_values: bool) {
        let Some(retired) = self.retire(Lifecycle::Freed) else {
            return;
        };
        if strip_values {
            for tab_id in retired.tabs.tab_ids() {
                self.strip_tab_values(tab_id).await;
            }
            if let Some(window_id) = retired.window_id {
                if let Err(e) = self.host.values.remove_window_value(window_id, SESSION_ID_KEY).await {
                    debug!(target: "tabs_aside.session", session_id = %self.id, window_id, error = %e, "window value not removed");
                }
                if let Err(e) = self.host.tabs.set_window_title_preface(window_id, None).await {
                    debug!(target: "tabs_aside.session", session_id = %self.id, window_id, error = %e, "title preface not cleared");
                }
            }
        }
        info!(target: "tabs_aside.session", session_id = %self.id, strip_values, "session released");
        self.host.notifier.notify(&self.id, ChangeKind::SetAside);
    }

    /// Attaches a dedicated window. Must precede any tab association.
    pub async fn set_window(self: &Arc<Self>, window_id: WindowId) -> Result<(), SessionError> {
        let title = {
            let mut inner = self.inner.lock();
            inner.ensure_live(&self.id)?;
            if let Some(existing) = inner.window_id {
                return Err(SessionError::WindowAlreadySet(existing));
            }
            if !inner.is_unmapped() {
                return Err(SessionError::TabsAlreadyAdded(self.id.clone()));
            }
            inner.window_id = Some(window_id);
            inner.title.clone()
        };

        self.host.values.set_window_value(window_id, SESSION_ID_KEY, &self.id).await?;
        self.host
            .tabs
            .set_window_title_preface(window_id, Some(title_preface(&title)))
            .await?;

        if self.is_active() {
            let added = self.subscribe(&EventKind::WINDOW_EVENTS);
            let leftover = {
                let mut inner = self.inner.lock();
                if let Lifecycle::Active { subscriptions } = &mut inner.lifecycle {
                    subscriptions.extend(added);
                    Vec::new()
                } else {
                    added
                }
            };
            for id in leftover {
                self.host.events.remove_listener(id);
            }
        }
        debug!(target: "tabs_aside.session", session_id = %self.id, window_id, "session window set");
        Ok(())
    }

    /// Opens a new dedicated window and attaches it.
    ///
    /// Returns the window and its pinned placeholder tab.
    pub async fn create_session_window(self: &Arc<Self>) -> Result<(WindowId, TabId), SessionError> {
        {
            let inner = self.inner.lock();
            inner.ensure_live(&self.id)?;
            if let Some(existing) = inner.window_id {
                return Err(SessionError::WindowAlreadySet(existing));
            }
            if !inner.is_unmapped() {
                return Err(SessionError::TabsAlreadyAdded(self.id.clone()));
            }
        }

        let window = self
            .host
            .tabs
            .create_window(WindowCreateProperties {
                focused: true,
                ..Default::default()
            })
            .await?;
        let placeholder = window
            .tabs
            .first()
            .map(|tab| tab.id)
            .ok_or_else(|| HostError::Rejected(format!("window {} opened without a tab", window.id)))?;
        self.host
            .tabs
            .update_tab(
                placeholder,
                TabUpdateProperties {
                    pinned: Some(true),
                    ..Default::default()
                },
            )
            .await?;
        self.set_window(window.id).await?;
        Ok((window.id, placeholder))
    }

    pub async fn update_title(&self, title: &str) -> Result<(), SessionError> {
        let window_id = {
            let mut inner = self.inner.lock();
            inner.title = title.to_string();
            inner.window_id
        };
        if let Some(window_id) = window_id {
            self.host
                .tabs
                .set_window_title_preface(window_id, Some(title_preface(title)))
                .await?;
        }
        self.host.notifier.notify(&self.id, ChangeKind::Contents);
        Ok(())
    }

    /// Selects every live tab of the session. Host refusals are only logged.
    pub async fn highlight(&self) {
        let mut tabs = Vec::new();
        for tab_id in self.tab_ids() {
            match self.host.tabs.get_tab(tab_id).await {
                Ok(tab) => tabs.push(tab),
                Err(e) => debug!(target: "tabs_aside.session", session_id = %self.id, tab_id, error = %e, "tab vanished"),
            }
        }
        let Some(window_id) = self.window_id().or_else(|| tabs.first().map(|t| t.window_id)) else {
            return;
        };
        let mut indices: Vec<usize> = tabs
            .iter()
            .filter(|tab| tab.window_id == window_id)
            .map(|tab| tab.index)
            .collect();
        indices.sort_unstable();
        if let Err(e) = self.host.tabs.highlight(window_id, &indices).await {
            debug!(target: "tabs_aside.session", session_id = %self.id, error = %e, "highlight refused");
        }
    }

    /// Deletes one record, closing its live tab if it has one.
    pub async fn remove_record(&self, record_id: &str) -> Result<(), SessionError> {
        let tab_id = {
            let mut inner = self.inner.lock();
            inner.ensure_live(&self.id)?;
            inner.tabs.remove_record(record_id)
        };
        if let Some(tab_id) = tab_id {
            if let Err(e) = self.host.tabs.remove_tabs(&[tab_id]).await {
                debug!(target: "tabs_aside.session", session_id = %self.id, tab_id, error = %e, "tab already closed");
            }
        }
        match self.host.bookmarks.remove(record_id).await {
            Ok(()) | Err(BookmarkError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        info!(target: "tabs_aside.session", session_id = %self.id, record_id, "record removed");
        self.settle().await
    }

    // ------------------------------------------------------------------
    // Host events
    // ------------------------------------------------------------------

    async fn handle_event(self: Arc<Self>, event: HostEvent) {
        if !self.is_active() {
            return;
        }
        let result = match event {
            HostEvent::TabCreated(tab) => self.on_tab_created(tab).await,
            HostEvent::TabRemoved { tab_id, .. } => self.on_tab_removed(tab_id).await,
            HostEvent::TabUpdated { tab_id, change, tab } => {
                self.on_tab_updated(tab_id, &change, &tab).await
            }
            HostEvent::TabMoved { tab_id, .. } => self.on_tab_moved(tab_id).await,
            HostEvent::TabAttached {
                tab_id,
                new_window_id,
                ..
            } => self.on_tab_attached(tab_id, new_window_id).await,
            HostEvent::TabDetached {
                tab_id,
                old_window_id,
                ..
            } => self.on_tab_detached(tab_id, old_window_id).await,
            HostEvent::WindowRemoved(window_id) => self.on_window_removed(window_id).await,
        };
        if let Err(e) = result {
            warn!(target: "tabs_aside.session", session_id = %self.id, error = %e, "event handling failed");
        }
    }

    async fn on_tab_created(&self, tab: Tab) -> Result<(), SessionError> {
        let adopt = {
            let mut inner = self.inner.lock();
            if inner.consume_expectation(&tab) {
                debug!(target: "tabs_aside.session", session_id = %self.id, tab_id = tab.id, "expected tab creation");
                false
            } else if inner.tabs.contains_tab(tab.id) || inner.in_flight.contains(&tab.id) {
                false
            } else {
                let in_window = inner.window_id == Some(tab.window_id);
                let from_session_tab = tab
                    .opener_tab_id
                    .is_some_and(|opener| inner.tabs.contains_tab(opener));
                in_window || from_session_tab
            }
        };
        if !adopt {
            return Ok(());
        }

        let tab_id = tab.id;
        self.add_existing_tab(tab, None).await?;
        self.sync_record_position(tab_id).await?;
        info!(target: "tabs_aside.session", session_id = %self.id, tab_id, "new tab joined session");
        self.host.notifier.notify(&self.id, ChangeKind::Contents);
        Ok(())
    }

    async fn on_tab_removed(&self, tab_id: TabId) -> Result<(), SessionError> {
        let Some(record_id) = self.inner.lock().tabs.remove_tab(tab_id) else {
            return Ok(());
        };
        match self.host.options.options().tab_closing {
            TabClosingBehavior::RemoveRecord => {
                debug!(target: "tabs_aside.session", session_id = %self.id, tab_id, record_id = %record_id, "record removal queued");
                self.removals.push(record_id);
                Ok(())
            }
            TabClosingBehavior::KeepRecord => {
                debug!(target: "tabs_aside.session", session_id = %self.id, tab_id, record_id = %record_id, "tab closed, record kept");
                self.settle().await
            }
        }
    }

    async fn on_tab_updated(&self, tab_id: TabId, change: &TabChangeInfo, tab: &Tab) -> Result<(), SessionError> {
        let Some(record_id) = self.record_for_tab(tab_id) else {
            return Ok(());
        };
        if !change.affects_record() {
            return Ok(());
        }
        if tab.url == BLANK_URL || is_restore_failed_url(&tab.url) {
            debug!(target: "tabs_aside.session", session_id = %self.id, tab_id, "transient url ignored");
            return Ok(());
        }

        let snapshot = TabSnapshot::from_live_tab(tab);
        self.host
            .bookmarks
            .update(&record_id, snapshot.to_bookmark_update_args())
            .await?;
        debug!(target: "tabs_aside.session", session_id = %self.id, tab_id, record_id = %record_id, "record updated");
        self.host.notifier.notify(&self.id, ChangeKind::Contents);
        Ok(())
    }

    async fn on_tab_moved(&self, tab_id: TabId) -> Result<(), SessionError> {
        if !self.contains_tab(tab_id) {
            return Ok(());
        }
        if self.sync_record_position(tab_id).await? {
            self.host.notifier.notify(&self.id, ChangeKind::Contents);
        }
        Ok(())
    }

    async fn on_tab_attached(&self, tab_id: TabId, new_window_id: WindowId) -> Result<(), SessionError> {
        let adopt = {
            let inner = self.inner.lock();
            inner.window_id == Some(new_window_id)
                && !inner.tabs.contains_tab(tab_id)
                && !inner.in_flight.contains(&tab_id)
        };
        if !adopt {
            return Ok(());
        }

        let tab = self.host.tabs.get_tab(tab_id).await?;
        self.add_existing_tab(tab, None).await?;
        self.sync_record_position(tab_id).await?;
        info!(target: "tabs_aside.session", session_id = %self.id, tab_id, "tab dragged into session window");
        self.host.notifier.notify(&self.id, ChangeKind::Contents);
        Ok(())
    }

    async fn on_tab_detached(&self, tab_id: TabId, old_window_id: WindowId) -> Result<(), SessionError> {
        let record_id = {
            let mut inner = self.inner.lock();
            if inner.window_id != Some(old_window_id) {
                return Ok(());
            }
            match inner.tabs.remove_tab(tab_id) {
                Some(record_id) => record_id,
                None => return Ok(()),
            }
        };

        self.strip_tab_values(tab_id).await;
        match self.host.bookmarks.remove(&record_id).await {
            Ok(()) | Err(BookmarkError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        info!(target: "tabs_aside.session", session_id = %self.id, tab_id, record_id = %record_id, "tab left session window");
        self.settle().await
    }

    async fn on_window_removed(&self, window_id: WindowId) -> Result<(), SessionError> {
        {
            let mut inner = self.inner.lock();
            if inner.window_id != Some(window_id) {
                return Ok(());
            }
            inner.window_id = None;
        }

        // A burst of queued removals means the whole window closed, not
        // the tabs one by one.
        let pending = self.removals.len();
        if pending > 1 {
            let kept = self.removals.cancel();
            info!(target: "tabs_aside.session", session_id = %self.id, window_id, kept = kept.len(), "session window closed, records kept");
            self.set_tabs_or_window_aside().await
        } else if pending == 0 {
            self.settle().await
        } else {
            // The single queued removal settles the session when it flushes.
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Moves the record of `tab_id` next to the records of its mapped
    /// neighbours in the tab strip. Returns whether the record moved.
    async fn sync_record_position(&self, tab_id: TabId) -> Result<bool, SessionError> {
        let Some(record_id) = self.record_for_tab(tab_id) else {
            return Ok(false);
        };
        let tab = self.host.tabs.get_tab(tab_id).await?;
        let strip = self.host.tabs.query_tabs(Some(tab.window_id)).await?;

        let (before, after) = {
            let inner = self.inner.lock();
            let mapped: Vec<(TabId, String)> = strip
                .iter()
                .filter_map(|t| inner.tabs.record_for(t.id).map(|r| (t.id, r.to_string())))
                .collect();
            let Some(position) = mapped.iter().position(|(id, _)| *id == tab_id) else {
                return Ok(false);
            };
            let before = position
                .checked_sub(1)
                .and_then(|i| mapped.get(i))
                .map(|(_, r)| r.clone());
            let after = mapped.get(position + 1).map(|(_, r)| r.clone());
            (before, after)
        };

        let order: Vec<String> = self
            .host
            .bookmarks
            .get_children(Some(&self.id))
            .await?
            .into_iter()
            .map(|node| node.id)
            .collect();
        let current = order.iter().position(|id| *id == record_id);
        let others: Vec<&String> = order.iter().filter(|id| **id != record_id).collect();
        let target = match (before, after) {
            (Some(previous), _) => others.iter().position(|id| **id == previous).map(|i| i + 1),
            (None, Some(next)) => others.iter().position(|id| **id == next),
            (None, None) => None,
        };

        match target {
            Some(index) if Some(index) != current => {
                self.host
                    .bookmarks
                    .move_node(
                        &record_id,
                        BookmarkDestination {
                            parent_id: None,
                            index: Some(index),
                        },
                    )
                    .await?;
                debug!(target: "tabs_aside.session", session_id = %self.id, record_id = %record_id, index, "record reordered");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Strip position for a new tab of `record_id`: right after the tab of
    /// the closest earlier record that is open, else right before the tab
    /// of the closest later one.
    async fn strip_slot_for(&self, record_id: &str) -> Result<Option<(WindowId, usize)>, SessionError> {
        let siblings = self.host.bookmarks.get_children(Some(&self.id)).await?;
        let Some(position) = siblings.iter().position(|node| node.id == record_id) else {
            return Ok(None);
        };
        let (previous, next) = {
            let inner = self.inner.lock();
            let previous = siblings[..position]
                .iter()
                .rev()
                .find_map(|node| inner.tabs.tab_for(&node.id));
            let next = siblings[position + 1..]
                .iter()
                .find_map(|node| inner.tabs.tab_for(&node.id));
            (previous, next)
        };

        if let Some(tab_id) = previous {
            let tab = self.host.tabs.get_tab(tab_id).await?;
            return Ok(Some((tab.window_id, tab.index + 1)));
        }
        if let Some(tab_id) = next {
            let tab = self.host.tabs.get_tab(tab_id).await?;
            return Ok(Some((tab.window_id, tab.index)));
        }
        Ok(None)
    }

    /// Reacts to the mapping or the folder having shrunk.
    ///
    /// A session without records and without live tabs is destroyed; one
    /// without live tabs goes back to its passive form.
    async fn settle(&self) -> Result<(), SessionError> {
        let unmapped = self.inner.lock().is_unmapped();
        let remaining = match self.host.bookmarks.get_children(Some(&self.id)).await {
            Ok(children) => children.len(),
            Err(BookmarkError::NotFound(_)) | Err(BookmarkError::FolderNotFound(_)) => 0,
            Err(e) => return Err(e.into()),
        };

        if !self.removals.is_empty() {
            self.host.notifier.notify(&self.id, ChangeKind::Contents);
            return Ok(());
        }
        if remaining == 0 && unmapped {
            return self.destroy().await;
        }
        self.host.notifier.notify(&self.id, ChangeKind::Contents);
        if unmapped {
            self.set_tabs_or_window_aside().await?;
        }
        Ok(())
    }

    /// Ends the session and deletes its folder.
    async fn destroy(&self) -> Result<(), SessionError> {
        if let Some(retired) = self.retire(Lifecycle::SettingAside) {
            self.close_live(retired).await;
        }
        match self.host.bookmarks.remove_tree(&self.id).await {
            Ok(()) | Err(BookmarkError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        info!(target: "tabs_aside.session", session_id = %self.id, "session emptied and removed");
        self.host.notifier.notify(&self.id, ChangeKind::Removed);
        Ok(())
    }

    /// Leaves the active phase: unsubscribes, clears the mapping and
    /// deregisters. Returns `None` if the session already ended.
    fn retire(&self, terminal: Lifecycle) -> Option<Retired> {
        let (subscriptions, retired) = {
            let mut inner = self.inner.lock();
            if inner.lifecycle.phase().is_terminal() {
                return None;
            }
            let previous = std::mem::replace(&mut inner.lifecycle, terminal);
            inner.in_flight.clear();
            inner.expected.clear();
            let retired = Retired {
                tabs: std::mem::take(&mut inner.tabs),
                window_id: inner.window_id.take(),
            };
            (previous.into_subscriptions(), retired)
        };
        for id in subscriptions {
            self.host.events.remove_listener(id);
        }
        self.deregister();
        Some(retired)
    }

    async fn close_live(&self, retired: Retired) {
        let result = match retired.window_id {
            Some(window_id) => self.host.tabs.remove_window(window_id).await,
            None if retired.tabs.is_empty() => Ok(()),
            None => self.host.tabs.remove_tabs(&retired.tabs.tab_ids()).await,
        };
        if let Err(e) = result {
            debug!(target: "tabs_aside.session", session_id = %self.id, error = %e, "live tabs already gone");
        }
    }

    /// Drops a session that failed to construct, closing its window.
    async fn abandon(&self) {
        if let Some(retired) = self.retire(Lifecycle::Freed) {
            if let Some(window_id) = retired.window_id {
                if let Err(e) = self.host.tabs.remove_window(window_id).await {
                    debug!(target: "tabs_aside.session", session_id = %self.id, window_id, error = %e, "window already gone");
                }
            }
        }
    }

    async fn discard_folder(&self) {
        if let Err(e) = self.host.bookmarks.remove_tree(&self.id).await {
            warn!(target: "tabs_aside.session", session_id = %self.id, error = %e, "failed to discard session folder");
        }
    }

    async fn strip_tab_values(&self, tab_id: TabId) {
        for key in [SESSION_ID_KEY, BOOKMARK_ID_KEY] {
            if let Err(e) = self.host.values.remove_tab_value(tab_id, key).await {
                debug!(target: "tabs_aside.session", session_id = %self.id, tab_id, key, error = %e, "value not removed");
            }
        }
    }

    fn deregister(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut active = registry.lock();
        let is_self = active
            .get(&self.id)
            .is_some_and(|entry| std::ptr::eq(Arc::as_ptr(entry), self));
        if is_self {
            active.remove(&self.id);
        }
    }
}

/// Deletes a batch of records whose tabs closed, then lets the session (or
/// what is left of it) react.
async fn flush_removals(host: Host, session_id: String, session: Weak<ActiveSession>, batch: Vec<String>) {
    for record_id in &batch {
        match host.bookmarks.remove(record_id).await {
            Ok(()) | Err(BookmarkError::NotFound(_)) => {}
            Err(e) => {
                warn!(target: "tabs_aside.session", session_id = %session_id, record_id = %record_id, error = %e, "record removal failed");
            }
        }
    }
    info!(target: "tabs_aside.session", session_id = %session_id, removed = batch.len(), "closed tab records removed");

    if let Some(session) = session.upgrade().filter(|s| s.is_active()) {
        if let Err(e) = session.settle().await {
            warn!(target: "tabs_aside.session", session_id = %session_id, error = %e, "session update after removal failed");
        }
        return;
    }

    match host.bookmarks.get_children(Some(&session_id)).await {
        Ok(children) if children.is_empty() => {
            if let Err(e) = host.bookmarks.remove_tree(&session_id).await {
                warn!(target: "tabs_aside.session", session_id = %session_id, error = %e, "failed to remove empty session");
                return;
            }
            host.notifier.notify(&session_id, ChangeKind::Removed);
        }
        Ok(_) => host.notifier.notify(&session_id, ChangeKind::Contents),
        Err(e) => debug!(target: "tabs_aside.session", session_id = %session_id, error = %e, "session folder gone"),
    }
}

async fn load_session_folder(host: &Host, session_id: &str) -> Result<BookmarkNode, SessionError> {
    match host.bookmarks.get(session_id).await {
        Ok(folder) if folder.is_folder() => Ok(folder),
        Ok(_) | Err(BookmarkError::NotFound(_)) => Err(SessionError::NotFound(session_id.to_string())),
        Err(e) => Err(e.into()),
    }
}

async fn create_session_folder(host: &Host, title: &str) -> Result<BookmarkNode, SessionError> {
    let folder = host
        .bookmarks
        .create(CreateBookmarkDetails {
            parent_id: host.options.options().root_folder_id,
            title: title.to_string(),
            ..Default::default()
        })
        .await?;
    Ok(folder)
}

fn title_preface(title: &str) -> String {
    format!("{} - ", title)
}
