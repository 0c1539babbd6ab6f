//! App Core for Tabs Aside.
//!
//! Wires the bookmark store, the in-memory host, the options and the session
//! manager together and runs the process lifecycle: recovery on startup,
//! suspension on shutdown.

use std::error::Error;
use std::sync::Arc;

use tracing::{info, warn};

use crate::database::connection::Database;
use crate::host::Host;
use crate::managers::bookmark_manager::{BookmarkManager, BookmarkStoreTrait};
use crate::managers::session_manager::SessionManager;
use crate::managers::tab_manager::TabManager;
use crate::platform;
use crate::services::change_notifier::ChangeNotifier;
use crate::services::event_hub::EventHub;
use crate::services::settings_engine::{OptionsProviderTrait, SettingsEngine, SettingsEngineTrait};
use crate::types::bookmark::CreateBookmarkDetails;

pub type AppResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Central application struct holding the collaborators and the session
/// manager.
pub struct App {
    pub db: Arc<Database>,
    pub settings: Arc<SettingsEngine>,
    pub events: Arc<EventHub>,
    pub tabs: Arc<TabManager>,
    pub bookmarks: Arc<BookmarkManager>,
    pub notifier: ChangeNotifier,
    pub sessions: SessionManager,
}

impl App {
    /// Bookmark database location under the platform data directory.
    pub fn default_db_path() -> String {
        platform::get_data_dir()
            .join("sessions.db")
            .to_string_lossy()
            .to_string()
    }

    /// Opens the database at `db_path` and loads the options file.
    ///
    /// A malformed options file is reported and replaced by defaults.
    pub fn new(db_path: &str, config_path: Option<String>) -> AppResult<Self> {
        let db = Database::open(db_path)?;
        let settings = SettingsEngine::new(config_path);
        if let Err(e) = settings.load() {
            warn!(target: "tabs_aside.app", path = settings.get_config_path(), error = %e, "options not loaded, using defaults");
        }
        Ok(Self::with_parts(db, settings))
    }

    /// Assembles an app from an already opened database and options.
    pub fn with_parts(db: Database, settings: SettingsEngine) -> Self {
        let db = Arc::new(db);
        let settings = Arc::new(settings);
        let events = Arc::new(EventHub::new());
        let tabs = Arc::new(TabManager::new(events.clone()));
        let bookmarks = Arc::new(BookmarkManager::new(db.clone()));
        let notifier = ChangeNotifier::new();

        let host = Host {
            bookmarks: bookmarks.clone(),
            tabs: tabs.clone(),
            values: tabs.clone(),
            events: events.clone(),
            options: settings.clone(),
            notifier: notifier.clone(),
        };

        Self {
            db,
            settings,
            events,
            tabs,
            bookmarks,
            notifier,
            sessions: SessionManager::new(host),
        }
    }

    /// Ensures the root folder exists, then re-adopts sessions whose tabs
    /// survived the previous process. Returns the number of sessions
    /// reactivated.
    pub async fn startup(&self) -> AppResult<usize> {
        let root = self.ensure_root_folder().await?;
        let reactivated = self.sessions.reactivate_all().await?;
        info!(target: "tabs_aside.app", root_folder_id = %root, reactivated, "started");
        Ok(reactivated)
    }

    /// Detaches every active session while leaving its tabs open and
    /// recoverable.
    pub async fn shutdown(&self) {
        self.sessions.suspend_all().await;
        info!(target: "tabs_aside.app", "shut down");
    }

    /// Returns the root folder id, creating the folder when the configured
    /// one is unset or gone.
    pub async fn ensure_root_folder(&self) -> AppResult<String> {
        let options = self.settings.options();
        if let Some(id) = &options.root_folder_id {
            match self.bookmarks.get(id).await {
                Ok(node) if node.is_folder() => return Ok(id.clone()),
                _ => warn!(target: "tabs_aside.app", root_folder_id = %id, "configured root folder is missing"),
            }
        }

        let folder = self
            .bookmarks
            .create(CreateBookmarkDetails {
                title: options.root_folder_title.clone(),
                ..Default::default()
            })
            .await?;
        self.settings
            .set_value("root_folder_id", serde_json::json!(folder.id))?;
        info!(target: "tabs_aside.app", root_folder_id = %folder.id, "root folder created");
        Ok(folder.id)
    }
}
