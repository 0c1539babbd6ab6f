//! Collaborators the session core talks to.

use std::sync::Arc;

use crate::managers::bookmark_manager::BookmarkStoreTrait;
use crate::managers::tab_manager::{SessionValuesTrait, TabHostTrait};
use crate::services::change_notifier::ChangeNotifier;
use crate::services::event_hub::HostEventsTrait;
use crate::services::settings_engine::OptionsProviderTrait;

/// Shared handles onto the host browser, the bookmark store, the options and
/// the UI notification channel. Cheap to clone.
#[derive(Clone)]
pub struct Host {
    pub bookmarks: Arc<dyn BookmarkStoreTrait>,
    pub tabs: Arc<dyn TabHostTrait>,
    pub values: Arc<dyn SessionValuesTrait>,
    pub events: Arc<dyn HostEventsTrait>,
    pub options: Arc<dyn OptionsProviderTrait>,
    pub notifier: ChangeNotifier,
}
