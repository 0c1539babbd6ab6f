// Tabs Aside state managers
// Managers hold state: the bookmark store, the host browser, active sessions and their registry.

pub mod active_session;
pub mod bookmark_manager;
pub mod removal_queue;
pub mod session_manager;
pub mod tab_manager;
