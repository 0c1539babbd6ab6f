//! Fire-and-forget change notifications for the UI layer.

use tokio::sync::broadcast;
use tracing::trace;

use crate::types::events::{ChangeKind, SessionChange};

const CHANNEL_CAPACITY: usize = 64;

/// Broadcasts [`SessionChange`] signals to any number of subscribers.
///
/// Cloning yields another handle onto the same channel.
#[derive(Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<SessionChange>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.sender.subscribe()
    }

    /// Signals that `session_id` changed. Having no subscribers is fine.
    pub fn notify(&self, session_id: &str, kind: ChangeKind) {
        trace!(target: "tabs_aside.notify", session_id, ?kind, "session change");
        let _ = self.sender.send(SessionChange {
            session_id: session_id.to_string(),
            kind,
        });
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
