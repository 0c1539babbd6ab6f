//! Debounced batch removal of tab records.
//!
//! The host does not say whether a tab closed on its own or because its
//! whole window is closing. Record removals are therefore buffered for a
//! short delay: a window-removed signal arriving in the meantime can
//! [`cancel`](RemovalQueue::cancel) the batch, otherwise the batch is
//! flushed once the delay elapses. Every push restarts the delay so bursts
//! of closures coalesce into a single flush.

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;

/// Callback receiving a batch of record ids once the delay elapsed.
pub type FlushFn = Arc<dyn Fn(Vec<String>) -> BoxFuture<'static, ()> + Send + Sync>;

#[derive(Default)]
struct QueueState {
    pending: Vec<String>,
    timer: Option<JoinHandle<()>>,
}

pub struct RemovalQueue {
    delay: Duration,
    flush: FlushFn,
    state: Arc<Mutex<QueueState>>,
}

impl RemovalQueue {
    pub fn new(delay: Duration, flush: FlushFn) -> Self {
        Self {
            delay,
            flush,
            state: Arc::new(Mutex::new(QueueState::default())),
        }
    }

    /// Queues a record and (re)starts the flush timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn push(&self, record_id: String) {
        let mut state = self.state.lock();
        if !state.pending.contains(&record_id) {
            state.pending.push(record_id);
        }
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }

        let shared = self.state.clone();
        let flush = self.flush.clone();
        let delay = self.delay;
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let batch = {
                let mut state = shared.lock();
                state.timer = None;
                std::mem::take(&mut state.pending)
            };
            // A push racing with the wake-up can leave an empty batch behind.
            if !batch.is_empty() {
                debug!(target: "tabs_aside.removals", count = batch.len(), "flushing record removals");
                flush(batch).await;
            }
        }));
    }

    /// Stops the timer and hands back the records that were pending.
    pub fn cancel(&self) -> Vec<String> {
        let mut state = self.state.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        std::mem::take(&mut state.pending)
    }

    pub fn len(&self) -> usize {
        self.state.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn pending(&self) -> Vec<String> {
        self.state.lock().pending.clone()
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}
