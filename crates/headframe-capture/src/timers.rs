//! Live timer handles for a session's event loop.
//!
//! Each scheduled timer is a tokio task that sleeps and then posts a
//! `SessionMessage::Timer` back into the loop's queue. The registry keeps
//! every abort handle so teardown can stop them all at once.

use crate::sequencer::{TimerKind, TimerToken};
use crate::session::SessionMessage;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::WeakSender;
use tokio::task::AbortHandle;

pub(crate) struct TimerRegistry {
    tx: WeakSender<SessionMessage>,
    live: HashMap<TimerToken, AbortHandle>,
}

impl TimerRegistry {
    /// Timers post through a weak sender so they never keep the loop alive.
    pub(crate) fn new(tx: WeakSender<SessionMessage>) -> Self {
        Self {
            tx,
            live: HashMap::new(),
        }
    }

    pub(crate) fn schedule(&mut self, token: TimerToken, kind: TimerKind, after: Duration) {
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(SessionMessage::Timer { token, kind }).await;
            }
        });
        tracing::trace!(?token, ?kind, after_ms = after.as_millis() as u64, "timer scheduled");
        self.live.insert(token, handle.abort_handle());
    }

    pub(crate) fn cancel(&mut self, token: TimerToken) {
        if let Some(handle) = self.live.remove(&token) {
            handle.abort();
        }
    }

    /// Forget a timer whose message has been received.
    pub(crate) fn fired(&mut self, token: TimerToken) {
        self.live.remove(&token);
    }

    pub(crate) fn cancel_all(&mut self) {
        let count = self.live.len();
        for (_, handle) in self.live.drain() {
            handle.abort();
        }
        if count > 0 {
            tracing::debug!(count, "outstanding timers cancelled");
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
