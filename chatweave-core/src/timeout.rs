//! Acknowledgment timeouts
//!
//! One timer per in-flight request id. A timer is a spawned task that sleeps
//! for the acknowledgment window and then reports the request id on the
//! expiry channel; whoever drives the engine feeds that id back through
//! [`crate::reconcile::Reconciler::expire`], so a failure marker is processed
//! like any other event.
//!
//! Cancelling aborts the task and forgets the request. An expiry that was
//! already queued when its request got acknowledged is ignored, because
//! [`TimeoutTracker::take_expired`] only yields requests that are still armed.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::types::Message;

struct PendingTimeout {
    /// Snapshot of the question, used to build the failure marker
    question: Message,
    task: JoinHandle<()>,
}

/// Tracks per-request acknowledgment timers.
pub struct TimeoutTracker {
    window: Duration,
    pending: HashMap<String, PendingTimeout>,
    expired_tx: mpsc::UnboundedSender<String>,
}

impl std::fmt::Debug for TimeoutTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeoutTracker")
            .field("window", &self.window)
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TimeoutTracker {
    /// Create a tracker and the receiving end of its expiry channel.
    pub fn channel(window: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        let tracker = Self {
            window,
            pending: HashMap::new(),
            expired_tx,
        };
        (tracker, expired_rx)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Arm a timer for `question`, replacing any timer for the same request.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(&mut self, question: &Message) -> Result<()> {
        let request_id = question
            .request_id
            .clone()
            .ok_or_else(|| Error::Timer("question has no request id".to_string()))?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Timer(format!("no async runtime to arm timeout: {}", e)))?;

        let tx = self.expired_tx.clone();
        let window = self.window;
        let expired_id = request_id.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(window).await;
            let _ = tx.send(expired_id);
        });

        tracing::debug!(request_id = %request_id, window_secs = window.as_secs(), "Armed ack timeout");

        let pending = PendingTimeout {
            question: question.clone(),
            task,
        };
        if let Some(previous) = self.pending.insert(request_id, pending) {
            previous.task.abort();
        }
        Ok(())
    }

    /// Cancel the timer for `request_id`. Returns true if one was armed.
    pub fn cancel(&mut self, request_id: &str) -> bool {
        match self.pending.remove(request_id) {
            Some(pending) => {
                pending.task.abort();
                tracing::debug!(request_id = %request_id, "Cancelled ack timeout");
                true
            }
            None => false,
        }
    }

    /// Claim an expired request, returning its question snapshot.
    ///
    /// Returns `None` if the request was acknowledged (or already expired) in
    /// the meantime, so each request fails at most once.
    pub fn take_expired(&mut self, request_id: &str) -> Option<Message> {
        self.pending.remove(request_id).map(|pending| pending.question)
    }

    pub fn is_armed(&self, request_id: &str) -> bool {
        self.pending.contains_key(request_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Abort every timer.
    pub fn clear(&mut self) {
        for (_, pending) in self.pending.drain() {
            pending.task.abort();
        }
    }
}

impl Drop for TimeoutTracker {
    fn drop(&mut self) {
        self.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(120);

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_after_window() {
        let (mut tracker, mut expired) = TimeoutTracker::channel(WINDOW);
        tracker.arm(&Message::question("r1", "hello", 1)).unwrap();

        let start = tokio::time::Instant::now();
        let id = expired.recv().await.unwrap();

        assert_eq!(id, "r1");
        assert!(start.elapsed() >= WINDOW);
        let question = tracker.take_expired(&id).unwrap();
        assert_eq!(question.content, "hello");
        assert!(tracker.take_expired(&id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let (mut tracker, mut expired) = TimeoutTracker::channel(WINDOW);
        tracker.arm(&Message::question("r1", "hello", 1)).unwrap();

        assert!(tracker.cancel("r1"));
        assert!(!tracker.cancel("r1"));

        tokio::time::sleep(WINDOW * 2).await;
        assert!(expired.try_recv().is_err());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_arm_without_runtime_fails() {
        let (mut tracker, _expired) = TimeoutTracker::channel(WINDOW);
        let err = tracker.arm(&Message::question("r1", "hello", 1)).unwrap_err();
        assert!(matches!(err, Error::Timer(_)));
        assert!(!tracker.is_armed("r1"));
    }

    #[tokio::test]
    async fn test_arm_requires_request_id() {
        let (mut tracker, _expired) = TimeoutTracker::channel(WINDOW);
        assert!(tracker.arm(&Message::placeholder(1)).is_err());
    }
}
