//! Event reconciliation
//!
//! The [`Reconciler`] is the single writer of the transcript. Every event,
//! whether a local question, a server push or a timer expiry, is applied to
//! completion before the next one starts:
//!
//! ```text
//!   question ──┐
//!   reply ─────┤      ┌────────────┐     ┌────────────┐     ┌──────────┐
//!   history ───┼────► │ Reconciler │ ──► │ Transcript │ ──► │ Notifier │
//!   reference ─┤      └────────────┘     └────────────┘     └──────────┘
//!   expiry ────┘            │
//!                           ▼
//!                   TimeoutTracker / citation / procedure
//! ```
//!
//! After each event the transcript is deduplicated and its ordering restored,
//! then observers are notified.

mod answer;
mod history;
mod side_channels;

use crate::config::{ChatPattern, SessionConfig};
use crate::error::Result;
use crate::events::{ChangeKind, InboundEvent};
use crate::notify::Notifier;
use crate::session::SessionState;
use crate::timeout::TimeoutTracker;
use crate::transcript::Transcript;
use crate::types::Message;

/// Applies events to the transcript.
#[derive(Debug)]
pub struct Reconciler {
    settings: SessionConfig,
    session: SessionState,
    transcript: Transcript,
    timeouts: TimeoutTracker,
    notifier: Notifier,
}

impl Reconciler {
    pub fn new(settings: SessionConfig, timeouts: TimeoutTracker, notifier: Notifier) -> Self {
        Self {
            settings,
            session: SessionState::new(),
            transcript: Transcript::new(),
            timeouts,
            notifier,
        }
    }

    pub fn settings(&self) -> &SessionConfig {
        &self.settings
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut SessionState {
        &mut self.session
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn notifier_mut(&mut self) -> &mut Notifier {
        &mut self.notifier
    }

    pub fn timeouts(&self) -> &TimeoutTracker {
        &self.timeouts
    }

    /// Append a locally originated question and arm its timeout.
    ///
    /// Fails without touching the transcript if the timer cannot be armed.
    pub fn send_question(&mut self, question: Message) -> Result<()> {
        self.timeouts.arm(&question)?;
        tracing::debug!(
            request_id = ?question.request_id,
            timestamp = question.timestamp,
            "Question queued"
        );
        self.transcript.append(question);
        self.finish(ChangeKind::Question);
        Ok(())
    }

    /// Apply one inbound server event.
    pub fn apply(&mut self, event: InboundEvent) {
        tracing::debug!(event = event.kind(), "Reconciling inbound event");
        match event {
            InboundEvent::Reply(reply) => self.apply_reply(reply),
            InboundEvent::Reference(reference) => self.apply_reference(reference),
            InboundEvent::Rating(rating) => self.apply_rating(rating),
            InboundEvent::TokenStat(stat) => self.apply_token_stat(stat),
            InboundEvent::Thought(thought) => self.apply_thought(thought),
            InboundEvent::History(page) => self.apply_history(page.messages),
        }
    }

    /// Handle a timer expiry for `request_id`.
    ///
    /// Synthesizes a failure marker from the question snapshot and merges it
    /// like an answer. Unlike a server acknowledgment, the failure marker is
    /// never followed by a placeholder. Returns false if the request was
    /// acknowledged first.
    pub fn expire(&mut self, request_id: &str) -> bool {
        let Some(question) = self.timeouts.take_expired(request_id) else {
            return false;
        };
        tracing::warn!(request_id = %request_id, "Question was not acknowledged in time");

        let marker = Message {
            failed: true,
            ..question
        };
        self.merge_answer(marker, answer::Origin::Timeout);
        self.finish(ChangeKind::Answer);
        true
    }

    /// Stop the message that is still streaming.
    ///
    /// Marks it final and appends the stop marker. Returns the record id to
    /// send upstream, or `None` if nothing is streaming.
    pub fn stop_generation(&mut self) -> Option<String> {
        let pattern = self.settings.pattern;
        let index = self.transcript.messages().iter().position(|m| {
            !m.is_final
                && m.record_id.is_some()
                && (!m.is_placeholder() || pattern == ChatPattern::Standard)
        })?;

        let record_id = self.transcript.get(index)?.record_id.clone()?;
        let marker = self.settings.stop_marker.clone();
        self.transcript.update(index, |message| {
            message.is_final = true;
            message.loading_message = false;
            message.loading_text = None;
            message.content.push_str(&marker);
        });
        tracing::info!(record_id = %record_id, "Generation stopped");

        self.finish(ChangeKind::Stop);
        Some(record_id)
    }

    /// Insert the greeting if nothing has been shown yet.
    pub fn show_welcome(&mut self, content: &str, timestamp: i64) -> bool {
        if !self.transcript.is_empty() {
            return false;
        }
        self.apply_answer(Message {
            record_id: Some(WELCOME_RECORD_ID.to_string()),
            content: content.to_string(),
            timestamp,
            is_final: true,
            ..Default::default()
        });
        true
    }

    /// The question an answer responds to, via `related_record_id`.
    pub fn question_for(&self, record_id: &str) -> Option<&Message> {
        let related = self
            .transcript
            .message_by_record_id(record_id)?
            .related_record_id
            .as_deref()?;
        self.transcript.message_by_record_id(related)
    }

    /// Cancel all timers and clear transcript and session state.
    pub fn reset(&mut self) {
        self.timeouts.clear();
        self.transcript.clear();
        self.session.destroy();
    }

    /// Dedupe, restore ordering and notify observers.
    fn finish(&mut self, kind: ChangeKind) {
        self.transcript.dedupe();
        self.transcript.restore_order();
        self.notifier
            .transcript_changed(self.transcript.messages(), kind);
    }
}

/// Record id of the synthetic greeting
pub const WELCOME_RECORD_ID: &str = "welcome-message";
