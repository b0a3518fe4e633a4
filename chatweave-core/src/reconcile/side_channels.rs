//! Metadata that arrives separately from message content
//!
//! References, ratings, token usage and agent thoughts are attached to an
//! existing message by record id. Events for unknown records are dropped.

use super::Reconciler;
use crate::events::{ChangeKind, RatingEvent, ReferenceEvent};
use crate::procedure;
use crate::types::{AgentThought, TokenStat};

/// Reference kind that is never shown to the user
const HIDDEN_REFERENCE_KIND: i64 = 1;

impl Reconciler {
    pub(super) fn apply_reference(&mut self, event: ReferenceEvent) {
        let Some(index) = self.transcript.find_by_record_id(&event.record_id) else {
            return;
        };

        let references: Vec<_> = event
            .references
            .into_iter()
            .filter(|r| r.kind != Some(HIDDEN_REFERENCE_KIND))
            .collect();
        self.transcript
            .update(index, |message| message.references = Some(references));
        self.finish(ChangeKind::Reference);
    }

    pub(super) fn apply_rating(&mut self, event: RatingEvent) {
        let Some(index) = self.transcript.find_by_record_id(&event.record_id) else {
            return;
        };

        self.transcript.update(index, |message| {
            message.score = Some(event.score);
            message.reasons = event.reasons;
        });
        self.finish(ChangeKind::Feedback);
    }

    /// Token usage is published to observers before any filtering. The first
    /// snapshot for a pending answer gives the placeholder its record id, which
    /// is how the streamed reply later finds it.
    pub(super) fn apply_token_stat(&mut self, stat: TokenStat) {
        self.notifier.token_state_changed(&stat);

        if !self.session.is_current(Some(&stat.session_id)) {
            return;
        }

        let owner = self
            .transcript
            .find_by_record_id(&stat.record_id)
            .filter(|&i| self.transcript.get(i).is_some_and(|m| !m.is_placeholder()));

        let index = match owner.or_else(|| self.transcript.placeholder_index()) {
            Some(index) => index,
            None => return,
        };

        let fallback_text = self.settings.loading_text.clone();
        self.transcript.update(index, |message| {
            if message.is_placeholder() {
                message.record_id = Some(stat.record_id.clone());
                message.loading_text = Some(
                    stat.procedures
                        .iter()
                        .rev()
                        .find_map(|p| p.title.clone())
                        .unwrap_or(fallback_text),
                );
            }
            message.tokens_msg = Some(stat);
        });
        self.finish(ChangeKind::Answer);
    }

    pub(super) fn apply_thought(&mut self, mut thought: AgentThought) {
        if !self.session.is_current(Some(&thought.session_id)) {
            return;
        }
        let Some(index) = self.transcript.find_by_record_id(&thought.record_id) else {
            return;
        };

        procedure::classify_thought(&mut thought);
        self.transcript
            .update(index, |message| message.agent_thought = Some(thought));
        self.finish(ChangeKind::Answer);
    }
}
