//! Merging server answers into the transcript
//!
//! Target slot, in priority order:
//! 1. a message with the same record id is overwritten in place;
//! 2. a self-authored message with the same request id is acknowledged;
//! 3. otherwise the answer is placed by timestamp, scanning from the newest
//!    entry, and supersedes the placeholder if it lands right after it.
//!
//! A handoff notice arriving while the placeholder is pending bypasses all of
//! this and attaches to the last real message.

use super::Reconciler;
use crate::citation;
use crate::events::{ChangeKind, ReplyEvent};
use crate::types::Message;

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Origin {
    Server,
    /// Failure marker synthesized by an expired timer
    Timeout,
}

impl Reconciler {
    /// Apply a `reply` event: filter, annotate citations, then merge.
    pub fn apply_reply(&mut self, reply: ReplyEvent) {
        let ReplyEvent {
            mut message,
            quote_infos,
        } = reply;

        if !self.session.is_current(message.session_id.as_deref()) {
            tracing::trace!(session_id = ?message.session_id, "Ignoring reply for another session");
            return;
        }

        let existing = message
            .record_id
            .as_deref()
            .and_then(|id| self.transcript.message_by_record_id(id));

        if existing.is_some_and(|m| m.is_final) {
            tracing::debug!(record_id = ?message.record_id, "Dropping fragment for finished message");
            return;
        }

        if !quote_infos.is_empty() {
            let references = existing
                .and_then(|m| m.references.as_deref())
                .unwrap_or_default();
            message.content = citation::annotate(&message.content, &quote_infos, references).content;
        }

        self.apply_answer(message);
    }

    /// Merge an answer (already annotated) and notify.
    pub fn apply_answer(&mut self, message: Message) {
        self.merge_answer(message, Origin::Server);
        self.finish(ChangeKind::Answer);
    }

    pub(super) fn merge_answer(&mut self, mut incoming: Message, origin: Origin) {
        if let Some(request_id) = incoming.request_id.as_deref() {
            self.timeouts.cancel(request_id);
        }
        self.track_handoff(&incoming);

        if self.transcript.is_empty() {
            self.transcript.append(incoming);
            return;
        }

        if incoming.is_transferred() && self.transcript.last().is_some_and(Message::is_placeholder) {
            self.attach_handoff(incoming);
            return;
        }

        // 1. identity
        if let Some(index) = incoming
            .record_id
            .as_deref()
            .and_then(|id| self.transcript.find_by_record_id(id))
        {
            if let Some(previous) = self.transcript.get(index) {
                let merged = carry_forward(incoming, previous);
                self.transcript.replace_at(index, merged);
            }
            return;
        }

        // 2. acknowledgment
        if let Some(index) = self.ack_target(&incoming) {
            incoming.is_loading = false;
            let Some(previous) = self.transcript.get(index) else {
                return;
            };
            let merged = carry_forward(incoming, previous);
            let (timestamp, is_evil) = (merged.timestamp, merged.is_evil);
            tracing::debug!(
                request_id = ?merged.request_id,
                record_id = ?merged.record_id,
                "Question acknowledged"
            );
            self.transcript.replace_at(index, merged);

            if origin == Origin::Server && !is_evil && !self.session.handoff_active() {
                self.insert_placeholder(timestamp);
            }
            return;
        }

        // 3. position
        self.insert_by_timestamp(incoming);
    }

    /// Self-authored message awaiting this event's acknowledgment
    fn ack_target(&self, incoming: &Message) -> Option<usize> {
        let request_id = incoming.request_id.as_deref()?;
        if !incoming.is_from_self {
            return None;
        }
        self.transcript
            .rposition(|m| m.is_from_self && m.request_id.as_deref() == Some(request_id))
    }

    /// Insert after the newest entry whose timestamp is not later than the
    /// incoming one; a placeholder in that slot is replaced instead.
    fn insert_by_timestamp(&mut self, incoming: Message) {
        let slot = self
            .transcript
            .rposition(|m| m.timestamp <= incoming.timestamp);

        match slot {
            Some(index) if self.transcript.get(index).is_some_and(Message::is_placeholder) => {
                self.transcript.replace_at(index, incoming);
            }
            Some(index) => self.transcript.insert_at(index + 1, incoming),
            None => self.transcript.insert_at(0, incoming),
        }
    }

    /// Append a fresh placeholder; at most one exists at a time.
    fn insert_placeholder(&mut self, timestamp: i64) {
        if let Some(index) = self.transcript.placeholder_index() {
            self.transcript.remove_at(index);
        }
        let mut placeholder = Message::placeholder(timestamp);
        placeholder.loading_text = Some(self.settings.loading_text.clone());
        self.transcript.append(placeholder);
    }

    /// Drop the placeholder and merge the handoff notice into the last real
    /// message, whose own fields take precedence.
    fn attach_handoff(&mut self, incoming: Message) {
        if let Some(index) = self.transcript.placeholder_index() {
            self.transcript.remove_at(index);
        }
        let Some(index) = self.transcript.len().checked_sub(1) else {
            self.transcript.append(incoming);
            return;
        };
        let Some(previous) = self.transcript.get(index) else {
            return;
        };

        let mut merged = previous.clone();
        merged.loading_message = false;
        merged.references = merged.references.or(incoming.references);
        merged.tokens_msg = merged.tokens_msg.or(incoming.tokens_msg);
        merged.agent_thought = merged.agent_thought.or(incoming.agent_thought);
        merged.quit = merged.quit.or(incoming.quit);
        merged.transfer = Some(true);
        merged.transfer_robot = Some(false);

        tracing::info!(record_id = ?merged.record_id, "Handoff attached to last message");
        self.transcript.replace_at(index, merged);
    }

    fn track_handoff(&mut self, incoming: &Message) {
        if incoming.transfer == Some(true) {
            self.session.set_handoff(true);
        }
        if incoming.quit == Some(true) {
            self.session.set_handoff(false);
        }
    }
}

/// Overwrite `previous` with `incoming`, keeping what arrives on other
/// channels and the earliest timestamp.
fn carry_forward(mut incoming: Message, previous: &Message) -> Message {
    if incoming.references.is_none() {
        incoming.references = previous.references.clone();
    }
    if incoming.tokens_msg.is_none() {
        incoming.tokens_msg = previous.tokens_msg.clone();
    }
    if incoming.agent_thought.is_none() {
        incoming.agent_thought = previous.agent_thought.clone();
    }
    if incoming.score.is_none() {
        incoming.score = previous.score;
        incoming.reasons = previous.reasons.clone();
    }
    incoming.transfer = incoming.transfer.or(previous.transfer);
    incoming.transfer_robot = incoming.transfer_robot.or(previous.transfer_robot);
    incoming.quit = incoming.quit.or(previous.quit);
    incoming.related_record_id = incoming
        .related_record_id
        .or_else(|| previous.related_record_id.clone());
    incoming.timestamp = incoming.timestamp.min(previous.timestamp);
    incoming
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use crate::config::SessionConfig;
    use crate::events::{InboundEvent, ReplyEvent};
    use crate::types::{Message, QuoteInfo, Reference, TokenStat};

    #[tokio::test]
    async fn test_ack_then_answer_supersedes_placeholder() {
        let mut h = harness(SessionConfig::default());
        let r = &mut h.reconciler;

        r.send_question(Message::question("r1", "hello", 100)).unwrap();
        r.apply(InboundEvent::Reply(ack("r1", "m1", "hello", 100).into()));

        let messages = r.transcript().messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].has_record_id("m1"));
        assert!(!messages[0].is_loading);
        assert!(messages[1].is_placeholder());
        assert_eq!(messages[1].timestamp, 100);
        assert!(!r.timeouts().is_armed("r1"));

        r.apply(InboundEvent::Reply(answer("m1r", "hi", 101).into()));

        assert_eq!(contents(r), vec!["hello", "hi"]);
        let messages = r.transcript().messages();
        assert!(messages[1].has_record_id("m1r"));
        assert!(messages.iter().all(|m| !m.is_placeholder()));
        assert_ordered(r);
    }

    #[test]
    fn test_streaming_overwrites_in_place_keeping_side_channels() {
        let mut h = harness(SessionConfig::default());
        let r = &mut h.reconciler;

        let mut first = answer("m1", "Hel", 10);
        first.references = Some(vec![Reference {
            id: "1".to_string(),
            ..Default::default()
        }]);
        first.tokens_msg = Some(TokenStat::default());
        first.transfer = Some(true);
        r.apply_answer(first);

        let mut second = answer("m1", "Hello", 12);
        second.transfer_robot = Some(true);
        r.apply_answer(second);

        let messages = r.transcript().messages();
        assert_eq!(messages.len(), 1);
        let m = &messages[0];
        assert_eq!(m.content, "Hello");
        assert_eq!(m.timestamp, 10);
        assert!(m.references.is_some());
        assert!(m.tokens_msg.is_some());
        assert_eq!(m.transfer, Some(true));
        assert_eq!(m.transfer_robot, Some(true));
    }

    #[test]
    fn test_positional_insert_and_tie_break() {
        let mut h = harness(SessionConfig::default());
        let r = &mut h.reconciler;

        r.apply_answer(answer("b", "b", 20));
        r.apply_answer(answer("d", "d", 40));
        r.apply_answer(answer("c", "c", 30));
        r.apply_answer(answer("a", "a", 10));
        // Same instant as "c": lands after it
        r.apply_answer(answer("c2", "c2", 30));

        assert_eq!(contents(r), vec!["a", "b", "c", "c2", "d"]);
        assert_ordered(r);
    }

    #[tokio::test]
    async fn test_evil_question_gets_no_placeholder() {
        let mut h = harness(SessionConfig::default());
        let r = &mut h.reconciler;

        r.send_question(Message::question("r1", "bad words", 5)).unwrap();
        let mut receipt = ack("r1", "m1", "***", 5);
        receipt.is_evil = true;
        r.apply_answer(receipt);

        assert_eq!(contents(r), vec!["***"]);
        assert!(r.transcript().placeholder_index().is_none());
    }

    #[tokio::test]
    async fn test_handoff_replaces_placeholder_and_suppresses_next_one() {
        let mut h = harness(SessionConfig::default());
        let r = &mut h.reconciler;

        r.send_question(Message::question("r1", "agent please", 5)).unwrap();
        r.apply_answer(ack("r1", "m1", "agent please", 5));
        assert!(r.transcript().last().unwrap().is_placeholder());

        let mut notice = answer("t1", "Transferring you", 6);
        notice.transfer = Some(true);
        r.apply_answer(notice);

        let messages = r.transcript().messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "agent please");
        assert_eq!(messages[0].transfer, Some(true));
        assert_eq!(messages[0].transfer_robot, Some(false));
        assert!(r.session().handoff_active());

        r.send_question(Message::question("r2", "hello human", 7)).unwrap();
        r.apply_answer(ack("r2", "m2", "hello human", 7));
        assert!(r.transcript().placeholder_index().is_none());
    }

    #[tokio::test]
    async fn test_quit_ends_handoff_and_restores_placeholder() {
        let mut h = harness(SessionConfig::default());
        let r = &mut h.reconciler;

        let mut notice = answer("t1", "Transferring you", 5);
        notice.transfer = Some(true);
        r.apply_answer(notice);
        assert!(r.session().handoff_active());

        let mut left = answer("x1", "The agent has left", 6);
        left.quit = Some(true);
        r.apply_answer(left);
        assert!(!r.session().handoff_active());

        r.send_question(Message::question("r1", "anyone there?", 7)).unwrap();
        r.apply_answer(ack("r1", "m1", "anyone there?", 7));
        assert!(r.transcript().last().unwrap().is_placeholder());

        // A later overwrite without the flag keeps it
        r.apply_answer(answer("x1", "The agent has left.", 6));
        let left = r.transcript().message_by_record_id("x1").unwrap();
        assert_eq!(left.content, "The agent has left.");
        assert_eq!(left.quit, Some(true));
        assert!(!r.session().handoff_active());
        assert!(r.transcript().last().unwrap().is_placeholder());
    }

    #[test]
    fn test_reply_citations_use_attached_references() {
        let mut h = harness(SessionConfig::default());
        let r = &mut h.reconciler;

        r.apply_answer(answer("m1", "", 10));
        r.apply(InboundEvent::Reply(ReplyEvent {
            message: answer("m1", "ABCDE", 10),
            quote_infos: vec![
                QuoteInfo { position: 1, index: 9 },
                QuoteInfo { position: 3, index: 7 },
            ],
        }));

        assert_eq!(contents(r), vec!["A[9](@ref)BC[7](@ref)DE"]);
    }

    #[test]
    fn test_reply_for_other_session_is_ignored() {
        let mut h = harness(SessionConfig::default());
        let mut foreign = answer("m1", "hi", 1);
        foreign.session_id = Some("other".to_string());

        h.reconciler.apply(InboundEvent::Reply(foreign.into()));

        assert!(h.reconciler.transcript().is_empty());
        assert!(h.notifications.try_recv().is_err());
    }

    #[test]
    fn test_older_answer_goes_to_front() {
        let mut h = harness(SessionConfig::default());
        let r = &mut h.reconciler;
        r.apply_answer(answer("b", "b", 20));
        r.apply_answer(answer("a", "a", 5));
        assert_eq!(contents(r), vec!["a", "b"]);
    }
}
