//! Transcript store
//!
//! The ordered list of messages plus a record-id lookup index. Every write
//! stamps the entry with a revision so deduplication can tell which copy of
//! a record was written last.
//!
//! ## Invariants (after [`Transcript::dedupe`] + [`Transcript::restore_order`])
//!
//! - No two messages share a record id. Messages without one are never merged.
//! - A surviving record carries the content of its most recent write and the
//!   earliest timestamp seen for that record.
//! - Timestamps are non-decreasing, except that the placeholder is last.

use std::collections::HashMap;

use crate::types::Message;

/// Ordered, deduplicated message list
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    /// Write revision per message, parallel to `messages`
    revisions: Vec<u64>,
    /// record_id -> index of its most recently written copy
    by_record: HashMap<String, usize>,
    next_revision: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Read-only view of the messages, in display order
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn first(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Index of the message with this record id
    pub fn find_by_record_id(&self, id: &str) -> Option<usize> {
        self.by_record.get(id).copied()
    }

    pub fn message_by_record_id(&self, id: &str) -> Option<&Message> {
        self.find_by_record_id(id).map(|i| &self.messages[i])
    }

    /// Index of the newest message matching `predicate`
    pub fn rposition(&self, predicate: impl Fn(&Message) -> bool) -> Option<usize> {
        self.messages.iter().rposition(predicate)
    }

    /// Index of the pending-answer placeholder, if one exists
    pub fn placeholder_index(&self) -> Option<usize> {
        self.messages.iter().position(Message::is_placeholder)
    }

    pub fn append(&mut self, message: Message) {
        let revision = self.bump();
        self.messages.push(message);
        self.revisions.push(revision);
        self.reindex();
    }

    /// Insert at `index`; an index past the end appends.
    pub fn insert_at(&mut self, index: usize, message: Message) {
        let index = index.min(self.messages.len());
        let revision = self.bump();
        self.messages.insert(index, message);
        self.revisions.insert(index, revision);
        self.reindex();
    }

    /// Overwrite the message at `index`, returning the previous one.
    ///
    /// Returns `message` back if `index` is out of range.
    pub fn replace_at(&mut self, index: usize, message: Message) -> Message {
        if index >= self.messages.len() {
            return message;
        }
        let revision = self.bump();
        let previous = std::mem::replace(&mut self.messages[index], message);
        self.revisions[index] = revision;
        self.reindex();
        previous
    }

    /// Mutate the message at `index` in place; counts as a write.
    pub fn update(&mut self, index: usize, f: impl FnOnce(&mut Message)) -> bool {
        let Some(message) = self.messages.get_mut(index) else {
            return false;
        };
        f(message);
        let revision = self.bump();
        self.revisions[index] = revision;
        self.reindex();
        true
    }

    pub fn remove_at(&mut self, index: usize) -> Option<Message> {
        if index >= self.messages.len() {
            return None;
        }
        self.revisions.remove(index);
        let removed = self.messages.remove(index);
        self.reindex();
        Some(removed)
    }

    /// Put `page` in front of the current messages.
    pub fn prepend_all(&mut self, page: Vec<Message>) {
        let mut messages = Vec::with_capacity(page.len() + self.messages.len());
        let mut revisions = Vec::with_capacity(messages.capacity());
        for message in page {
            revisions.push(self.bump());
            messages.push(message);
        }
        messages.append(&mut self.messages);
        revisions.append(&mut self.revisions);
        self.messages = messages;
        self.revisions = revisions;
        self.reindex();
    }

    /// Replace the whole transcript.
    pub fn replace_all(&mut self, messages: Vec<Message>) {
        self.messages.clear();
        self.revisions.clear();
        for message in messages {
            let revision = self.bump();
            self.messages.push(message);
            self.revisions.push(revision);
        }
        self.reindex();
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.revisions.clear();
        self.by_record.clear();
    }

    /// Collapse messages sharing a record id.
    ///
    /// The survivor sits at the group's first position, holds the most recently
    /// written content and the group's earliest timestamp. Returns the number of
    /// messages removed.
    pub fn dedupe(&mut self) -> usize {
        struct Group {
            first: usize,
            latest: usize,
            earliest_timestamp: i64,
        }

        let mut groups: HashMap<&str, Group> = HashMap::new();
        for (i, message) in self.messages.iter().enumerate() {
            let Some(id) = message.record_id.as_deref() else {
                continue;
            };
            groups
                .entry(id)
                .and_modify(|g| {
                    if self.revisions[i] > self.revisions[g.latest] {
                        g.latest = i;
                    }
                    g.earliest_timestamp = g.earliest_timestamp.min(message.timestamp);
                })
                .or_insert(Group {
                    first: i,
                    latest: i,
                    earliest_timestamp: message.timestamp,
                });
        }

        if groups.len() == self.by_record_len_hint() {
            return 0;
        }

        // index -> Some((source index, timestamp)) to keep, None to drop
        let plan: Vec<Option<(usize, i64)>> = self
            .messages
            .iter()
            .enumerate()
            .map(|(i, message)| match message.record_id.as_deref() {
                None => Some((i, message.timestamp)),
                Some(id) => {
                    let group = &groups[id];
                    (group.first == i).then_some((group.latest, group.earliest_timestamp))
                }
            })
            .collect();
        drop(groups);

        let mut slots: Vec<Option<Message>> = std::mem::take(&mut self.messages)
            .into_iter()
            .map(Some)
            .collect();
        let old_revisions = std::mem::take(&mut self.revisions);

        for (source, timestamp) in plan.into_iter().flatten() {
            if let Some(mut message) = slots[source].take() {
                message.timestamp = timestamp;
                self.messages.push(message);
                self.revisions.push(old_revisions[source]);
            }
        }

        let removed = old_revisions.len() - self.messages.len();
        if removed > 0 {
            tracing::debug!(removed, "Collapsed duplicate transcript records");
        }
        self.reindex();
        removed
    }

    /// Stable-sort by timestamp with the placeholder pinned last.
    ///
    /// An already ordered transcript is left untouched, so equal timestamps keep
    /// their insertion order.
    pub fn restore_order(&mut self) {
        let ordered = self.messages.windows(2).all(|pair| in_order(&pair[0], &pair[1]));
        if ordered {
            return;
        }

        let mut entries: Vec<(Message, u64)> = std::mem::take(&mut self.messages)
            .into_iter()
            .zip(std::mem::take(&mut self.revisions))
            .collect();
        entries.sort_by(|(a, _), (b, _)| {
            a.is_placeholder()
                .cmp(&b.is_placeholder())
                .then(a.timestamp.cmp(&b.timestamp))
        });
        tracing::debug!(len = entries.len(), "Restored transcript ordering");

        (self.messages, self.revisions) = entries.into_iter().unzip();
        self.reindex();
    }

    /// Number of messages carrying a record id, i.e. the group count when no
    /// duplicates exist.
    fn by_record_len_hint(&self) -> usize {
        self.messages.iter().filter(|m| m.record_id.is_some()).count()
    }

    fn bump(&mut self) -> u64 {
        self.next_revision += 1;
        self.next_revision
    }

    fn reindex(&mut self) {
        self.by_record.clear();
        for (i, message) in self.messages.iter().enumerate() {
            let Some(id) = message.record_id.as_ref() else {
                continue;
            };
            match self.by_record.get(id) {
                Some(&existing) if self.revisions[existing] > self.revisions[i] => {}
                _ => {
                    self.by_record.insert(id.clone(), i);
                }
            }
        }
    }
}

fn in_order(a: &Message, b: &Message) -> bool {
    if a.is_placeholder() {
        return false;
    }
    b.is_placeholder() || a.timestamp <= b.timestamp
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(record_id: &str, content: &str, timestamp: i64) -> Message {
        Message {
            record_id: Some(record_id.to_string()),
            content: content.to_string(),
            timestamp,
            ..Default::default()
        }
    }

    fn contents(t: &Transcript) -> Vec<&str> {
        t.messages().iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_dedupe_keeps_latest_content_and_earliest_timestamp() {
        let mut t = Transcript::new();
        t.append(msg("a", "first", 10));
        t.append(msg("b", "other", 20));
        t.append(msg("a", "second", 30));

        let removed = t.dedupe();

        assert_eq!(removed, 1);
        assert_eq!(contents(&t), vec!["second", "other"]);
        assert_eq!(t.messages()[0].timestamp, 10);
        assert_eq!(t.find_by_record_id("a"), Some(0));
        assert_eq!(t.find_by_record_id("b"), Some(1));
    }

    #[test]
    fn test_dedupe_uses_write_order_not_position() {
        let mut t = Transcript::new();
        t.append(msg("a", "old", 50));
        t.insert_at(0, msg("a", "newer", 40));

        t.dedupe();

        assert_eq!(t.len(), 1);
        assert_eq!(t.messages()[0].content, "newer");
        assert_eq!(t.messages()[0].timestamp, 40);
    }

    #[test]
    fn test_dedupe_never_merges_messages_without_record_id() {
        let mut t = Transcript::new();
        t.append(Message::question("r1", "hi", 1));
        t.append(Message::question("r2", "hi", 1));
        assert_eq!(t.dedupe(), 0);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_restore_order_pins_placeholder_last() {
        let mut t = Transcript::new();
        t.append(msg("a", "a", 10));
        t.append(Message::placeholder(10));
        t.append(msg("b", "b", 5));

        t.restore_order();

        assert_eq!(&contents(&t)[..2], &["b", "a"]);
        assert!(t.last().unwrap().is_placeholder());
        assert_eq!(t.placeholder_index(), Some(2));
    }

    #[test]
    fn test_restore_order_keeps_equal_timestamps_in_place() {
        let mut t = Transcript::new();
        t.append(msg("x", "x", 7));
        t.append(msg("y", "y", 7));
        t.restore_order();
        assert_eq!(contents(&t), vec!["x", "y"]);
    }

    #[test]
    fn test_update_and_index_tracking() {
        let mut t = Transcript::new();
        t.append(Message::placeholder(3));
        assert!(t.find_by_record_id("m1").is_none());

        t.update(0, |m| m.record_id = Some("m1".to_string()));
        assert_eq!(t.find_by_record_id("m1"), Some(0));

        let removed = t.remove_at(0).unwrap();
        assert!(removed.is_placeholder());
        assert!(t.find_by_record_id("m1").is_none());
    }

    #[test]
    fn test_prepend_all() {
        let mut t = Transcript::new();
        t.append(msg("c", "c", 30));
        t.prepend_all(vec![msg("a", "a", 10), msg("b", "b", 20)]);
        assert_eq!(contents(&t), vec!["a", "b", "c"]);
        assert_eq!(t.find_by_record_id("c"), Some(2));
    }

    #[test]
    fn test_replace_out_of_range_returns_message() {
        let mut t = Transcript::new();
        let back = t.replace_at(4, msg("a", "a", 1));
        assert_eq!(back.content, "a");
        assert!(t.is_empty());
    }
}
