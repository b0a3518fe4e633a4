//! Backfilling older messages

use super::Reconciler;
use crate::events::ChangeKind;
use crate::types::Message;

impl Reconciler {
    /// Merge a page of history (oldest first) into the transcript.
    ///
    /// A page entirely older than the transcript is prepended as a block;
    /// otherwise each message is merged on its own. History never supersedes
    /// the placeholder, and re-applying a page is a no-op.
    pub fn apply_history(&mut self, mut page: Vec<Message>) {
        if page.is_empty() {
            return;
        }
        for message in &mut page {
            message.is_history = true;
            message.is_final = true;
        }

        let newest = page.iter().map(|m| m.timestamp).max().unwrap_or_default();
        let oldest_existing = self.transcript.first().map(|m| m.timestamp);

        match oldest_existing {
            None => {
                tracing::debug!(count = page.len(), "Loaded initial history page");
                self.transcript.replace_all(page);
            }
            Some(oldest) if newest < oldest => {
                tracing::debug!(count = page.len(), "Prepending history page");
                self.transcript.prepend_all(page);
            }
            Some(_) => {
                tracing::debug!(count = page.len(), "Merging overlapping history page");
                for message in page {
                    self.merge_history_message(message);
                }
            }
        }

        self.finish(ChangeKind::History);
    }

    fn merge_history_message(&mut self, message: Message) {
        if let Some(index) = message
            .record_id
            .as_deref()
            .and_then(|id| self.transcript.find_by_record_id(id))
        {
            self.transcript.replace_at(index, message);
            return;
        }

        match self.transcript.rposition(|m| m.timestamp <= message.timestamp) {
            Some(index) if self.transcript.get(index).is_some_and(Message::is_placeholder) => {
                self.transcript.insert_at(index, message);
            }
            Some(index) => self.transcript.insert_at(index + 1, message),
            None => self.transcript.insert_at(0, message),
        }
    }
}
