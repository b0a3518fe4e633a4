//! Change notifications
//!
//! Observers register against a [`Notifier`] and receive typed callbacks after
//! every reconciliation step. The transcript is handed out as a read-only
//! slice; [`ChannelObserver`] turns callbacks into owned [`Notification`]s for
//! consumers living on another task.

use tokio::sync::mpsc;

use crate::events::ChangeKind;
use crate::session::BotInfo;
use crate::types::{Message, TokenStat};

/// Receives engine notifications. Every method has a no-op default.
pub trait Observer: Send {
    fn config_changed(&mut self, _bot: &BotInfo) {}

    fn transcript_changed(&mut self, _messages: &[Message], _kind: ChangeKind) {}

    fn token_state_changed(&mut self, _stat: &TokenStat) {}
}

/// Owned form of a notification
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    ConfigChange(BotInfo),
    TranscriptChange {
        messages: Vec<Message>,
        kind: ChangeKind,
    },
    TokenStateChange(TokenStat),
}

/// Forwards notifications over an unbounded channel
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelObserver {
    pub fn new(tx: mpsc::UnboundedSender<Notification>) -> Self {
        Self { tx }
    }
}

impl Observer for ChannelObserver {
    fn config_changed(&mut self, bot: &BotInfo) {
        let _ = self.tx.send(Notification::ConfigChange(bot.clone()));
    }

    fn transcript_changed(&mut self, messages: &[Message], kind: ChangeKind) {
        let _ = self.tx.send(Notification::TranscriptChange {
            messages: messages.to_vec(),
            kind,
        });
    }

    fn token_state_changed(&mut self, stat: &TokenStat) {
        let _ = self.tx.send(Notification::TokenStateChange(stat.clone()));
    }
}

/// Fans notifications out to registered observers
#[derive(Default)]
pub struct Notifier {
    observers: Vec<Box<dyn Observer>>,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Box<dyn Observer>) {
        self.observers.push(observer);
    }

    /// Register a [`ChannelObserver`] and return its receiver.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.register(Box::new(ChannelObserver::new(tx)));
        rx
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn config_changed(&mut self, bot: &BotInfo) {
        for observer in &mut self.observers {
            observer.config_changed(bot);
        }
    }

    pub fn transcript_changed(&mut self, messages: &[Message], kind: ChangeKind) {
        tracing::trace!(kind = %kind, len = messages.len(), "Transcript changed");
        for observer in &mut self.observers {
            observer.transcript_changed(messages, kind);
        }
    }

    pub fn token_state_changed(&mut self, stat: &TokenStat) {
        for observer in &mut self.observers {
            observer.token_state_changed(stat);
        }
    }
}
