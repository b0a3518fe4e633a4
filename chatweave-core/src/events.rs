//! Inbound and outbound event shapes
//!
//! The transport (socket frames, HTTP polling) is not our concern: callers
//! decode whatever arrives into an [`InboundEvent`] and hand it to the engine,
//! and forward every [`OutboundEvent`] the engine produces.

use serde::{Deserialize, Serialize};

use crate::types::{AgentThought, Message, QuoteInfo, Reference, TokenStat};

/// An event pushed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Answer fragment, question acknowledgment or handoff notice
    Reply(ReplyEvent),
    /// Citation sources for a message
    Reference(ReferenceEvent),
    /// Like/dislike receipt
    Rating(RatingEvent),
    /// Token usage snapshot
    TokenStat(TokenStat),
    /// Agent reasoning trace
    Thought(AgentThought),
    /// Page of older messages
    History(HistoryPage),
}

impl InboundEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            InboundEvent::Reply(_) => "reply",
            InboundEvent::Reference(_) => "reference",
            InboundEvent::Rating(_) => "rating",
            InboundEvent::TokenStat(_) => "token_stat",
            InboundEvent::Thought(_) => "thought",
            InboundEvent::History(_) => "history",
        }
    }
}

/// A `reply` event: a full message snapshot plus optional raw citation tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyEvent {
    #[serde(flatten)]
    pub message: Message,
    /// Raw citation tags; annotated into the content before merging
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub quote_infos: Vec<QuoteInfo>,
}

impl From<Message> for ReplyEvent {
    fn from(message: Message) -> Self {
        Self {
            message,
            quote_infos: Vec::new(),
        }
    }
}

/// A `reference` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceEvent {
    pub record_id: String,
    #[serde(default)]
    pub references: Vec<Reference>,
}

/// A `rating` event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RatingEvent {
    pub record_id: String,
    pub score: i64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// A backfill page, ordered oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// An event the engine asks the transport to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundEvent {
    Send {
        request_id: String,
        session_id: String,
        content: String,
    },
    StopGeneration {
        record_id: String,
    },
}

/// Which kind of event caused a transcript change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Question,
    Answer,
    History,
    Reference,
    Feedback,
    Stop,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Question => "QUESTION",
            ChangeKind::Answer => "ANSWER",
            ChangeKind::History => "HISTORY",
            ChangeKind::Reference => "REFERENCE",
            ChangeKind::Feedback => "FEEDBACK",
            ChangeKind::Stop => "STOP",
        }
    }
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}
