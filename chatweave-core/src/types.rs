//! Core domain types for chatweave
//!
//! These types describe the transcript the engine maintains and the
//! side-channel payloads attached to its messages.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Transcript** | Ordered, deduplicated sequence of [`Message`]s shown to a user |
//! | **Record id** | Server-assigned stable identity of a message |
//! | **Request id** | Client-assigned correlation key of an outbound question |
//! | **Placeholder** | Synthetic "awaiting answer" entry, always last while pending |
//! | **Citation tag** | Offset-anchored reference rendered as an inline marker |
//! | **Procedure** | One step of an agent's reasoning trace |

use serde::{Deserialize, Deserializer, Serialize};

// ============================================
// Messages
// ============================================

/// The transcript's unit.
///
/// A message is created by the reconciler, mutated in place by later events
/// carrying the same identity, and only ever removed by deduplication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned identity; absent until the server acknowledges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    /// Client correlation key, only set on outbound questions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Record id of the question an answer belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_record_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default)]
    pub is_from_self: bool,
    #[serde(default)]
    pub content: String,
    /// Logical ordering key in milliseconds
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub is_final: bool,
    /// Outbound question still waiting for the server's acknowledgment
    #[serde(default)]
    pub is_loading: bool,
    /// Synthetic "thinking" placeholder
    #[serde(default)]
    pub loading_message: bool,
    /// Progress text shown on the placeholder
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loading_text: Option<String>,
    /// Acknowledgment timed out
    #[serde(default)]
    pub failed: bool,
    /// Content was flagged as policy-violating
    #[serde(default)]
    pub is_evil: bool,
    #[serde(default)]
    pub can_rating: bool,
    /// Loaded from backfill; no regenerate/stop affordances
    #[serde(default)]
    pub is_history: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Vec<Reference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_msg: Option<TokenStat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_thought: Option<AgentThought>,
    /// Human handoff flags; `None` means "not stated by this event"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_robot: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quit: Option<bool>,
    /// Rating receipt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reasons: Vec<String>,
}

impl Message {
    /// A locally originated question awaiting acknowledgment.
    ///
    /// Questions never stream, so they are final from the start.
    pub fn question(
        request_id: impl Into<String>,
        content: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            request_id: Some(request_id.into()),
            content: content.into(),
            is_from_self: true,
            timestamp,
            is_final: true,
            is_loading: true,
            ..Default::default()
        }
    }

    /// The synthetic placeholder inserted after an acknowledged question.
    pub fn placeholder(timestamp: i64) -> Self {
        Self {
            loading_message: true,
            timestamp,
            ..Default::default()
        }
    }

    /// Returns true if this entry is the pending-answer placeholder
    pub fn is_placeholder(&self) -> bool {
        self.loading_message
    }

    /// Returns true if the record id equals `id`
    pub fn has_record_id(&self, id: &str) -> bool {
        self.record_id.as_deref() == Some(id)
    }

    /// Returns true if a human agent has taken over this conversation
    pub fn is_transferred(&self) -> bool {
        self.transfer.unwrap_or(false)
    }
}

// ============================================
// References and citations
// ============================================

/// A citation source attached to a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    /// Reference identifier; numeric ids are normalized to strings
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: String,
    /// Source type; type 1 entries are never attached to messages
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<i64>,
    /// Ordinal used by search references in thought traces
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Remaining source metadata, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An offset-anchored citation: `position` is a character offset into the
/// content, `index` the reference ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteInfo {
    pub position: usize,
    pub index: i64,
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number id, got {}",
            other
        ))),
    }
}

// ============================================
// Side-channel payloads
// ============================================

/// A token-usage snapshot (`token_stat` event).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenStat {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub record_id: String,
    #[serde(default)]
    pub procedures: Vec<TokenProcedure>,
    /// Usage counters and other fields, kept verbatim
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A progress step reported alongside token usage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenProcedure {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// An agent reasoning trace (`thought` event).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentThought {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub record_id: String,
    #[serde(default)]
    pub procedures: Vec<Procedure>,
}

/// One step of an agent's reasoning trace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Procedure {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debugging: Option<Debugging>,
    /// Filled in by the procedure classifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_type: Option<ShowType>,
    /// Filled in by the procedure classifier
    #[serde(default)]
    pub display_content: String,
}

/// Raw debugging payload of a procedure step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Debugging {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_type: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_content: Option<String>,
    #[serde(default)]
    pub quote_infos: Vec<QuoteInfo>,
    #[serde(default)]
    pub references: Vec<Reference>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// How a procedure step is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShowType {
    /// Prose (markdown)
    #[serde(rename = "md")]
    Markdown,
    /// Web search results with inline citation markers
    SearchReference,
    /// Knowledge base (QA/doc) results, rendered raw
    KnowledgeReference,
    /// Fallback structured rendering
    Json,
}

impl ShowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShowType::Markdown => "md",
            ShowType::SearchReference => "search-reference",
            ShowType::KnowledgeReference => "knowledge-reference",
            ShowType::Json => "json",
        }
    }
}

impl std::fmt::Display for ShowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
