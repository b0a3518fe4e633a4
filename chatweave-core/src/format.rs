//! Formatting helpers for rendering transcripts.

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::error::Result;
use crate::types::Message;

/// Convert a millisecond timestamp to UTC, if representable.
pub fn timestamp_utc(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// Format a millisecond timestamp as local wall-clock time (e.g., "14:03:27").
pub fn format_clock(millis: i64) -> String {
    match timestamp_utc(millis) {
        Some(ts) => ts.with_timezone(&Local).format("%H:%M:%S").to_string(),
        None => "--:--:--".to_string(),
    }
}

/// Short author label for a message
pub fn author(message: &Message) -> &'static str {
    if message.is_placeholder() {
        "..."
    } else if message.is_from_self {
        "you"
    } else {
        "bot"
    }
}

/// Status flags worth showing next to a message, e.g. "[failed]".
pub fn status_tags(message: &Message) -> String {
    let mut tags = Vec::new();
    if message.is_loading {
        tags.push("sending");
    }
    if message.failed {
        tags.push("failed");
    }
    if message.is_evil {
        tags.push("blocked");
    }
    if message.is_history {
        tags.push("history");
    }
    if message.is_transferred() {
        tags.push("handoff");
    }
    if !message.is_final && !message.is_placeholder() && !message.is_from_self {
        tags.push("streaming");
    }
    tags.iter().map(|t| format!("[{}]", t)).collect::<Vec<_>>().join(" ")
}

/// One display line for a message.
pub fn format_line(message: &Message) -> String {
    let body = if message.is_placeholder() {
        message.loading_text.as_deref().unwrap_or_default()
    } else {
        message.content.as_str()
    };
    let tags = status_tags(message);
    let mut line = format!("{} {:>4}: {}", format_clock(message.timestamp), author(message), body);
    if !tags.is_empty() {
        line.push(' ');
        line.push_str(&tags);
    }
    line
}

/// Pretty-printed JSON array of the transcript.
pub fn transcript_json(messages: &[Message]) -> Result<String> {
    Ok(serde_json::to_string_pretty(messages)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_author_labels() {
        assert_eq!(author(&Message::question("r1", "hi", 0)), "you");
        assert_eq!(author(&Message::placeholder(0)), "...");
        assert_eq!(author(&Message::default()), "bot");
    }

    #[test]
    fn test_status_tags() {
        let mut message = Message::question("r1", "hi", 0);
        assert_eq!(status_tags(&message), "[sending]");

        message.is_loading = false;
        message.failed = true;
        assert_eq!(status_tags(&message), "[failed]");

        let streaming = Message {
            content: "par".to_string(),
            ..Default::default()
        };
        assert_eq!(status_tags(&streaming), "[streaming]");
    }

    #[test]
    fn test_placeholder_line_shows_loading_text() {
        let mut placeholder = Message::placeholder(0);
        placeholder.loading_text = Some("Thinking".to_string());
        assert!(format_line(&placeholder).ends_with("...: Thinking"));
    }

    #[test]
    fn test_timestamp_conversion() {
        assert_eq!(timestamp_utc(0).unwrap().timestamp(), 0);
        assert_eq!(format_clock(i64::MAX), "--:--:--");
    }

    #[test]
    fn test_transcript_json_is_an_array_of_messages() {
        let messages = vec![Message::question("r1", "hi", 5), Message::placeholder(6)];
        let json = transcript_json(&messages).unwrap();

        let decoded: Vec<Message> = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, messages);
        assert!(json.contains("\"loading_message\": true"));
    }
}
