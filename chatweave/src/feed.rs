//! Replay feed parsing
//!
//! A feed is JSON Lines: each line is either a server event (tagged by
//! `event`) or a local action (tagged by `action`) standing in for the user
//! or a timer.

use anyhow::{Context, Result};
use chatweave_core::InboundEvent;
use serde::Deserialize;

/// Something the local side did
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LocalAction {
    /// The user asked a question
    Send {
        request_id: String,
        content: String,
        timestamp: i64,
    },
    /// The user pressed "stop generation"
    StopGeneration,
    /// The acknowledgment timer for `request_id` ran out
    Expire { request_id: String },
    /// The welcome delay elapsed
    Welcome { timestamp: i64 },
}

/// One line of a replay feed
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum FeedLine {
    Local(LocalAction),
    Server(InboundEvent),
}

/// Parse a whole feed, skipping blank lines and `#` comments.
pub fn parse_feed(text: &str) -> Result<Vec<FeedLine>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("invalid feed line {}", i + 1))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mixed_feed() {
        let feed = r#"
# user asks
{"action":"send","request_id":"r1","content":"hi","timestamp":1}
{"event":"reply","session_id":"s1","record_id":"m1","content":"hello","timestamp":2}
{"action":"stop_generation"}
"#;
        let lines = parse_feed(feed).unwrap();
        assert_eq!(lines.len(), 3);
        assert!(matches!(lines[0], FeedLine::Local(LocalAction::Send { .. })));
        assert!(matches!(lines[1], FeedLine::Server(InboundEvent::Reply(_))));
        assert_eq!(lines[2], FeedLine::Local(LocalAction::StopGeneration));
    }

    #[test]
    fn test_bad_line_reports_position() {
        let err = parse_feed("{\"action\":\"send\"}\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }
}
