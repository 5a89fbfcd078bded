//! Application-level control frames exchanged over the log stream

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Control message sent by a client
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    Ping,
}

impl ControlMessage {
    /// Parse a text frame; anything that is not a known control message yields `None`
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }
}

/// Control reply sent by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlReply {
    Pong { time: i64 },
}

impl ControlReply {
    pub fn pong() -> Self {
        ControlReply::Pong {
            time: Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ping() {
        assert_eq!(
            ControlMessage::parse(r#"{"type":"ping"}"#),
            Some(ControlMessage::Ping)
        );
        assert_eq!(
            ControlMessage::parse(r#"{"type":"ping","id":7}"#),
            Some(ControlMessage::Ping)
        );
    }

    #[test]
    fn test_parse_ignores_malformed() {
        assert_eq!(ControlMessage::parse("ping"), None);
        assert_eq!(ControlMessage::parse(r#"{"type":"subscribe"}"#), None);
        assert_eq!(ControlMessage::parse(r#"{"kind":"ping"}"#), None);
    }

    #[test]
    fn test_pong_wire_format() {
        let value = serde_json::to_value(ControlReply::Pong { time: 1_700_000_000 }).unwrap();
        assert_eq!(value, serde_json::json!({"type": "pong", "time": 1_700_000_000}));
    }
}
