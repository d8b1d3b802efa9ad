use crate::message::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bidirectional socket channel vocabulary for a conversation.
///
/// A remote `message` event implicitly ends that sender's typing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "event", content = "data")]
pub enum SocketEvent {
    Typing {
        #[serde(rename = "conversationId")]
        conversation_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    StopTyping {
        #[serde(rename = "conversationId")]
        conversation_id: String,
        #[serde(rename = "userId")]
        user_id: String,
    },
    Message(Message),
    MessageRead {
        #[serde(rename = "messageId")]
        message_id: String,
    },
}

/// State reported by the external circuit breaker oracle. Consulted, never
/// mutated, by the polling scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStatus {
    pub state: BreakerState,
    #[serde(default)]
    pub reset_eta: Option<DateTime<Utc>>,
}

impl BreakerStatus {
    #[must_use]
    pub fn closed() -> Self {
        Self {
            state: BreakerState::Closed,
            reset_eta: None,
        }
    }

    #[must_use]
    pub fn open(reset_eta: Option<DateTime<Utc>>) -> Self {
        Self {
            state: BreakerState::Open,
            reset_eta,
        }
    }

    /// Backend calls should currently be attempted unless the breaker is
    /// fully open.
    #[must_use]
    pub fn allows_fetch(&self) -> bool {
        self.state != BreakerState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_event_wire_names() {
        let ev = SocketEvent::StopTyping {
            conversation_id: "c1".into(),
            user_id: "u1".into(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"stop-typing\""));
        assert!(json.contains("\"conversationId\""));
    }

    #[test]
    fn breaker_state_wire_names() {
        let status = BreakerStatus::open(None);
        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains("\"OPEN\""));

        let parsed: BreakerStatus = serde_json::from_str(r#"{"state":"HALF_OPEN"}"#).unwrap();
        assert_eq!(parsed.state, BreakerState::HalfOpen);
        assert!(parsed.allows_fetch());
    }
}
