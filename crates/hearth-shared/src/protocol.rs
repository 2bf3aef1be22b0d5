use serde::{Deserialize, Serialize};

use crate::api::ApiMessage;
use crate::types::{Credential, UserId};

/// Frames the client emits on the realtime channel.
///
/// Every frame is a JSON object `{ "event": <name>, "data": <payload> }`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on every (re)connection.
    Setup(Credential),
    SendMessage(OutgoingMessage),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub from: UserId,
    pub to: UserId,
    pub message: String,
}

/// Frames the server pushes to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Acknowledges `setup`.
    Connected,
    ReceiveMessage(ApiMessage),
}

/// Subscription key for inbound frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connected,
    ReceiveMessage,
}

impl ServerFrame {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Connected => EventKind::Connected,
            Self::ReceiveMessage(_) => EventKind::ReceiveMessage,
        }
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

impl ClientFrame {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiUserRef;

    #[test]
    fn test_setup_frame_shape() {
        let frame = ClientFrame::Setup(Credential::new("tok"));
        let json: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["event"], "setup");
        assert_eq!(json["data"], "tok");
    }

    #[test]
    fn test_send_message_frame_shape() {
        let frame = ClientFrame::SendMessage(OutgoingMessage {
            from: UserId::new("me"),
            to: UserId::new("p42"),
            message: "hello".into(),
        });
        let json: serde_json::Value = serde_json::from_str(&frame.encode().unwrap()).unwrap();
        assert_eq!(json["event"], "send_message");
        assert_eq!(json["data"]["to"], "p42");
        assert_eq!(json["data"]["message"], "hello");
    }

    #[test]
    fn test_decode_receive_message() {
        let text = r#"{"event":"receive_message","data":{
            "_id":"m9","content":"hi",
            "sender":{"_id":"p42"},"receiver":{"_id":"me"},
            "createdAt":"2025-12-01T11:00:00Z"}}"#;
        let frame = ServerFrame::decode(text).unwrap();
        assert_eq!(frame.kind(), EventKind::ReceiveMessage);
        match frame {
            ServerFrame::ReceiveMessage(m) => {
                assert_eq!(m.sender, ApiUserRef { id: "p42".into(), name: None });
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_decode_connected_without_payload() {
        let frame = ServerFrame::decode(r#"{"event":"connected"}"#).unwrap();
        assert_eq!(frame, ServerFrame::Connected);
    }

    #[test]
    fn test_decode_unknown_event_fails() {
        assert!(ServerFrame::decode(r#"{"event":"typing","data":{}}"#).is_err());
    }
}
