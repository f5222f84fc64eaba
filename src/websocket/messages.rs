//! Hub Message Types
//!
//! Defines the envelope carried in every text frame between clients
//! and the hub.

use serde::{Deserialize, Serialize};

/// Notification sent to the other clients when a client is admitted
pub const JOINED_NOTICE: &str = "A new socket has connected.";

/// Notification sent to the remaining clients when a client is removed
pub const LEFT_NOTICE: &str = "A new socket has disconnected.";

/// Wire-level message: one flat JSON object per text frame
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Id of the originating client, empty for server notifications
    #[serde(default)]
    pub sender: String,
    /// Advisory only; fan-out never routes on it
    #[serde(default)]
    pub recipient: String,
    /// Opaque payload
    #[serde(default)]
    pub content: String,
}

impl Envelope {
    /// Create an envelope sent by a client
    pub fn from_client(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            recipient: String::new(),
            content: content.into(),
        }
    }

    /// Create a server-generated notification (empty sender)
    pub fn notice(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Set the advisory recipient
    pub fn recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = recipient.into();
        self
    }

    /// Encode as the JSON text carried by one frame
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Decode from the JSON text of one frame
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_round_trip() {
        let envelope = Envelope::from_client("u1", "hello");
        let json = envelope.encode().unwrap();
        let decoded = Envelope::decode(&json).unwrap();

        assert_eq!(decoded.sender, "u1");
        assert_eq!(decoded.recipient, "");
        assert_eq!(decoded.content, "hello");
    }

    #[test]
    fn test_envelope_wire_shape() {
        let json = Envelope::notice("hi").recipient("u2").encode().unwrap();
        assert_eq!(json, r#"{"sender":"","recipient":"u2","content":"hi"}"#);
    }

    #[test]
    fn test_envelope_missing_fields_default_to_empty() {
        let decoded = Envelope::decode(r#"{"content": "x"}"#).unwrap();
        assert_eq!(decoded, Envelope::notice("x"));
    }

    #[test]
    fn test_envelope_preserves_unicode_content() {
        let envelope = Envelope::from_client("a", "héllo \"wörld\" 👋");
        let decoded = Envelope::decode(&envelope.encode().unwrap()).unwrap();
        assert_eq!(decoded.content, "héllo \"wörld\" 👋");
    }
}
