//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use serde::{Deserialize, Serialize};

use crate::websocket::Envelope;

/// Broadcast request: fan out to every connected client
#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    /// Message payload
    pub content: String,
    /// Sender label, empty for server messages
    #[serde(default)]
    pub sender: String,
    /// Advisory recipient, not used for routing
    #[serde(default)]
    pub recipient: String,
}

impl BroadcastRequest {
    pub fn envelope(&self) -> Envelope {
        Envelope::from_client(self.sender.clone(), self.content.clone())
            .recipient(self.recipient.clone())
    }
}

/// Directed push request: fan out to the clients of one user
#[derive(Debug, Deserialize)]
pub struct PushRequest {
    /// Target user id
    pub user_id: i64,
    /// Message payload
    pub content: String,
    /// Sender label, empty for server messages
    #[serde(default)]
    pub sender: String,
    /// Advisory recipient, not used for routing
    #[serde(default)]
    pub recipient: String,
}

impl PushRequest {
    pub fn envelope(&self) -> Envelope {
        Envelope::from_client(self.sender.clone(), self.content.clone())
            .recipient(self.recipient.clone())
    }
}

/// Response for accepted fan-out requests
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    /// Status: "accepted"
    pub status: String,
}

impl AcceptedResponse {
    pub fn accepted() -> Self {
        Self {
            status: "accepted".to_string(),
        }
    }
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: healthy, unhealthy
    pub status: String,
    /// Hub loop status: ok, error
    pub hub: String,
    /// Number of connected clients
    pub clients: usize,
    /// Server uptime in seconds
    pub uptime_seconds: u64,
    /// Server version
    pub version: String,
}
