//! WebSocket Handler
//!
//! Handles WebSocket upgrade requests and hands the upgraded connection
//! to the hub as a new client.

use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::HeaderMap,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use super::client::Client;
use super::connection::Connection;
use crate::api::AppState;

/// Header carrying the caller's user id
pub const USER_ID_HEADER: &str = "user_id";

/// Query parameters accepted on the upgrade request
#[derive(Debug, Default, Deserialize)]
pub struct UpgradeParams {
    pub user_id: Option<String>,
}

/// WebSocket upgrade handler
///
/// This is the entry point for WebSocket connections. A failed handshake
/// is rejected by the `WebSocketUpgrade` extractor before any client
/// exists.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    Query(params): Query<UpgradeParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let user_id = resolve_user_id(&headers, &params);
    let hub = state.hub.clone();

    ws.on_upgrade(move |socket| async move {
        let client = Client::new(user_id, Connection::from_websocket(socket));
        let client_id = client.id().to_string();
        tracing::debug!(client_id = %client_id, user_id = client.user_id(), "WebSocket upgraded");

        if let Err(e) = hub.register(client).await {
            tracing::error!(client_id = %client_id, error = %e, "Failed to register client");
        }
    })
}

/// Identity from the `user_id` header, then the query string; 0 when
/// absent or unparseable
pub fn resolve_user_id(headers: &HeaderMap, params: &UpgradeParams) -> i64 {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(params.user_id.as_deref())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_user_id_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("42"));
        let params = UpgradeParams {
            user_id: Some("7".to_string()),
        };
        assert_eq!(resolve_user_id(&headers, &params), 42);
    }

    #[test]
    fn test_user_id_from_query() {
        let params = UpgradeParams {
            user_id: Some("7".to_string()),
        };
        assert_eq!(resolve_user_id(&HeaderMap::new(), &params), 7);
    }

    #[test]
    fn test_user_id_defaults_to_zero() {
        assert_eq!(resolve_user_id(&HeaderMap::new(), &UpgradeParams::default()), 0);

        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_static("not-a-number"));
        assert_eq!(resolve_user_id(&headers, &UpgradeParams::default()), 0);
    }
}
