//! Hubcast HTTP API
//!
//! HTTP layer around the hub, built with Axum. Handlers never touch hub
//! state; they only submit events through the [`Hub`](crate::websocket::Hub)
//! handle held in [`AppState`].
//!
//! # Endpoints
//!
//! ## WebSocket
//! - `GET /ws` - Upgrade to a hub client (path configurable)
//!
//! ## Messages
//! - `POST /api/v1/broadcast` - Send to every connected client
//! - `POST /api/v1/push` - Send to the clients of one user
//!
//! ## Clients
//! - `GET /api/v1/clients` - List connected clients
//! - `DELETE /api/v1/clients/:id` - Close a client
//!
//! ## Health
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe
//! - `GET /health` - Full health status
//!
//! # Example
//!
//! ```rust,ignore
//! use hubcast::api::{serve, AppState};
//! use hubcast::config::ServerConfig;
//! use hubcast::websocket::{Hub, HubConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (hub, _hub_task) = Hub::start(HubConfig::default());
//!     let config = ServerConfig::default();
//!
//!     serve(AppState::new(hub, config.clone()), &config).await?;
//!     Ok(())
//! }
//! ```

pub mod dto;
pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::{
    http::HeaderValue,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::websocket::websocket_handler;

/// Build the API router with all routes and middleware
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Message routes
        .route("/broadcast", post(routes::push::broadcast))
        .route("/push", post(routes::push::push))
        // Client routes
        .route("/clients", get(routes::clients::list_clients))
        .route("/clients/:id", delete(routes::clients::disconnect_client));

    let health_routes = Router::new()
        .route("/live", get(routes::health::liveness))
        .route("/ready", get(routes::health::readiness))
        .route("/", get(routes::health::full_health));

    let cors = cors_layer(&state.config);
    let ws_path = state.config.ws_path.clone();
    let shared_state = Arc::new(state);

    Router::new()
        .route(&ws_path, get(websocket_handler))
        .nest("/api/v1", api_routes)
        .nest("/health", health_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(shared_state)
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Start the API server
///
/// Stops accepting requests on ctrl-c or SIGTERM. Connected clients are
/// not drained; the hub has no shutdown procedure.
pub async fn serve(state: AppState, config: &ServerConfig) -> Result<(), ApiError> {
    let router = build_router(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Hubcast listening on {} (WebSocket path {})", addr, config.ws_path);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ApiError::Internal(format!("Server error: {}", e)))?;

    tracing::info!("Hubcast HTTP server shut down");
    Ok(())
}

/// Wait for shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::websocket::{memory, Client, Envelope, Hub, HubConfig};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn test_hub() -> Hub {
        let config = HubConfig {
            heartbeat_interval_ms: 0,
            announce_presence: false,
            ..Default::default()
        };
        Hub::start(config).0
    }

    fn create_test_app(hub: Hub) -> Router {
        build_router(AppState::new(hub, ServerConfig::default()))
    }

    fn post_json(uri: &str, body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_live() {
        let app = create_test_app(test_hub());
        let response = app.oneshot(get("/health/live")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready() {
        let app = create_test_app(test_hub());
        let response = app.oneshot(get("/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_ready_without_hub_loop() {
        let (hub, task) = Hub::start(HubConfig::default());
        task.abort();
        let _ = task.await;

        let app = create_test_app(hub);
        let response = app.oneshot(get("/health/ready")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_health_full() {
        let app = create_test_app(test_hub());
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_broadcast_accepted() {
        let app = create_test_app(test_hub());
        let response = app
            .oneshot(post_json("/api/v1/broadcast", r#"{"content": "hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_broadcast_invalid_json() {
        let app = create_test_app(test_hub());
        let response = app
            .oneshot(post_json("/api/v1/broadcast", "not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_broadcast_hub_gone() {
        let (hub, task) = Hub::start(HubConfig::default());
        task.abort();
        let _ = task.await;

        let app = create_test_app(hub);
        let response = app
            .oneshot(post_json("/api/v1/broadcast", r#"{"content": "hello"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_push_reaches_matching_user() {
        let hub = test_hub();
        let (conn, mut peer) = memory::pair();
        hub.register(Client::new(7, conn)).await.unwrap();

        let app = create_test_app(hub.clone());
        let response = app
            .oneshot(post_json(
                "/api/v1/push",
                r#"{"user_id": 7, "content": "for you", "recipient": "7"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let envelope = Envelope::decode(&peer.next_text().await.unwrap()).unwrap();
        assert_eq!(envelope.content, "for you");
        assert_eq!(envelope.recipient, "7");
        assert_eq!(envelope.sender, "");
        assert_eq!(hub.client_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_push_to_absent_user_accepted() {
        let hub = test_hub();
        let app = create_test_app(hub.clone());
        let response = app
            .oneshot(post_json("/api/v1/push", r#"{"user_id": 999, "content": "x"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(hub.client_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_list_clients() {
        let hub = test_hub();
        let (conn, _peer) = memory::pair();
        hub.register(Client::new(3, conn)).await.unwrap();

        let app = create_test_app(hub);
        let response = app.oneshot(get("/api/v1/clients")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["client_count"], 1);
        assert_eq!(json["clients"][0]["user_id"], 3);
    }

    #[tokio::test]
    async fn test_disconnect_client() {
        let hub = test_hub();
        let (conn, _peer) = memory::pair();
        let client = Client::new(3, conn);
        let uri = format!("/api/v1/clients/{}", client.id());
        hub.register(client).await.unwrap();

        let app = create_test_app(hub.clone());
        let response = app
            .oneshot(
                Request::builder()
                    .method("DELETE")
                    .uri(uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(hub.client_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_websocket_requires_upgrade() {
        let hub = test_hub();
        let app = create_test_app(hub.clone());
        let response = app.oneshot(get("/ws")).await.unwrap();

        assert!(response.status().is_client_error());
        assert_eq!(hub.client_count().await.unwrap(), 0);
    }
}
