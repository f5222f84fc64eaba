//! Push Routes
//!
//! Endpoints that inject server-side messages into the hub.
//!
//! - POST /api/v1/broadcast - Every connected client
//! - POST /api/v1/push - Clients of one user

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::api::dto::{AcceptedResponse, BroadcastRequest, PushRequest};
use crate::api::error::ApiResult;
use crate::api::state::AppState;

/// POST /api/v1/broadcast
///
/// Delivery is best effort; no per-client result is reported.
pub async fn broadcast(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BroadcastRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    state.hub.broadcast(&req.envelope()).await?;

    tracing::debug!(bytes = req.content.len(), "Broadcast accepted");
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::accepted())))
}

/// POST /api/v1/push
///
/// A user with no connected client is not an error.
pub async fn push(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PushRequest>,
) -> ApiResult<(StatusCode, Json<AcceptedResponse>)> {
    state.hub.send_to(req.user_id, &req.envelope()).await?;

    tracing::debug!(user_id = req.user_id, "Push accepted");
    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::accepted())))
}
