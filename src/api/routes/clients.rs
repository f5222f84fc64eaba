//! Client Routes
//!
//! - GET /api/v1/clients - Registry snapshot
//! - DELETE /api/v1/clients/:id - Close one client

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::state::AppState;
use crate::websocket::HubStats;

/// GET /api/v1/clients
pub async fn list_clients(State(state): State<Arc<AppState>>) -> ApiResult<Json<HubStats>> {
    Ok(Json(state.hub.stats().await?))
}

/// DELETE /api/v1/clients/:id
///
/// Idempotent: closing an unknown or already closed client also succeeds.
pub async fn disconnect_client(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.hub.disconnect(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
