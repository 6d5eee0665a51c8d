//! Raw SOPAS command pass-through

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::state::ServiceState;

#[derive(Debug, Deserialize)]
pub struct ColaRequest {
    /// SOPAS command text, e.g. `sRN DeviceIdent`
    pub request: String,
}

#[derive(Debug, Serialize)]
pub struct ColaResponse {
    /// Reply payload as text
    pub response: String,
    /// Reply payload as hex
    pub hex: String,
}

/// POST /cola
pub async fn send_cola(
    State(state): State<ServiceState>,
    Json(body): Json<ColaRequest>,
) -> Result<Json<ColaResponse>, ApiError> {
    let command = body.request.trim();
    if command.is_empty() {
        return Err(ApiError::BadRequest("empty request".to_string()));
    }

    info!(command, dialect = %state.dialect, "Forwarding SOPAS command");
    let reply = state
        .commands
        .request(command, state.request_timeout)
        .await?;

    Ok(Json(ColaResponse {
        response: String::from_utf8_lossy(&reply).into_owned(),
        hex: hex::encode(&reply),
    }))
}
