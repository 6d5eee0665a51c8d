//! Health and status handlers

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::ServiceState;

#[derive(Serialize)]
pub struct StatusResponse {
    pub scanner_type: String,
    pub layers: u8,
    /// `A` or `B`
    pub dialect: char,
    pub use_binary_protocol: bool,
    pub scans: u64,
    pub range_min: f64,
    pub range_max: f64,
    pub time_increment: f64,
    pub session_available: bool,
    pub uptime_secs: u64,
}

/// GET /health
pub async fn health() -> &'static str {
    "OK"
}

/// GET /status
pub async fn get_status(State(state): State<ServiceState>) -> Json<StatusResponse> {
    let parser = state.parser.lock();
    Json(StatusResponse {
        scanner_type: parser.scanner_type().to_string(),
        layers: parser.layers(),
        dialect: state.dialect.id(),
        use_binary_protocol: parser.use_binary_protocol(),
        scans: parser.scans(),
        range_min: parser.range_min(),
        range_max: parser.range_max(),
        time_increment: parser.time_increment(),
        session_available: !state.commands.is_closed(),
        uptime_secs: state.uptime().as_secs(),
    })
}
