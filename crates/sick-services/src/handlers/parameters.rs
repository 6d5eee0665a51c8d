//! Parameter registry view

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use sick_core::ParamValue;

use crate::state::ServiceState;

/// GET /parameters
pub async fn list_parameters(
    State(state): State<ServiceState>,
) -> Json<BTreeMap<String, ParamValue>> {
    Json(state.registry.snapshot())
}
