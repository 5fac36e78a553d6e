//! `GET /health`

use crate::api::AppState;
use crate::health::Status;
use axum::Json;
use axum::extract::State;

pub async fn get_health(State(state): State<AppState>) -> Json<Status> {
    Json(state.health.get_status())
}
