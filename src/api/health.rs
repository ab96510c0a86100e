use crate::api::{AppState, error::ApiError};
use axum::{Json, extract::State};
use serde_json::{Value, json};

/// `GET /health`: ok once the store answers a ping.
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.db.ping().await.map_err(crate::errors::Error::from)?;
    Ok(Json(json!({ "status": "ok" })))
}
