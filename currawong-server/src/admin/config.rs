use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::http::HttpError;
use crate::store::runtime_config::{self, RuntimeServerConfig};
use crate::ServerState;

pub async fn get_runtime_config(State(state): State<ServerState>) -> Json<RuntimeServerConfig> {
    Json(runtime_config::fetch_runtime_config(&state.pool).await)
}

pub async fn update_runtime_config(
    State(state): State<ServerState>,
    Json(config): Json<RuntimeServerConfig>,
) -> Result<StatusCode, HttpError> {
    runtime_config::update_runtime_config(&state.pool, &config)
        .await
        .map_err(HttpError::internal().err())?;
    Ok(StatusCode::NO_CONTENT)
}
