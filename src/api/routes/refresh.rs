use axum::extract::State;
use axum::Json;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::sync::{SyncState, UpdateResult};

/// Run one incremental update. Rejected while another pass is running.
pub async fn refresh(State(state): State<AppState>) -> Result<Json<UpdateResult>, ApiError> {
    Ok(Json(state.updater.trigger().await?))
}

pub async fn status(State(state): State<AppState>) -> Json<SyncState> {
    Json(state.updater.state().await)
}
