use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::cache::{CacheStats, RankedArchetype, Served};
use crate::models::{ArchetypeKey, ArchetypeSnapshot};

fn key_from_path((archetype, format): (String, String)) -> ArchetypeKey {
    ArchetypeKey::new(archetype.trim().to_lowercase(), format.trim())
}

/// Cached archetypes ranked by power index. Never collects.
pub async fn list_ranking(State(state): State<AppState>) -> Json<Vec<RankedArchetype>> {
    Json(state.cache.ranking().await)
}

/// Full analysis. Falls back to the last known analysis, flagged stale,
/// when the source cannot be reached.
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(path): Path<(String, String)>,
) -> Result<Json<Served>, ApiError> {
    let key = key_from_path(path);
    Ok(Json(state.cache.get_or_stale(&key).await?))
}

/// Card usage only.
pub async fn get_cards(
    State(state): State<AppState>,
    Path(path): Path<(String, String)>,
) -> Result<Json<ArchetypeSnapshot>, ApiError> {
    let key = key_from_path(path);
    Ok(Json(state.cache.get_snapshot(&key).await?))
}

pub async fn invalidate(
    State(state): State<AppState>,
    Path(path): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    let key = key_from_path(path);
    if state.cache.invalidate(&key).await {
        info!("Invalidated {} via API", key);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("{} is not cached", key)))
    }
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats().await)
}
