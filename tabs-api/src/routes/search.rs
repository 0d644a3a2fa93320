use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::instrument;

use super::ApiError;
use crate::{
    domain::{
        models::OwnerId,
        search::{CacheStats, SearchResponse, SearchWeights},
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(search))
        .route("/cache-stats", get(cache_stats))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchQuery {
    #[serde(default)]
    q: String,
    owner_id: OwnerId,
    limit: Option<usize>,
    /// Single slider in `[0, 2]`, 0 is keyword only and 2 semantic only
    weight: Option<f64>,
    vector_weight: Option<f64>,
    text_weight: Option<f64>,
}

impl SearchQuery {
    fn weights(&self) -> SearchWeights {
        match (self.vector_weight, self.text_weight) {
            (None, None) => self
                .weight
                .map(SearchWeights::from_blend)
                .unwrap_or_default(),
            (vector, text) => SearchWeights {
                vector: non_negative(vector),
                text: non_negative(text),
            },
        }
    }
}

fn non_negative(weight: Option<f64>) -> f64 {
    match weight {
        Some(w) if w.is_finite() => w.max(0.0),
        _ => 1.0,
    }
}

#[instrument(name = "GET /search", skip(app_state))]
async fn search(
    State(app_state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResponse>, ApiError> {
    let search_service = app_state.search_service()?;

    let response = search_service
        .search(&query.q, &query.owner_id, query.limit, query.weights())
        .await?;

    Ok(Json(response))
}

#[instrument(name = "GET /search/cache-stats", skip(app_state))]
async fn cache_stats(State(app_state): State<AppState>) -> Result<Json<CacheStats>, ApiError> {
    let search_service = app_state.search_service()?;
    Ok(Json(search_service.cache_stats().await))
}
