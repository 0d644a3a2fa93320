use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ApiError;
use crate::{
    domain::{
        enrichment::{BatchJob, BatchReport, BatchRequest, Pacing, ProcessType},
        models::{BatchId, OwnerId, TabId},
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(process_batch))
        .route("/background", post(enqueue_batch))
        .route("/:id", get(get_job))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchBody {
    tab_ids: Vec<TabId>,
    owner_id: OwnerId,
    import_batch_id: Option<String>,
    process_type: ProcessType,
    #[serde(default)]
    rate_limited: bool,
}

impl BatchBody {
    fn pacing(&self) -> Pacing {
        if self.rate_limited {
            Pacing::RateLimited
        } else {
            Pacing::None
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchAccepted {
    batch_id: BatchId,
}

#[instrument(
    name = "POST /batch",
    skip(app_state, body),
    fields(tabs = body.tab_ids.len(), import_batch_id = ?body.import_batch_id)
)]
async fn process_batch(
    State(app_state): State<AppState>,
    Json(body): Json<BatchBody>,
) -> Result<Json<BatchReport>, ApiError> {
    let enrichment = app_state.enrichment()?;

    let report = enrichment
        .orchestrator
        .process_batch(&body.tab_ids, &body.owner_id, body.process_type, body.pacing())
        .await?;

    Ok(Json(report))
}

#[instrument(
    name = "POST /batch/background",
    skip(app_state, body),
    fields(tabs = body.tab_ids.len(), import_batch_id = ?body.import_batch_id)
)]
async fn enqueue_batch(
    State(app_state): State<AppState>,
    Json(body): Json<BatchBody>,
) -> Result<(StatusCode, Json<BatchAccepted>), ApiError> {
    let enrichment = app_state.enrichment()?;

    let pacing = body.pacing();
    let handle = enrichment.worker.submit(BatchRequest {
        tab_ids: body.tab_ids,
        owner: body.owner_id,
        process: body.process_type,
        pacing,
        import_batch_id: body.import_batch_id,
    })?;

    Ok((
        StatusCode::ACCEPTED,
        Json(BatchAccepted {
            batch_id: handle.id,
        }),
    ))
}

#[instrument(name = "GET /batch/:id", skip(app_state))]
async fn get_job(
    State(app_state): State<AppState>,
    Path(id): Path<BatchId>,
) -> Result<Json<BatchJob>, ApiError> {
    let enrichment = app_state.enrichment()?;

    enrichment
        .worker
        .job(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("batch {id} not found")))
}
