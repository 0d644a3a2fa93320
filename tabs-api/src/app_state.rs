use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::domain::{
    enrichment::{BatchOrchestrator, EnrichmentWorker},
    search::{Embedder, SearchRepository, SearchService},
};

pub type DynSearchService = SearchService<Arc<dyn Embedder>, Arc<dyn SearchRepository>>;

#[derive(Debug, thiserror::Error)]
pub enum AppStateError {
    #[error("{0} is not configured")]
    ServiceUnavailable(&'static str),
}

impl IntoResponse for AppStateError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, self.to_string()).into_response()
    }
}

/// Enrichment is either fully wired (providers configured) or absent.
#[derive(Clone)]
pub struct Enrichment {
    pub orchestrator: BatchOrchestrator,
    pub worker: EnrichmentWorker,
}

#[derive(Clone, Default)]
pub struct AppState {
    search_service: Option<Arc<DynSearchService>>,
    enrichment: Option<Enrichment>,
}

impl AppState {
    pub fn new(search_service: Option<DynSearchService>, enrichment: Option<Enrichment>) -> Self {
        Self {
            search_service: search_service.map(Arc::new),
            enrichment,
        }
    }

    pub fn search_service(&self) -> Result<&DynSearchService, AppStateError> {
        self.search_service
            .as_deref()
            .ok_or(AppStateError::ServiceUnavailable("search"))
    }

    pub fn enrichment(&self) -> Result<&Enrichment, AppStateError> {
        self.enrichment
            .as_ref()
            .ok_or(AppStateError::ServiceUnavailable("enrichment"))
    }
}
