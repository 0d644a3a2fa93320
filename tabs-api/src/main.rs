use std::{net::SocketAddr, sync::Arc, time::Duration};

use page_fetch::{PageClient, ScreenshotClient};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    app_state::{AppState, DynSearchService, Enrichment},
    config::Settings,
    domain::{
        enrichment::{
            providers::GeminiAssistant, Assistant, BatchOrchestrator, EnrichmentPipeline,
            EnrichmentWorker, Providers,
        },
        search::{
            embedder::GeminiEmbedder, repository::PgSearchRepository, Embedder, EmbeddingCache,
            SearchRepository, SearchService,
        },
    },
    repositories::{MemoryTabStore, TabRepository, TabRepositoryImpl},
};

mod app_state;
mod config;
mod domain;
mod repositories;
mod router;
mod routes;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::from_filename("./tabs-api/.env.local").ok();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tabs_api=debug,tower_http=info".into()),
        )
        .with(fmt::layer().with_timer(fmt::time::LocalTime::rfc_3339()))
        .init();

    let settings = config::read_config()?;

    let (tabs, index) = storage(&settings).await?;
    let embedder: Option<Arc<dyn Embedder>> =
        GeminiEmbedder::try_from_env(&settings.providers.embedding_model)
            .map(|e| Arc::new(e) as Arc<dyn Embedder>);
    if embedder.is_none() {
        tracing::warn!("GEMINI_API_KEY not set, search and enrichment are disabled");
    }

    let search_service = embedder.clone().map(|embedder| -> DynSearchService {
        let cache = Arc::new(EmbeddingCache::new(
            settings.search.embedding_cache_capacity,
            settings.search.cache_ttl(),
        ));
        SearchService::new(embedder, index.clone(), cache, settings.search.search_config())
    });

    let enrichment = match embedder {
        Some(embedder) => enrichment(&settings, tabs, embedder)?,
        None => None,
    };

    let app = router::create(AppState::new(search_service, enrichment));

    let addr: SocketAddr = format!("{}:{}", settings.application.host, settings.application.port)
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Postgres when configured, otherwise one in-memory store serving both sides.
async fn storage(
    settings: &Settings,
) -> Result<(Arc<dyn TabRepository>, Arc<dyn SearchRepository>), Box<dyn std::error::Error>> {
    let Some(database) = &settings.database else {
        tracing::warn!("no database configured, tabs are kept in memory");
        let store = MemoryTabStore::new();
        return Ok((Arc::new(store.clone()), Arc::new(store)));
    };

    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(database.with_db())
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!(host = %database.host, db = %database.database_name, "connected to database");

    Ok((
        Arc::new(TabRepositoryImpl::new(pool.clone())),
        Arc::new(PgSearchRepository::new(pool)),
    ))
}

fn enrichment(
    settings: &Settings,
    tabs: Arc<dyn TabRepository>,
    embedder: Arc<dyn Embedder>,
) -> Result<Option<Enrichment>, Box<dyn std::error::Error>> {
    let Some(endpoint) = &settings.providers.screenshot_endpoint else {
        tracing::warn!("no screenshot endpoint configured, enrichment is disabled");
        return Ok(None);
    };
    let Some(assistant) = GeminiAssistant::try_from_env(&settings.providers.chat_model) else {
        return Ok(None);
    };

    let pipeline_config = settings.enrichment.pipeline_config();
    let pages = PageClient::new(
        pipeline_config.fetch_timeout,
        settings.enrichment.content_max_chars,
    )?;
    let screenshots = ScreenshotClient::new(endpoint.clone(), pipeline_config.provider_timeout)?;

    let assistant: Arc<dyn Assistant> = Arc::new(assistant);
    let pipeline = EnrichmentPipeline::new(
        tabs,
        Providers {
            screenshots: Arc::new(screenshots),
            content: Arc::new(pages),
            assistant,
            embedder,
        },
        pipeline_config,
    );

    let orchestrator = BatchOrchestrator::new(Arc::new(pipeline), settings.enrichment.batch_config());
    let worker = EnrichmentWorker::spawn(
        orchestrator.clone(),
        settings.enrichment.worker_concurrency,
        settings.enrichment.queue_capacity,
    );

    Ok(Some(Enrichment {
        orchestrator,
        worker,
    }))
}
