//! Deterministic cost estimation for AI models, cloud compute, storage,
//! bandwidth and SaaS plans, backed by a JSON price catalog that a scheduled
//! updater refreshes from public pricing APIs.

use std::sync::Arc;

use axum::{Router, routing::get};
use http::StatusCode;
use tower_http::{
    limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod formulas;
pub mod insights;
#[cfg(feature = "server")]
pub mod observability;
pub mod resolvers;
pub mod routes;
pub mod tools;
pub mod updater;

#[cfg(test)]
mod tests;

/// Failures assembling the application from its configuration.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error(transparent)]
    Catalog(#[from] catalog::CatalogError),

    #[error(transparent)]
    Keywords(#[from] classifier::KeywordTableError),

    #[error(transparent)]
    Tools(#[from] tools::ToolError),
}

/// Shared handler state. Cheap to clone.
#[derive(Clone, Debug)]
pub struct AppState {
    pub tools: tools::ToolRegistry,
    /// Present when a catalog data directory is configured.
    pub updater: Option<Arc<updater::UpdateOrchestrator>>,
}

impl AppState {
    /// Load the catalog and keyword table, and wire the classifier, tool
    /// registry and updater together.
    pub fn from_config(
        config: &config::CostwiseConfig,
        http_client: &reqwest::Client,
    ) -> Result<Self, StartupError> {
        let registry = match &config.catalog.data_dir {
            Some(dir) => catalog::CatalogRegistry::load(dir)?,
            None => catalog::CatalogRegistry::embedded()?,
        };

        let table = match &config.classifier.keywords_path {
            Some(path) => classifier::KeywordTable::from_file(path)?,
            None => classifier::KeywordTable::embedded()?,
        };
        let mut task_classifier = classifier::TaskClassifier::new(table);
        if let Some(zero_shot) = &config.classifier.zero_shot {
            task_classifier = task_classifier.with_fallback(classifier::ZeroShotClassifier::new(
                http_client.clone(),
                zero_shot,
            ));
        }

        let updater = config.catalog.data_dir.as_ref().map(|dir| {
            let sources = updater::default_sources(&config.updater, http_client);
            Arc::new(
                updater::UpdateOrchestrator::new(
                    dir,
                    sources,
                    updater::UpdateSettings::from(&config.updater),
                )
                .with_registry(registry.clone()),
            )
        });

        let tools = tools::ToolRegistry::new(registry, Arc::new(task_classifier))?;
        Ok(Self { tools, updater })
    }
}

pub fn build_app(config: &config::ServerConfig, state: AppState) -> Router {
    let mut app = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness))
        .nest("/v1", routes::get_api_routes());

    if let Some(cors_layer) = config.cors.clone().into_layer() {
        app = app.layer(cors_layer);
    }

    app.layer(TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        config.timeout(),
    ))
    .layer(TraceLayer::new_for_http())
    .layer(RequestBodyLimitLayer::new(config.body_limit_bytes))
    .with_state(state)
}
