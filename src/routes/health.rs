//! Health endpoints for probes and dashboards.

use axum::{Json, extract::State, response::IntoResponse};
use chrono::{DateTime, Utc};
use http::StatusCode;
use serde::Serialize;

use crate::{AppState, catalog::CatalogSourceInfo};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    pub catalog: CatalogStatus,
    pub classifier: ClassifierStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updater: Option<UpdaterStatus>,
}

#[derive(Debug, Serialize)]
pub struct CatalogStatus {
    pub models: usize,
    pub instances: usize,
    pub services: usize,
    pub sources: Vec<CatalogSourceInfo>,
}

#[derive(Debug, Serialize)]
pub struct ClassifierStatus {
    pub zero_shot_fallback: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdaterStatus {
    pub is_updating: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
    /// Sources that failed in the last cycle.
    pub last_failures: usize,
}

/// Catalog contents, classifier mode and updater state.
///
/// Reports `degraded` when the last update cycle had failing sources; the
/// service keeps answering from the current snapshot either way.
#[tracing::instrument(name = "health.check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let catalog = state.tools.catalog().snapshot();

    let updater = state.updater.as_ref().map(|updater| {
        let snapshot = updater.status();
        UpdaterStatus {
            is_updating: snapshot.is_updating,
            last_run: snapshot.last_result.as_ref().map(|r| r.finished_at),
            last_failures: snapshot.last_result.as_ref().map_or(0, |r| r.failures()),
        }
    });
    let degraded = updater.as_ref().is_some_and(|u| u.last_failures > 0);

    Json(HealthStatus {
        status: if degraded { "degraded" } else { "healthy" },
        version: env!("CARGO_PKG_VERSION"),
        catalog: CatalogStatus {
            models: catalog.model_count(),
            instances: catalog.instance_count(),
            services: catalog.service_count(),
            sources: catalog.sources().to_vec(),
        },
        classifier: ClassifierStatus {
            zero_shot_fallback: state.tools.classifier().has_fallback(),
        },
        updater,
    })
}

/// Liveness probe.
pub async fn liveness() -> impl IntoResponse {
    StatusCode::OK
}
