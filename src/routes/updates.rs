use std::sync::Arc;

use axum::{Json, extract::State};
use http::StatusCode;

use super::error::ApiError;
use crate::{
    AppState,
    updater::{UpdateCycleReport, UpdateOrchestrator, UpdateStatusSnapshot},
};

fn get_updater(state: &AppState) -> Result<&Arc<UpdateOrchestrator>, ApiError> {
    state.updater.as_ref().ok_or_else(|| {
        ApiError::not_configured("Price updates need `catalog.data_dir` to be configured")
    })
}

#[tracing::instrument(name = "updates.status", skip(state))]
pub async fn update_status(
    State(state): State<AppState>,
) -> Result<Json<UpdateStatusSnapshot>, ApiError> {
    Ok(Json(get_updater(&state)?.status()))
}

/// Run one update cycle now and return its report. Conflicts with a cycle
/// already in flight.
///
/// The cycle runs on its own task: a request that times out or disconnects
/// stops waiting for the report but does not cancel the cycle.
#[tracing::instrument(name = "updates.trigger", skip(state))]
pub async fn trigger_update(
    State(state): State<AppState>,
) -> Result<Json<UpdateCycleReport>, ApiError> {
    let updater = Arc::clone(get_updater(&state)?);
    let report = tokio::spawn(async move { updater.run_cycle().await })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Price update task failed");
            ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "update_failed",
                "The update cycle did not complete",
            )
        })??;
    tracing::info!(
        written = report.files_written(),
        failures = report.failures(),
        "Manual price update finished"
    );
    Ok(Json(report))
}
