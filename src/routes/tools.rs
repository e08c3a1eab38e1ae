use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use axum_valid::{Valid, ValidRejection};
use serde::Serialize;
use serde_json::Value;

use super::error::ApiError;
use crate::{
    AppState,
    classifier::ClassificationResult,
    tools::{ClassifyTaskRequest, ToolDescriptor},
};

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub data: Vec<ToolDescriptor>,
}

#[tracing::instrument(name = "tools.list", skip(state))]
pub async fn list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        data: state.tools.list(),
    })
}

/// Run a tool. The body is the tool's argument object; an empty body is
/// treated as `{}`.
#[tracing::instrument(name = "tools.call", skip(state, body))]
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let args = match body {
        Ok(Json(args)) => args,
        Err(JsonRejection::MissingJsonContentType(_)) => Value::Null,
        Err(rejection) => return Err(rejection.into()),
    };

    let result = state.tools.call(&name, args).await.inspect_err(|e| {
        tracing::debug!(tool = %name, code = e.code(), error = %e, "Tool call rejected");
    })?;
    Ok(Json(result))
}

#[tracing::instrument(name = "tools.classify", skip(state, payload))]
pub async fn classify(
    State(state): State<AppState>,
    payload: Result<Valid<Json<ClassifyTaskRequest>>, ValidRejection<JsonRejection>>,
) -> Result<Json<ClassificationResult>, ApiError> {
    let Valid(Json(request)) = payload?;
    Ok(Json(state.tools.classifier().classify(&request.text).await))
}
