use axum::{
    Json,
    extract::rejection::JsonRejection,
    response::{IntoResponse, Response},
};
use axum_valid::ValidRejection;
use http::StatusCode;
use serde::Serialize;

use crate::{
    tools::{ToolError, first_invalid_field},
    updater::UpdateError,
};

/// Error body: `{"error": {"code", "message", "field"?, "valid_values"?}}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorInfo,
}

#[derive(Debug, Serialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_values: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    info: ErrorInfo,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            info: ErrorInfo {
                code: code.into(),
                message: message.into(),
                field: None,
                valid_values: None,
            },
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.info.field = Some(field.into());
        self
    }

    pub fn with_valid_values(mut self, values: Vec<String>) -> Self {
        self.info.valid_values = Some(values);
        self
    }

    pub fn not_configured(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "not_configured", message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        let status = match &err {
            ToolError::Serialize(_) | ToolError::Schema { .. } => {
                tracing::error!(error = %err, "Tool failed internally");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            e if e.is_not_found() => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        let mut api = Self::new(status, err.code(), err.to_string());
        api.info.field = err.field();
        api.info.valid_values = err.valid_values().map(<[String]>::to_vec);
        api
    }
}

impl From<UpdateError> for ApiError {
    fn from(err: UpdateError) -> Self {
        match err {
            UpdateError::AlreadyRunning => {
                Self::new(StatusCode::CONFLICT, "update_in_progress", err.to_string())
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_json",
            rejection.body_text(),
        )
    }
}

impl From<ValidRejection<JsonRejection>> for ApiError {
    fn from(rejection: ValidRejection<JsonRejection>) -> Self {
        match rejection {
            ValidRejection::Valid(errors) => {
                let (field, message) = first_invalid_field(&errors);
                Self::new(
                    StatusCode::BAD_REQUEST,
                    "invalid_arguments",
                    format!("Invalid argument '{field}': {message}"),
                )
                .with_field(field)
            }
            ValidRejection::Inner(inner) => inner.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorResponse { error: self.info })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use crate::resolvers::ResolveError;

    use super::*;

    #[test]
    fn test_unknown_model_is_not_found_with_values() {
        let err = ToolError::from(ResolveError::UnknownModel {
            provider: "openai".into(),
            model: "gpt-9".into(),
            known: vec!["gpt-4.1".into()],
        });
        let api = ApiError::from(err);
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
        assert_eq!(api.info.code, "unknown_model");
        assert_eq!(api.info.field.as_deref(), Some("model"));
        assert_eq!(api.info.valid_values, Some(vec!["gpt-4.1".to_string()]));
    }

    #[test]
    fn test_invalid_arguments_is_bad_request() {
        let api = ApiError::from(ToolError::invalid("months", "must be at least 1"));
        assert_eq!(api.status(), StatusCode::BAD_REQUEST);
        assert_eq!(api.info.field.as_deref(), Some("months"));
        assert!(api.info.valid_values.is_none());
    }

    #[test]
    fn test_already_running_is_conflict() {
        let api = ApiError::from(UpdateError::AlreadyRunning);
        assert_eq!(api.status(), StatusCode::CONFLICT);
        assert_eq!(api.info.code, "update_in_progress");
    }

    #[test]
    fn test_body_omits_empty_fields() {
        let body = serde_json::to_value(ErrorResponse {
            error: ApiError::not_configured("no updater").info,
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"error": {"code": "not_configured", "message": "no updater"}})
        );
    }
}
