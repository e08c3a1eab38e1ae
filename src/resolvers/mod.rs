//! Pricing resolvers: `(catalog snapshot, request) → result`.
//!
//! Resolvers are synchronous and side-effect free. A key that is not in the
//! catalog is always an error naming the valid identifiers; no resolver
//! substitutes a default rate.

pub mod ai;
pub mod bandwidth;
pub mod breakeven;
pub mod catalog;
pub mod compute;
pub mod forecast;
pub mod runway;
pub mod saas;

use serde::Serialize;
use validator::ValidationError;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ResolveError {
    #[error("Unknown provider '{provider}'")]
    UnknownProvider { provider: String, known: Vec<String> },

    #[error("Unknown model '{model}' for provider '{provider}'")]
    UnknownModel {
        provider: String,
        model: String,
        known: Vec<String>,
    },

    #[error("Unknown instance type '{instance}' for provider '{provider}'")]
    UnknownInstance {
        provider: String,
        instance: String,
        known: Vec<String>,
    },

    #[error("Unknown storage class '{class}' for provider '{provider}'")]
    UnknownStorageClass {
        provider: String,
        class: String,
        known: Vec<String>,
    },

    #[error("Unknown service '{service}'")]
    UnknownService { service: String, known: Vec<String> },

    #[error("Unknown service category '{category}'")]
    UnknownServiceCategory { category: String, known: Vec<String> },

    #[error("Service '{service}' has no plan limit for usage dimension '{dimension}'")]
    UnknownDimension {
        service: String,
        dimension: String,
        known: Vec<String>,
    },

    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },
}

impl ResolveError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownProvider { .. } => "unknown_provider",
            Self::UnknownModel { .. } => "unknown_model",
            Self::UnknownInstance { .. } => "unknown_instance",
            Self::UnknownStorageClass { .. } => "unknown_storage_class",
            Self::UnknownService { .. } => "unknown_service",
            Self::UnknownServiceCategory { .. } => "unknown_service_category",
            Self::UnknownDimension { .. } => "unknown_usage_dimension",
            Self::InvalidInput { .. } => "invalid_input",
        }
    }

    /// The request field the error is about.
    pub fn field(&self) -> String {
        match self {
            Self::UnknownProvider { .. } => "provider".to_string(),
            Self::UnknownModel { .. } => "model".to_string(),
            Self::UnknownInstance { .. } => "instance_type".to_string(),
            Self::UnknownStorageClass { .. } => "storage_class".to_string(),
            Self::UnknownService { .. } => "service".to_string(),
            Self::UnknownServiceCategory { .. } => "category".to_string(),
            Self::UnknownDimension { dimension, .. } => format!("usage.{dimension}"),
            Self::InvalidInput { field, .. } => field.clone(),
        }
    }

    pub fn valid_values(&self) -> Option<&[String]> {
        match self {
            Self::UnknownProvider { known, .. }
            | Self::UnknownModel { known, .. }
            | Self::UnknownInstance { known, .. }
            | Self::UnknownStorageClass { known, .. }
            | Self::UnknownService { known, .. }
            | Self::UnknownServiceCategory { known, .. }
            | Self::UnknownDimension { known, .. } => Some(known),
            Self::InvalidInput { .. } => None,
        }
    }

    /// Lookup failures, as opposed to malformed input.
    pub fn is_not_found(&self) -> bool {
        !matches!(self, Self::InvalidInput { .. })
    }
}

/// The same request priced against another model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternative {
    pub provider: String,
    pub model: String,
    pub display_name: String,
    pub total_cost: f64,
    /// Positive when the alternative is cheaper than the requested model.
    pub savings: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_cost: Option<f64>,
}

fn owned(names: Vec<&str>) -> Vec<String> {
    names.into_iter().map(str::to_string).collect()
}

/// Rejects strings that are empty after trimming.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("must not be blank".into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn default_hours_per_month() -> f64 {
    crate::formulas::HOURS_PER_MONTH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_fields() {
        let err = ResolveError::UnknownDimension {
            service: "neon".into(),
            dimension: "seats".into(),
            known: vec!["storage_gb".into()],
        };
        assert_eq!(err.field(), "usage.seats");
        assert_eq!(err.code(), "unknown_usage_dimension");
        assert_eq!(err.valid_values().unwrap(), ["storage_gb".to_string()]);
        assert!(err.is_not_found());

        let err = ResolveError::invalid("tiers[1].up_to_gb", "must be ascending");
        assert_eq!(err.field(), "tiers[1].up_to_gb");
        assert!(err.valid_values().is_none());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_blank() {
        assert!(not_blank("  ").is_err());
        assert!(not_blank("voice app").is_ok());
    }
}
