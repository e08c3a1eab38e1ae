use crate::resolvers::ResolveError;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool '{name}'")]
    UnknownTool { name: String, known: Vec<String> },

    /// Arguments failed schema, type or range validation.
    #[error("Invalid argument '{field}': {message}")]
    InvalidArguments { field: String, message: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Failed to serialize tool result: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("Invalid input schema for tool '{tool}': {message}")]
    Schema { tool: String, message: String },
}

impl ToolError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownTool { .. } => "unknown_tool",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::Resolve(e) => e.code(),
            Self::Serialize(_) | Self::Schema { .. } => "internal_error",
        }
    }

    pub fn field(&self) -> Option<String> {
        match self {
            Self::UnknownTool { .. } => Some("name".to_string()),
            Self::InvalidArguments { field, .. } => Some(field.clone()),
            Self::Resolve(e) => Some(e.field()),
            Self::Serialize(_) | Self::Schema { .. } => None,
        }
    }

    pub fn valid_values(&self) -> Option<&[String]> {
        match self {
            Self::UnknownTool { known, .. } => Some(known),
            Self::Resolve(e) => e.valid_values(),
            Self::InvalidArguments { .. } | Self::Serialize(_) | Self::Schema { .. } => None,
        }
    }

    /// Lookup failures (unknown tool, provider, model, ...).
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::UnknownTool { .. } => true,
            Self::Resolve(e) => e.is_not_found(),
            Self::InvalidArguments { .. } | Self::Serialize(_) | Self::Schema { .. } => false,
        }
    }
}
