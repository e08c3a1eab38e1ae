//! Argument validation for tool calls.
//!
//! Arguments pass three gates in order: the tool's JSON schema, then
//! deserialization, then the request type's `validator` rules. The schema is
//! derived from the same `#[validate]` attributes, so it already rejects
//! structure, type, required, unknown-field, range and length violations;
//! `validator` is left with the rules a schema cannot carry, such as blank
//! strings. Each failure is reported against the dotted path of the
//! offending field.

use jsonschema::error::ValidationErrorKind;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use super::ToolError;

/// Field reported when the arguments as a whole are wrong.
const ROOT_FIELD: &str = "arguments";

/// A tool's input schema and its compiled validator.
pub(super) struct ArgumentSchema {
    schema: Value,
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for ArgumentSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgumentSchema").finish_non_exhaustive()
    }
}

impl ArgumentSchema {
    pub(super) fn for_type<T: JsonSchema>() -> Result<Self, String> {
        let schema = serde_json::to_value(schemars::schema_for!(T)).map_err(|e| e.to_string())?;
        let validator = jsonschema::draft7::new(&schema).map_err(|e| e.to_string())?;
        Ok(Self { schema, validator })
    }

    pub(super) fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate and deserialize `args`. A missing argument object is treated
    /// as empty.
    pub(super) fn parse<T: DeserializeOwned + Validate>(&self, args: Value) -> Result<T, ToolError> {
        let args = match args {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        if let Some(error) = self.validator.iter_errors(&args).next() {
            let pointer = error.instance_path.to_string();
            let field = match &error.kind {
                ValidationErrorKind::Required { property } => {
                    join_field(&pointer_to_field(&pointer), property.as_str().unwrap_or_default())
                }
                ValidationErrorKind::AdditionalProperties { unexpected } => join_field(
                    &pointer_to_field(&pointer),
                    unexpected.first().map(String::as_str).unwrap_or_default(),
                ),
                _ => pointer_to_field(&pointer),
            };
            let field = if field.is_empty() {
                ROOT_FIELD.to_string()
            } else {
                field
            };
            return Err(ToolError::invalid(field, error.to_string()));
        }

        let request: T =
            serde_json::from_value(args).map_err(|e| ToolError::invalid(ROOT_FIELD, e.to_string()))?;
        request.validate().map_err(|errors| {
            let (field, message) = first_invalid_field(&errors);
            ToolError::invalid(field, message)
        })?;
        Ok(request)
    }
}

/// `/step_changes/0/month` → `step_changes[0].month`
fn pointer_to_field(pointer: &str) -> String {
    let mut field = String::new();
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        let segment = segment.replace("~1", "/").replace("~0", "~");
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            field.push('[');
            field.push_str(&segment);
            field.push(']');
        } else {
            if !field.is_empty() {
                field.push('.');
            }
            field.push_str(&segment);
        }
    }
    field
}

fn join_field(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (false, true) => parent.to_string(),
        (false, false) => format!("{parent}.{child}"),
    }
}

/// The first failing field of a `validator` error tree, as a dotted path
/// with a readable message. Fields are visited in name order.
pub(crate) fn first_invalid_field(errors: &ValidationErrors) -> (String, String) {
    first_in(errors, "").unwrap_or_else(|| (ROOT_FIELD.to_string(), errors.to_string()))
}

fn first_in(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (name, kind) in entries {
        let path = join_field(prefix, name);
        let found = match kind {
            ValidationErrorsKind::Field(errs) => errs.first().map(|e| (path, describe(e))),
            ValidationErrorsKind::Struct(inner) => first_in(inner, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_in(inner, &format!("{path}[{idx}]"))),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    let min = error.params.get("min");
    let max = error.params.get("max");
    match (&*error.code, min, max) {
        ("range", Some(min), Some(max)) => format!("must be between {min} and {max}"),
        ("range", Some(min), None) => format!("must be at least {min}"),
        ("range", None, Some(max)) => format!("must be at most {max}"),
        ("length", Some(min), Some(max)) => {
            format!("length must be between {min} and {max}")
        }
        ("length", Some(min), None) => format!("length must be at least {min}"),
        ("length", None, Some(max)) => format!("length must be at most {max}"),
        (code, _, _) => format!("failed '{code}' validation"),
    }
}
