//! Payload validation against generated schemas.

use serde_json::Value;

use crate::error::{SchemaError, ValidateError};
use crate::registry::Registry;
use crate::schema::{emit_schema, SchemaOptions};

/// Validate a payload against the External schema of one definition.
///
/// Generates the full document rooted at `definition`, so raw schemas that
/// point at other definitions resolve, then validates the payload against it.
///
/// # Errors
///
/// Returns `ValidateError::Generate` if the schema cannot be generated, or
/// `ValidateError::Invalid` with every violation if the payload doesn't match.
pub fn validate(registry: &Registry, definition: &str, payload: &Value) -> Result<(), ValidateError> {
    let schema = emit_schema(registry, &SchemaOptions::new().root(definition))?;
    validate_against_schema(&schema, payload)
}

/// Validate a payload against an already-generated schema.
///
/// Use this when validating many payloads against one emitted document.
pub fn validate_against_schema(schema: &Value, payload: &Value) -> Result<(), ValidateError> {
    let validator = jsonschema::validator_for(schema).map_err(|e| ValidateError::InvalidSchema {
        message: e.to_string(),
    })?;

    let errors: Vec<SchemaError> = validator
        .iter_errors(payload)
        .map(|e| SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidateError::Invalid { errors })
    }
}
