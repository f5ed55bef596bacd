//! Error types for definition building, emission and validation.

use std::path::PathBuf;
use thiserror::Error;

use crate::types::{Backend, Variant};

/// Errors raised while building, projecting or emitting definitions.
///
/// Every variant identifies the definition it happened in, so a failed run
/// can point at the offending shape.
#[derive(Debug, Error)]
pub enum GenError {
    #[error("definition '{name}' is already registered")]
    DuplicateDefinition { name: String },

    #[error("invalid definition '{definition}' at {path}: {message}")]
    Construction {
        definition: String,
        path: String,
        message: String,
    },

    #[error("'{referencing}' references unknown definition '{missing}'")]
    UnknownDefinition { referencing: String, missing: String },

    #[error("'{definition}' references '{missing}', which has no {variant} shape")]
    AbsentInVariant {
        definition: String,
        missing: String,
        variant: Variant,
    },

    #[error("definition '{definition}' extends itself: {}", chain.join(" -> "))]
    CyclicExtends {
        definition: String,
        chain: Vec<String>,
    },

    #[error("property '{property}' of '{definition}' is inherited from more than one parent with different shapes")]
    ExtendsCollision { definition: String, property: String },

    #[error("'{definition}' can only extend object shapes, found {found}")]
    InvalidExtends { definition: String, found: String },

    #[error("raw node in '{definition}' has no {backend} implementation")]
    MissingRawBackend { definition: String, backend: Backend },

    #[error("{kind} node in '{definition}' cannot be emitted by the {backend} backend")]
    Unsupported {
        definition: String,
        kind: &'static str,
        backend: Backend,
    },
}

impl GenError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// The definition the error belongs to.
    pub fn definition(&self) -> &str {
        match self {
            GenError::DuplicateDefinition { name } => name,
            GenError::Construction { definition, .. }
            | GenError::CyclicExtends { definition, .. }
            | GenError::ExtendsCollision { definition, .. }
            | GenError::InvalidExtends { definition, .. }
            | GenError::MissingRawBackend { definition, .. }
            | GenError::Unsupported { definition, .. }
            | GenError::AbsentInVariant { definition, .. } => definition,
            GenError::UnknownDefinition { referencing, .. } => referencing,
        }
    }
}

/// Errors while loading a definition manifest.
#[derive(Debug, Error)]
pub enum LoadError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Parse errors (exit code 2)
    #[error("invalid manifest: {source}")]
    InvalidManifest {
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Definition(#[from] GenError),
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::FileNotFound { .. } | LoadError::ReadError { .. } => 3,
            LoadError::InvalidManifest { .. } => 2,
            LoadError::Definition(e) => e.exit_code(),
        }
    }
}

/// Errors during payload validation.
#[derive(Debug, Error)]
pub enum ValidateError {
    #[error(transparent)]
    Generate(#[from] GenError),

    #[error("generated schema is not usable: {message}")]
    InvalidSchema { message: String },

    #[error("validation failed with {} error(s)", errors.len())]
    Invalid { errors: Vec<SchemaError> },
}

/// Single validation error with path context.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SchemaError {
    /// JSON Pointer (RFC 6901) to the invalid field.
    pub path: String,
    /// Human-readable error message.
    pub message: String,
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl ValidateError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ValidateError::Generate(e) => e.exit_code(),
            ValidateError::InvalidSchema { .. } => 2,
            ValidateError::Invalid { .. } => 1,
        }
    }
}
