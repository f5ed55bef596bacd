//! Dual-target schema generator
//!
//! Describe a data shape once and emit it twice: as typed interface
//! declarations and as a JSON Schema document.
//!
//! Shapes come in two variants. `External` is what authors write and what
//! tooling validates; `Internal` is the enriched shape the application works
//! with after loading. Definitions whose variants differ get two declarations;
//! the schema only ever reflects the External variant.
//!
//! # Example
//!
//! ```
//! use dualgen::{
//!     emit_declarations, emit_schema, obj, prop, string, DeclarationOptions, Registry,
//!     SchemaOptions, Variant,
//! };
//!
//! let mut registry = Registry::new();
//! registry.define("Example", || {
//!     obj([
//!         prop("a", string()),
//!         prop("b", string().optional()).only_in(Variant::Internal),
//!     ])
//! })?;
//!
//! let declarations = emit_declarations(&registry, &DeclarationOptions::default())?;
//! assert!(declarations.contains("export interface Example {"));
//! assert!(declarations.contains("export interface ExampleInternal {"));
//!
//! let schema = emit_schema(&registry, &SchemaOptions::new())?;
//! assert_eq!(schema["definitions"]["Example"]["required"], serde_json::json!(["a"]));
//! assert!(schema["definitions"]["Example"]["properties"].get("b").is_none());
//! # Ok::<(), dualgen::GenError>(())
//! ```
//!
//! # Projection Rules
//!
//! | Restriction | External | Internal |
//! |-------------|----------|----------|
//! | (none) | kept | kept |
//! | `only_in(Internal)` | dropped | kept |
//! | `only_in(External)` | kept | dropped |
//!
//! `extends` parents are flattened into their children during projection;
//! a child property overrides a parent property of the same name.

pub mod catalog;
mod check;
mod declarations;
mod error;
mod linter;
mod manifest;
mod node;
mod project;
mod registry;
mod schema;
mod types;
mod validator;
mod variation;

pub use declarations::{declaration_name, emit_declarations, emit_declarations_for, DeclarationOptions};
pub use error::{GenError, LoadError, SchemaError, ValidateError};
pub use linter::{
    lint, lint_definition, DefinitionResult, DefinitionStatus, Diagnostic, LintResult, Severity,
};
pub use manifest::{load_manifest, load_manifest_str, Manifest, NodeDoc};
pub use node::{
    arr, boolean, constant, enumeration, import, integer, linked, null, number, obj, pascal_case,
    prop, raw, reference, string, union, AdditionalProperties, EnumNaming, EnumNode, ImportNode,
    Metadata, NodeKind, ObjectNode, Optionality, Property, RawEmitter, RawNode, SchemaNode,
};
pub use project::{project, project_definition};
pub use registry::{Builder, Registry};
pub use schema::{emit_schema, emit_schema_for, node_schema, DefinitionsKey, SchemaOptions, DRAFT_07};
pub use types::{Backend, Literal, Variant, VariantRestriction, DEFAULT_INTERNAL_SUFFIX};
pub use validator::{validate, validate_against_schema};
pub use variation::{
    contains_variation_differences, node_contains_variation_differences, variation_report,
    VariationEntry,
};
