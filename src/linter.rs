//! Definition linting - static analysis of a registry.
//!
//! Checks every registered definition for:
//! - build, projection and emission failures
//! - examples and defaults that their own schema rejects
//! - duplicate enum literals
//! - unions that collapse to a single member in one variant

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::declarations::{emit_declarations_for, DeclarationOptions};
use crate::node::{AdditionalProperties, NodeKind, SchemaNode};
use crate::project::project_definition;
use crate::registry::Registry;
use crate::schema::{emit_schema, emit_schema_for, node_schema, DefinitionsKey, SchemaOptions};
use crate::types::Variant;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub definition: String,
    /// Path to the node inside the definition (e.g., "/properties/xs/default")
    pub path: String,
    pub message: String,
}

/// Result of linting a single definition.
#[derive(Debug, Clone, Serialize)]
pub struct DefinitionResult {
    pub definition: String,
    pub status: DefinitionStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a registry.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub definitions_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<DefinitionResult>,
}

impl LintResult {
    /// Returns true if no definition has errors.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint every registered definition.
///
/// If `strict` is true, definitions with warnings count as failed.
pub fn lint(registry: &Registry, strict: bool) -> LintResult {
    let results: Vec<DefinitionResult> = registry
        .names()
        .map(|name| lint_definition(registry, name))
        .collect();

    let count = |severity: Severity| -> usize {
        results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .filter(|d| d.severity == severity)
            .count()
    };
    let errors = count(Severity::Error);
    let warnings = count(Severity::Warning);

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != DefinitionStatus::Ok
            } else {
                r.status == DefinitionStatus::Error
            }
        })
        .count();

    LintResult {
        definitions_checked: results.len(),
        passed: results.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

/// Lint a single definition.
pub fn lint_definition(registry: &Registry, name: &str) -> DefinitionResult {
    debug!(definition = name, "linting");
    let mut lint = Lint {
        definition: name,
        diagnostics: Vec::new(),
    };
    lint.run(registry);

    let status = if lint.diagnostics.iter().any(|d| d.severity == Severity::Error) {
        DefinitionStatus::Error
    } else if lint.diagnostics.is_empty() {
        DefinitionStatus::Ok
    } else {
        DefinitionStatus::Warning
    };

    DefinitionResult {
        definition: name.to_string(),
        status,
        diagnostics: lint.diagnostics,
    }
}

struct Lint<'a> {
    definition: &'a str,
    diagnostics: Vec<Diagnostic>,
}

impl Lint<'_> {
    fn push(&mut self, severity: Severity, code: &str, path: &str, message: String) {
        debug!(definition = self.definition, code, path, %message, "lint finding");
        self.diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            definition: self.definition.to_string(),
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            message,
        });
    }

    fn run(&mut self, registry: &Registry) {
        let node = match registry.resolve(self.definition) {
            Ok(node) => node,
            Err(e) => {
                self.push(Severity::Error, "E001", "", format!("build failed: {}", e));
                return;
            }
        };

        // W001 looks at the source tree, so it also covers parents given inline.
        visit(&node, "", &mut |n, path| {
            if let NodeKind::Enum(e) = &n.kind {
                for (i, value) in e.values.iter().enumerate() {
                    if e.values[..i].contains(value) {
                        self.push(
                            Severity::Warning,
                            "W001",
                            &format!("{}/enum", path),
                            format!("duplicate enum literal {}", value.to_value()),
                        );
                    }
                }
            }
        });

        let mut external = None;
        for variant in Variant::ALL {
            match project_definition(registry, self.definition, variant) {
                Ok(Some(projected)) => {
                    self.single_member_unions(&projected, variant);
                    if variant == Variant::External {
                        external = Some(projected);
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    self.push(
                        Severity::Error,
                        "E001",
                        "",
                        format!("{} projection failed: {}", variant, e),
                    );
                    return;
                }
            }
        }

        let options = DeclarationOptions::default().header(None);
        if let Err(e) = emit_declarations_for(registry, &[self.definition], &options) {
            self.push(Severity::Error, "E001", "", format!("declaration emission failed: {}", e));
        }

        let Some(external) = external else {
            return;
        };
        let reachable = match emit_schema_for(registry, &[self.definition], &SchemaOptions::new()) {
            Ok(doc) => doc,
            Err(e) => {
                self.push(Severity::Error, "E001", "", format!("schema emission failed: {}", e));
                return;
            }
        };
        // Raw schemas may point at any definition, so prefer the full document.
        let doc = emit_schema(registry, &SchemaOptions::new()).unwrap_or(reachable);
        let container = doc
            .get(DefinitionsKey::Definitions.as_str())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        self.examples_and_defaults(registry, &external, &container);
    }

    fn single_member_unions(&mut self, projected: &SchemaNode, variant: Variant) {
        let mut found = Vec::new();
        visit(projected, "", &mut |n, path| {
            if matches!(&n.kind, NodeKind::Union(members) if members.len() == 1) {
                found.push(format!("{}/anyOf", path));
            }
        });
        for path in found {
            let normalized = if path.is_empty() { "/" } else { path.as_str() };
            if self.diagnostics.iter().any(|d| d.code == "W002" && d.path == normalized) {
                continue;
            }
            self.push(
                Severity::Warning,
                "W002",
                &path,
                format!("union has a single member in the {} variant", variant),
            );
        }
    }

    fn examples_and_defaults(&mut self, registry: &Registry, external: &SchemaNode, container: &Value) {
        let mut checks: Vec<(String, SchemaNode)> = Vec::new();
        visit(external, "", &mut |n, path| {
            if !n.meta.examples.is_empty() || n.default_value().is_some() {
                checks.push((path.to_string(), n.clone()));
            }
        });

        for (path, node) in checks {
            let schema = match node_schema(registry, self.definition, &node, DefinitionsKey::Definitions) {
                Ok(Some(schema)) => with_definitions(schema, container),
                Ok(None) => continue,
                Err(e) => {
                    self.push(Severity::Error, "E001", &path, format!("schema emission failed: {}", e));
                    continue;
                }
            };
            let validator = match jsonschema::validator_for(&schema) {
                Ok(v) => v,
                Err(e) => {
                    self.push(Severity::Error, "E001", &path, format!("schema does not compile: {}", e));
                    continue;
                }
            };

            for (i, example) in node.meta.examples.iter().enumerate() {
                if let Some(error) = validator.iter_errors(example).next() {
                    self.push(
                        Severity::Error,
                        "E002",
                        &format!("{}/examples/{}", path, i),
                        format!("example {} is invalid: {}", example, error),
                    );
                }
            }
            if let Some(default) = node.default_value() {
                if let Some(error) = validator.iter_errors(default).next() {
                    self.push(
                        Severity::Error,
                        "E003",
                        &format!("{}/default", path),
                        format!("default {} is invalid: {}", default, error),
                    );
                }
            }
        }
    }
}

fn with_definitions(schema: Value, container: &Value) -> Value {
    match schema {
        Value::Object(mut map) => {
            map.insert(DefinitionsKey::Definitions.as_str().to_string(), container.clone());
            Value::Object(map)
        }
        other => other,
    }
}

/// Visit `node` and every node below it, with its path.
fn visit(node: &SchemaNode, path: &str, f: &mut impl FnMut(&SchemaNode, &str)) {
    f(node, path);
    match &node.kind {
        NodeKind::Object(o) => {
            for p in &o.properties {
                visit(&p.value, &format!("{}/properties/{}", path, p.name), f);
            }
            if let AdditionalProperties::Schema(schema) = &o.additional {
                visit(schema, &format!("{}/additionalProperties", path), f);
            }
            for (i, parent) in o.extends.iter().enumerate() {
                visit(parent, &format!("{}/extends/{}", path, i), f);
            }
        }
        NodeKind::Array(item) => visit(item, &format!("{}/items", path), f),
        NodeKind::Union(members) => {
            for (i, member) in members.iter().enumerate() {
                visit(member, &format!("{}/anyOf/{}", path, i), f);
            }
        }
        NodeKind::Linked { schema, .. } => visit(schema, path, f),
        _ => {}
    }
}
