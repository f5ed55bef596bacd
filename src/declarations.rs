//! Declaration backend - emits TypeScript-style interface and type declarations.
//!
//! Named definitions are hoisted into top-level declarations and referenced by
//! name; anonymous nodes are inlined where they are used. Each declaration name
//! is emitted once per run, no matter how many places reference it.

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::error::GenError;
use crate::node::{AdditionalProperties, EnumNode, Metadata, NodeKind, ObjectNode, SchemaNode};
use crate::project::project_definition;
use crate::registry::Registry;
use crate::types::{Backend, Literal, Variant, DEFAULT_INTERNAL_SUFFIX};
use crate::variation::contains_variation_differences;

const INDENT: &str = "  ";

/// Options for the declaration backend.
#[derive(Debug, Clone)]
pub struct DeclarationOptions {
    /// Appended to the name of Internal declarations.
    pub internal_suffix: String,
    /// Lines written after the imports, before any declaration.
    pub preamble: Vec<String>,
    /// Comment written at the top of the output.
    pub header: Option<String>,
}

impl Default for DeclarationOptions {
    fn default() -> Self {
        Self {
            internal_suffix: DEFAULT_INTERNAL_SUFFIX.to_string(),
            preamble: Vec::new(),
            header: Some("This file is generated. Do not edit.".to_string()),
        }
    }
}

impl DeclarationOptions {
    pub fn internal_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.internal_suffix = suffix.into();
        self
    }

    pub fn preamble(mut self, line: impl Into<String>) -> Self {
        self.preamble.push(line.into());
        self
    }

    pub fn header(mut self, header: Option<String>) -> Self {
        self.header = header;
        self
    }
}

/// Emit declarations for every registered definition.
///
/// Definitions whose variants differ get two declarations: `Name` (External)
/// and `Name` + suffix (Internal). Output is produced in memory; nothing is
/// returned unless the whole run succeeds.
///
/// # Errors
///
/// Returns the first construction, resolution or emission error.
pub fn emit_declarations(registry: &Registry, options: &DeclarationOptions) -> Result<String, GenError> {
    let names: Vec<&str> = registry.names().collect();
    emit_declarations_for(registry, &names, options)
}

/// Emit declarations for `names` and everything they reference.
pub fn emit_declarations_for(
    registry: &Registry,
    names: &[&str],
    options: &DeclarationOptions,
) -> Result<String, GenError> {
    let mut emitter = DeclarationEmitter::new(registry, options);
    for name in names {
        emitter.ensure(name, Variant::External)?;
        if contains_variation_differences(registry, name) {
            emitter.ensure(name, Variant::Internal)?;
        }
    }
    Ok(emitter.finish())
}

/// Declaration name used for `name` in `variant`.
pub fn declaration_name(registry: &Registry, name: &str, variant: Variant, suffix: &str) -> String {
    match variant {
        Variant::Internal if contains_variation_differences(registry, name) => {
            format!("{}{}", name, suffix)
        }
        _ => name.to_string(),
    }
}

struct DeclarationEmitter<'r> {
    registry: &'r Registry,
    options: &'r DeclarationOptions,
    /// Declaration name to text. `None` while the declaration is being written.
    output: IndexMap<String, Option<String>>,
    /// Module to imported names, in first-use order.
    imports: IndexMap<String, Vec<String>>,
    /// Definition being emitted, for error messages.
    definition: String,
}

impl<'r> DeclarationEmitter<'r> {
    fn new(registry: &'r Registry, options: &'r DeclarationOptions) -> Self {
        Self {
            registry,
            options,
            output: IndexMap::new(),
            imports: IndexMap::new(),
            definition: String::new(),
        }
    }

    /// Make sure `name` is declared for `variant` and return the declared name.
    ///
    /// Returns `None` if the definition does not exist in that variant. The
    /// slot is reserved before the body is written, so cycles resolve to the
    /// name instead of recursing.
    fn ensure(&mut self, name: &str, variant: Variant) -> Result<Option<String>, GenError> {
        let decl = declaration_name(self.registry, name, variant, &self.options.internal_suffix);
        if self.output.contains_key(&decl) {
            return Ok(Some(decl));
        }
        let Some(projected) = project_definition(self.registry, name, variant)? else {
            return Ok(None);
        };

        debug!(declaration = %decl, %variant, "emitting declaration");
        self.output.insert(decl.clone(), None);
        let outer = std::mem::replace(&mut self.definition, name.to_string());
        let text = self.declaration(&decl, &projected, variant);
        self.definition = outer;
        self.output.insert(decl.clone(), Some(text?));
        Ok(Some(decl))
    }

    fn declaration(&mut self, decl: &str, node: &SchemaNode, variant: Variant) -> Result<String, GenError> {
        let doc = jsdoc(&node.meta, node.default_value(), 0);
        let text = match &node.kind {
            NodeKind::Object(o) => {
                format!("{}export interface {} {}", doc, decl, self.object(o, variant, 0)?)
            }
            NodeKind::Enum(EnumNode {
                values,
                naming: Some(naming),
            }) => {
                let members: Vec<String> = values
                    .iter()
                    .map(|v| format!("{}{} = {},", INDENT, naming.name(v), literal(v)))
                    .collect();
                format!("{}export enum {} {{\n{}\n}}", doc, decl, members.join("\n"))
            }
            _ => format!("{}export type {} = {};", doc, decl, self.expr(node, variant, 0)?),
        };
        Ok(text)
    }

    fn expr(&mut self, node: &SchemaNode, variant: Variant, depth: usize) -> Result<String, GenError> {
        let text = match &node.kind {
            NodeKind::Object(o) => self.object(o, variant, depth)?,
            NodeKind::Array(item) => {
                let inner = self.expr(item, variant, depth)?;
                if needs_parens(item) {
                    format!("({})[]", inner)
                } else {
                    format!("{}[]", inner)
                }
            }
            NodeKind::Union(members) => {
                let mut parts: Vec<String> = Vec::with_capacity(members.len());
                for member in members {
                    let part = self.expr(member, variant, depth)?;
                    if !parts.contains(&part) {
                        parts.push(part);
                    }
                }
                parts.join(" | ")
            }
            NodeKind::Enum(e) => e.values.iter().map(literal).collect::<Vec<_>>().join(" | "),
            NodeKind::Const(lit) => literal(lit),
            NodeKind::String => "string".to_string(),
            NodeKind::Number | NodeKind::Integer => "number".to_string(),
            NodeKind::Boolean => "boolean".to_string(),
            NodeKind::Null => "null".to_string(),
            NodeKind::Reference(name) => {
                self.ensure(name, variant)?.ok_or_else(|| GenError::AbsentInVariant {
                    definition: self.definition.clone(),
                    missing: name.clone(),
                    variant,
                })?
            }
            NodeKind::Raw(raw) => raw.declaration().ok_or_else(|| GenError::MissingRawBackend {
                definition: self.definition.clone(),
                backend: Backend::Declarations,
            })?,
            NodeKind::Import(import) => {
                let names = self.imports.entry(import.source_module.clone()).or_default();
                if !names.contains(&import.imported_name) {
                    names.push(import.imported_name.clone());
                }
                import.imported_name.clone()
            }
            NodeKind::Linked { declaration, .. } => self.expr(declaration, variant, depth)?,
        };
        Ok(text)
    }

    fn object(&mut self, o: &ObjectNode, variant: Variant, depth: usize) -> Result<String, GenError> {
        if o.properties.is_empty() && o.additional == AdditionalProperties::Forbidden {
            return Ok("{}".to_string());
        }

        let pad = INDENT.repeat(depth + 1);
        let mut lines = Vec::new();
        for p in &o.properties {
            let doc = jsdoc(&p.value.meta, p.value.default_value(), depth + 1);
            let optional = if p.is_optional() { "?" } else { "" };
            let ty = self.expr(&p.value, variant, depth + 1)?;
            lines.push(format!("{}{}{}{}: {};", doc, pad, property_key(&p.name), optional, ty));
        }
        match &o.additional {
            AdditionalProperties::Forbidden => {}
            AdditionalProperties::Allowed => lines.push(format!("{}[key: string]: unknown;", pad)),
            AdditionalProperties::Schema(schema) => {
                let ty = self.expr(schema, variant, depth + 1)?;
                lines.push(format!("{}[key: string]: {};", pad, ty));
            }
        }

        Ok(format!("{{\n{}\n{}}}", lines.join("\n"), INDENT.repeat(depth)))
    }

    fn finish(self) -> String {
        let mut out = String::new();
        if let Some(header) = &self.options.header {
            for line in header.lines() {
                out.push_str(&format!("// {}\n", line));
            }
            out.push('\n');
        }
        if !self.imports.is_empty() {
            for (module, names) in &self.imports {
                out.push_str(&format!("import type {{ {} }} from '{}';\n", names.join(", "), module));
            }
            out.push('\n');
        }
        if !self.options.preamble.is_empty() {
            for line in &self.options.preamble {
                out.push_str(line);
                out.push('\n');
            }
            out.push('\n');
        }
        let declarations: Vec<String> = self.output.into_values().flatten().collect();
        out.push_str(&declarations.join("\n\n"));
        out.push('\n');
        out
    }
}

fn needs_parens(item: &SchemaNode) -> bool {
    match &item.kind {
        NodeKind::Union(members) => members.len() > 1,
        NodeKind::Enum(e) => e.values.len() > 1,
        NodeKind::Linked { declaration, .. } => needs_parens(declaration),
        NodeKind::Raw(_) => true,
        _ => false,
    }
}

fn literal(lit: &Literal) -> String {
    match lit {
        Literal::Str(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        other => other.to_string(),
    }
}

fn property_key(name: &str) -> String {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        }
        _ => false,
    };
    if valid {
        name.to_string()
    } else {
        literal(&Literal::Str(name.to_string()))
    }
}

fn jsdoc(meta: &Metadata, default: Option<&Value>, depth: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let paragraph = |lines: &mut Vec<String>, text: &str| {
        if !lines.is_empty() {
            lines.push(String::new());
        }
        lines.extend(text.lines().map(str::to_string));
    };
    if let Some(title) = &meta.title {
        paragraph(&mut lines, title);
    }
    if let Some(description) = &meta.description {
        paragraph(&mut lines, description);
    }
    if let Some(comment) = &meta.comment {
        paragraph(&mut lines, comment);
    }
    if let Some(default) = default {
        lines.push(format!("@default {}", default));
    }
    if let Some(note) = &meta.deprecated {
        lines.push(format!("@deprecated {}", note));
    }
    if lines.is_empty() {
        return String::new();
    }

    let pad = INDENT.repeat(depth);
    let mut out = format!("{}/**\n", pad);
    for line in lines {
        let line = line.replace("*/", "*\\/");
        if line.is_empty() {
            out.push_str(&format!("{} *\n", pad));
        } else {
            out.push_str(&format!("{} * {}\n", pad, line));
        }
    }
    out.push_str(&format!("{} */\n", pad));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::*;

    fn emit(registry: &Registry) -> String {
        emit_declarations(registry, &DeclarationOptions::default().header(None)).unwrap()
    }

    #[test]
    fn internal_only_field_yields_two_declarations() {
        let mut registry = Registry::new();
        registry
            .define("Example", || {
                obj([
                    prop("a", string()),
                    prop("b", string().optional()).only_in(Variant::Internal),
                ])
            })
            .unwrap();

        let out = emit(&registry);
        assert!(out.contains("export interface Example {\n  a: string;\n}"));
        assert!(out.contains("export interface ExampleInternal {\n  a: string;\n  b?: string;\n}"));
    }

    #[test]
    fn shared_definition_emitted_once() {
        let mut registry = Registry::new();
        registry
            .define("GridSize", || union([constant("auto"), enumeration(1..=3)]))
            .unwrap()
            .define("GridStyling", || {
                obj([
                    prop("xs", reference("GridSize").optional()),
                    prop("sm", reference("GridSize").optional()),
                ])
            })
            .unwrap();

        let out = emit(&registry);
        assert_eq!(out.matches("export type GridSize").count(), 1);
        assert!(out.contains("export type GridSize = 'auto' | 1 | 2 | 3;"));
        assert!(out.contains("  xs?: GridSize;"));
        assert!(out.contains("  sm?: GridSize;"));
    }

    #[test]
    fn references_use_internal_names_in_internal_variant() {
        let mut registry = Registry::new();
        registry
            .define("Base", || {
                obj([
                    prop("id", string()),
                    prop("multiPageIndex", integer().optional()).only_in(Variant::Internal),
                ])
            })
            .unwrap()
            .define("Holder", || obj([prop("base", reference("Base"))]))
            .unwrap();

        let out = emit(&registry);
        assert!(out.contains("export interface Holder {\n  base: Base;\n}"));
        assert!(out.contains("export interface HolderInternal {\n  base: BaseInternal;\n}"));
    }

    #[test]
    fn nested_definitions_are_hoisted_before_use_order() {
        let mut registry = Registry::new();
        registry
            .define("Outer", || obj([prop("inner", reference("Inner"))]))
            .unwrap()
            .define("Inner", || obj([prop("x", number())]))
            .unwrap();

        let out = emit(&registry);
        let outer = out.find("export interface Outer").unwrap();
        let inner = out.find("export interface Inner").unwrap();
        assert!(outer < inner);
        assert_eq!(out.matches("export interface Inner").count(), 1);
    }

    #[test]
    fn self_referencing_definition_terminates() {
        let mut registry = Registry::new();
        registry
            .define("Tree", || obj([prop("children", arr(reference("Tree")).optional())]))
            .unwrap();
        let out = emit(&registry);
        assert!(out.contains("children?: Tree[];"));
    }

    #[test]
    fn real_enum_and_literal_union() {
        let mut registry = Registry::new();
        registry
            .define("LayoutStyle", || {
                enumeration(["column", "row", "table"]).real_enum(pascal_case)
            })
            .unwrap()
            .define("Sort", || enumeration(["asc", "desc"]))
            .unwrap();

        let out = emit(&registry);
        assert!(out.contains(
            "export enum LayoutStyle {\n  Column = 'column',\n  Row = 'row',\n  Table = 'table',\n}"
        ));
        assert!(out.contains("export type Sort = 'asc' | 'desc';"));
    }

    #[test]
    fn jsdoc_carries_metadata() {
        let mut registry = Registry::new();
        registry
            .define("Page", || {
                obj([prop(
                    "hidden",
                    boolean()
                        .title("Hidden")
                        .description("Hide the page")
                        .optional_with(false),
                )])
                .title("Page")
            })
            .unwrap();

        let out = emit(&registry);
        assert!(out.contains("/**\n * Page\n */\nexport interface Page"));
        assert!(out.contains(
            "  /**\n   * Hidden\n   *\n   * Hide the page\n   * @default false\n   */\n  hidden?: boolean;"
        ));
    }

    #[test]
    fn raw_import_and_linked() {
        let mut registry = Registry::new();
        registry
            .define("Layout", || {
                obj([
                    prop(
                        "layout",
                        arr(raw()
                            .emit_declaration(|| "CompExternal".to_string())
                            .emit_schema(|| serde_json::json!({ "$ref": "#/definitions/Any" }))),
                    ),
                    prop(
                        "cell",
                        linked(import("GridComponent", "src/layout/Grid/types"), obj([])),
                    ),
                ])
            })
            .unwrap();

        let out = emit(&registry);
        assert!(out.starts_with("import type { GridComponent } from 'src/layout/Grid/types';\n"));
        assert!(out.contains("layout: (CompExternal)[];"));
        assert!(out.contains("cell: GridComponent;"));
    }

    #[test]
    fn raw_without_declaration_emitter_fails() {
        let mut registry = Registry::new();
        registry
            .define("Opaque", || obj([prop("x", raw().emit_schema(|| serde_json::json!({})))]))
            .unwrap();
        let err = emit_declarations(&registry, &DeclarationOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            GenError::MissingRawBackend { definition, backend: Backend::Declarations } if definition == "Opaque"
        ));
    }

    #[test]
    fn additional_properties_become_index_signatures() {
        let mut registry = Registry::new();
        registry
            .define("Mapping", || obj([]).additional_properties(string()))
            .unwrap()
            .define("Open", || obj([prop("id", string())]).allow_additional_properties())
            .unwrap()
            .define("Empty", || obj([]))
            .unwrap();

        let out = emit(&registry);
        assert!(out.contains("export interface Mapping {\n  [key: string]: string;\n}"));
        assert!(out.contains("  [key: string]: unknown;"));
        assert!(out.contains("export interface Empty {}"));
    }

    #[test]
    fn custom_suffix_preamble_and_header() {
        let mut registry = Registry::new();
        registry
            .define("Example", || obj([prop("b", string()).only_in(Variant::Internal)]))
            .unwrap();
        let options = DeclarationOptions::default()
            .internal_suffix("Resolved")
            .preamble("import type { Expr } from './expr';");
        let out = emit_declarations(&registry, &options).unwrap();
        assert!(out.starts_with("// This file is generated. Do not edit.\n"));
        assert!(out.contains("import type { Expr } from './expr';"));
        assert!(out.contains("export interface ExampleResolved"));
    }

    #[test]
    fn property_keys_quoted_when_needed() {
        assert_eq!(property_key("$schema"), "$schema");
        assert_eq!(property_key("data-id"), "'data-id'");
        assert_eq!(property_key("1st"), "'1st'");
        assert_eq!(property_key("it's"), "'it\\'s'");
        assert_eq!(property_key("dir\\"), "'dir\\\\'");
    }

    #[test]
    fn reference_to_emptied_definition_is_left_out() {
        let mut registry = Registry::new();
        registry
            .define("Hidden", || arr(string().only_in(Variant::Internal)))
            .unwrap()
            .define("Holder", || obj([prop("h", reference("Hidden").optional())]))
            .unwrap();

        let out = emit(&registry);
        assert!(out.contains("export interface Holder {}"));
        assert!(out.contains("export interface HolderInternal {\n  h?: HiddenInternal;\n}"));
        assert!(out.contains("export type HiddenInternal = string[];"));
        assert!(!out.contains("never"));
    }

    #[test]
    fn internal_only_definition_has_no_external_declaration() {
        let mut registry = Registry::new();
        registry
            .define("Hierarchy", || obj([prop("depth", integer())]).only_in(Variant::Internal))
            .unwrap();
        let out = emit(&registry);
        assert!(out.contains("export interface HierarchyInternal"));
        assert!(!out.contains("export interface Hierarchy {"));
    }
}
