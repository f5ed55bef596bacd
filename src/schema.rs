//! Schema backend - emits a JSON Schema (draft-07) document.
//!
//! The document always reflects the External variant. Named definitions live
//! once under the definitions container and are referenced with `$ref`;
//! anonymous nodes are inlined.

use indexmap::IndexMap;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::GenError;
use crate::node::{AdditionalProperties, NodeKind, SchemaNode};
use crate::project::{project, project_definition};
use crate::registry::Registry;
use crate::types::{Backend, Variant};

pub const DRAFT_07: &str = "http://json-schema.org/draft-07/schema#";

/// Name of the container holding named definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DefinitionsKey {
    /// `definitions`, as draft-07 documents use.
    #[default]
    Definitions,
    /// `$defs`, as 2019-09 and later use.
    Defs,
}

impl DefinitionsKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            DefinitionsKey::Definitions => "definitions",
            DefinitionsKey::Defs => "$defs",
        }
    }

    /// `$ref` target for a named definition.
    pub fn pointer(&self, name: &str) -> String {
        format!("#/{}/{}", self.as_str(), name)
    }
}

/// Options for the schema backend.
#[derive(Debug, Clone, Default)]
pub struct SchemaOptions {
    /// Definition the document's root `$ref` points at.
    pub root: Option<String>,
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub definitions_key: DefinitionsKey,
}

impl SchemaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn definitions_key(mut self, key: DefinitionsKey) -> Self {
        self.definitions_key = key;
        self
    }
}

/// Emit the schema document for every registered definition.
///
/// Definitions that do not exist in the External variant are left out.
///
/// # Errors
///
/// Returns the first construction, resolution or emission error, or
/// `GenError::UnknownDefinition` when the root is not an External definition.
pub fn emit_schema(registry: &Registry, options: &SchemaOptions) -> Result<Value, GenError> {
    let names: Vec<&str> = registry.names().collect();
    emit_schema_for(registry, &names, options)
}

/// Emit a schema document holding `names` and every definition they reference.
pub fn emit_schema_for(
    registry: &Registry,
    names: &[&str],
    options: &SchemaOptions,
) -> Result<Value, GenError> {
    let mut emitter = SchemaEmitter::new(registry, options.definitions_key);
    for name in names {
        emitter.ensure(name)?;
    }
    if let Some(root) = &options.root {
        if !emitter.ensure(root)? {
            return Err(GenError::AbsentInVariant {
                definition: "schema root".to_string(),
                missing: root.clone(),
                variant: Variant::External,
            });
        }
    }

    let mut doc = Map::new();
    doc.insert("$schema".into(), json!(DRAFT_07));
    if let Some(id) = &options.id {
        doc.insert("$id".into(), json!(id));
    }
    if let Some(title) = &options.title {
        doc.insert("title".into(), json!(title));
    }
    if let Some(description) = &options.description {
        doc.insert("description".into(), json!(description));
    }
    if let Some(root) = &options.root {
        doc.insert("$ref".into(), json!(options.definitions_key.pointer(root)));
    }
    doc.insert(
        options.definitions_key.as_str().into(),
        Value::Object(emitter.finish()),
    );
    Ok(Value::Object(doc))
}

/// Schema for an anonymous node declared in `definition`, External variant.
///
/// References inside the node point into the container named by `key`; pair
/// the result with the container from [`emit_schema`] to make it standalone.
/// Returns `None` when the node does not exist in the External variant.
pub fn node_schema(
    registry: &Registry,
    definition: &str,
    node: &SchemaNode,
    key: DefinitionsKey,
) -> Result<Option<Value>, GenError> {
    let Some(projected) = project(registry, definition, node, Variant::External)? else {
        return Ok(None);
    };
    let mut emitter = SchemaEmitter::new(registry, key);
    emitter.definition = definition.to_string();
    emitter.node(&projected).map(Some)
}

struct SchemaEmitter<'r> {
    registry: &'r Registry,
    key: DefinitionsKey,
    /// Definition name to schema. `None` while the schema is being written.
    definitions: IndexMap<String, Option<Value>>,
    definition: String,
}

impl<'r> SchemaEmitter<'r> {
    fn new(registry: &'r Registry, key: DefinitionsKey) -> Self {
        Self {
            registry,
            key,
            definitions: IndexMap::new(),
            definition: String::new(),
        }
    }

    /// Emit `name` into the container once. Returns false if it has no
    /// External shape.
    fn ensure(&mut self, name: &str) -> Result<bool, GenError> {
        if self.definitions.contains_key(name) {
            return Ok(true);
        }
        let Some(projected) = project_definition(self.registry, name, Variant::External)? else {
            return Ok(false);
        };

        debug!(definition = name, "emitting schema");
        self.definitions.insert(name.to_string(), None);
        let outer = std::mem::replace(&mut self.definition, name.to_string());
        let schema = self.node(&projected);
        self.definition = outer;
        self.definitions.insert(name.to_string(), Some(schema?));
        Ok(true)
    }

    fn node(&mut self, node: &SchemaNode) -> Result<Value, GenError> {
        let mut out = Map::new();
        if let Some(title) = &node.meta.title {
            out.insert("title".into(), json!(title));
        }
        if let Some(description) = &node.meta.description {
            out.insert("description".into(), json!(description));
        }

        match &node.kind {
            NodeKind::Object(o) => {
                out.insert("type".into(), json!("object"));
                let mut properties = Map::new();
                let mut required = Vec::new();
                for p in &o.properties {
                    properties.insert(p.name.clone(), self.node(&p.value)?);
                    if !p.is_optional() {
                        required.push(json!(p.name));
                    }
                }
                if !properties.is_empty() {
                    out.insert("properties".into(), Value::Object(properties));
                }
                if !required.is_empty() {
                    out.insert("required".into(), Value::Array(required));
                }
                let additional = match &o.additional {
                    AdditionalProperties::Forbidden => json!(false),
                    AdditionalProperties::Allowed => json!(true),
                    AdditionalProperties::Schema(schema) => self.node(schema)?,
                };
                out.insert("additionalProperties".into(), additional);
            }
            NodeKind::Array(item) => {
                out.insert("type".into(), json!("array"));
                out.insert("items".into(), self.node(item)?);
            }
            NodeKind::Union(members) => {
                let mut any_of = Vec::with_capacity(members.len());
                for member in members {
                    any_of.push(self.node(member)?);
                }
                out.insert("anyOf".into(), Value::Array(any_of));
            }
            NodeKind::Enum(e) => {
                let values = e.values.iter().map(|v| v.to_value()).collect();
                out.insert("enum".into(), Value::Array(values));
            }
            NodeKind::Const(lit) => {
                out.insert("const".into(), lit.to_value());
            }
            NodeKind::String => {
                out.insert("type".into(), json!("string"));
                if let Some(pattern) = &node.meta.pattern {
                    out.insert("pattern".into(), json!(pattern));
                }
            }
            NodeKind::Number => {
                out.insert("type".into(), json!("number"));
            }
            NodeKind::Integer => {
                out.insert("type".into(), json!("integer"));
            }
            NodeKind::Boolean => {
                out.insert("type".into(), json!("boolean"));
            }
            NodeKind::Null => {
                out.insert("type".into(), json!("null"));
            }
            NodeKind::Reference(name) => {
                if !self.ensure(name)? {
                    return Err(GenError::AbsentInVariant {
                        definition: self.definition.clone(),
                        missing: name.clone(),
                        variant: Variant::External,
                    });
                }
                out.insert("$ref".into(), json!(self.key.pointer(name)));
            }
            NodeKind::Raw(raw) => {
                let schema = raw.schema().ok_or_else(|| GenError::MissingRawBackend {
                    definition: self.definition.clone(),
                    backend: Backend::Schema,
                })?;
                match schema {
                    Value::Object(fields) => out.extend(fields),
                    other => return Ok(other),
                }
            }
            NodeKind::Import(_) => {
                return Err(GenError::Unsupported {
                    definition: self.definition.clone(),
                    kind: "import",
                    backend: Backend::Schema,
                })
            }
            NodeKind::Linked { schema, .. } => {
                if let Value::Object(fields) = self.node(schema)? {
                    out.extend(fields);
                }
            }
        }

        if !node.meta.examples.is_empty() {
            out.insert("examples".into(), Value::Array(node.meta.examples.clone()));
        }
        if let Some(default) = node.default_value() {
            out.insert("default".into(), default.clone());
        }
        if node.meta.deprecated.is_some() {
            out.insert("deprecated".into(), json!(true));
        }
        Ok(Value::Object(out))
    }

    fn finish(self) -> Map<String, Value> {
        self.definitions
            .into_iter()
            .filter_map(|(name, schema)| schema.map(|s| (name, s)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::*;

    #[test]
    fn internal_only_property_never_in_schema() {
        let mut registry = Registry::new();
        registry
            .define("Example", || {
                obj([
                    prop("a", string()),
                    prop("b", string().optional()).only_in(Variant::Internal),
                ])
            })
            .unwrap();

        let doc = emit_schema(&registry, &SchemaOptions::new()).unwrap();
        assert_eq!(
            doc["definitions"]["Example"],
            json!({
                "type": "object",
                "properties": { "a": { "type": "string" } },
                "required": ["a"],
                "additionalProperties": false
            })
        );
    }

    #[test]
    fn grid_extends_styling_with_shared_size() {
        let mut registry = Registry::new();
        registry
            .define("GridSize", || union([constant("auto"), enumeration(1..=12)]))
            .unwrap()
            .define("GridStyling", || {
                obj([
                    prop("xs", reference("GridSize").optional_with("auto")),
                    prop("sm", reference("GridSize").optional_with("auto")),
                ])
            })
            .unwrap()
            .define("Grid", || obj([]).extends(reference("GridStyling")))
            .unwrap();

        let doc = emit_schema(&registry, &SchemaOptions::new()).unwrap();
        let grid = &doc["definitions"]["Grid"];
        assert_eq!(grid["properties"]["xs"]["$ref"], "#/definitions/GridSize");
        assert_eq!(grid["properties"]["sm"]["$ref"], "#/definitions/GridSize");
        assert_eq!(grid["properties"]["xs"]["default"], "auto");
        assert!(grid.get("required").is_none());

        let size = &doc["definitions"]["GridSize"];
        assert_eq!(size["anyOf"][0], json!({ "const": "auto" }));
        assert_eq!(size["anyOf"][1]["enum"].as_array().unwrap().len(), 12);
        assert_eq!(doc["definitions"].as_object().unwrap().len(), 3);
    }

    #[test]
    fn document_header_and_root() {
        let mut registry = Registry::new();
        registry.define("Layout", || obj([prop("id", string())])).unwrap();
        let options = SchemaOptions::new()
            .root("Layout")
            .id("https://example.com/layout.schema.v1.json")
            .title("Layout")
            .definitions_key(DefinitionsKey::Defs);

        let doc = emit_schema(&registry, &options).unwrap();
        assert_eq!(doc["$schema"], DRAFT_07);
        assert_eq!(doc["$id"], "https://example.com/layout.schema.v1.json");
        assert_eq!(doc["$ref"], "#/$defs/Layout");
        assert!(doc["$defs"]["Layout"].is_object());
        assert!(doc.get("definitions").is_none());
    }

    #[test]
    fn unknown_root_is_rejected() {
        let registry = Registry::new();
        let err = emit_schema(&registry, &SchemaOptions::new().root("Nope")).unwrap_err();
        assert!(matches!(err, GenError::UnknownDefinition { missing, .. } if missing == "Nope"));
    }

    #[test]
    fn internal_only_definition_left_out() {
        let mut registry = Registry::new();
        registry
            .define("Hierarchy", || obj([]).only_in(Variant::Internal))
            .unwrap()
            .define("Page", || obj([]))
            .unwrap();
        let doc = emit_schema(&registry, &SchemaOptions::new()).unwrap();
        let defs = doc["definitions"].as_object().unwrap();
        assert!(defs.contains_key("Page"));
        assert!(!defs.contains_key("Hierarchy"));
    }

    #[test]
    fn metadata_keywords() {
        let mut registry = Registry::new();
        registry
            .define("Settings", || {
                obj([
                    prop(
                        "receiptLayoutName",
                        string()
                            .title("Receipt layout")
                            .deprecated("use a custom receipt instead")
                            .optional(),
                    ),
                    prop("width", string().pattern("^([0-9]{1,2}%|100%|auto)$").optional_with("auto")),
                    prop("levels", arr(integer()).example(json!([2, 3]))),
                ])
                .description("Layout settings")
            })
            .unwrap();

        let doc = emit_schema(&registry, &SchemaOptions::new()).unwrap();
        let s = &doc["definitions"]["Settings"];
        assert_eq!(s["description"], "Layout settings");
        assert_eq!(s["properties"]["receiptLayoutName"]["deprecated"], true);
        assert_eq!(s["properties"]["width"]["pattern"], "^([0-9]{1,2}%|100%|auto)$");
        assert_eq!(s["properties"]["width"]["default"], "auto");
        assert_eq!(s["properties"]["levels"]["examples"], json!([[2, 3]]));
        assert_eq!(s["required"], json!(["levels"]));
    }

    #[test]
    fn additional_properties_forms() {
        let mut registry = Registry::new();
        registry
            .define("Mapping", || obj([]).additional_properties(string()))
            .unwrap()
            .define("Open", || obj([]).allow_additional_properties())
            .unwrap();
        let doc = emit_schema(&registry, &SchemaOptions::new()).unwrap();
        assert_eq!(
            doc["definitions"]["Mapping"]["additionalProperties"],
            json!({ "type": "string" })
        );
        assert_eq!(doc["definitions"]["Open"]["additionalProperties"], true);
    }

    #[test]
    fn raw_linked_and_import() {
        let mut registry = Registry::new();
        registry
            .define("Layout", || {
                obj([
                    prop(
                        "layout",
                        arr(raw()
                            .emit_declaration(|| "CompExternal".to_string())
                            .emit_schema(|| json!({ "$ref": "#/definitions/AnyComponent" }))),
                    ),
                    prop(
                        "cell",
                        linked(import("GridComponent", "src/layout/Grid/types"), reference("Cell")),
                    ),
                ])
            })
            .unwrap()
            .define("Cell", || obj([prop("text", string())]))
            .unwrap();

        let doc = emit_schema(&registry, &SchemaOptions::new()).unwrap();
        let layout = &doc["definitions"]["Layout"];
        assert_eq!(layout["properties"]["layout"]["items"]["$ref"], "#/definitions/AnyComponent");
        assert_eq!(layout["properties"]["cell"]["$ref"], "#/definitions/Cell");
    }

    #[test]
    fn bare_import_is_unsupported() {
        let mut registry = Registry::new();
        registry
            .define("Ext", || obj([prop("x", import("Thing", "./thing"))]))
            .unwrap();
        let err = emit_schema(&registry, &SchemaOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            GenError::Unsupported { definition, kind: "import", backend: Backend::Schema } if definition == "Ext"
        ));
    }

    #[test]
    fn raw_without_schema_emitter_fails() {
        let mut registry = Registry::new();
        registry
            .define("Opaque", || obj([prop("x", raw().emit_declaration(|| "X".to_string()))]))
            .unwrap();
        let err = emit_schema(&registry, &SchemaOptions::new()).unwrap_err();
        assert!(matches!(err, GenError::MissingRawBackend { backend: Backend::Schema, .. }));
    }

    #[test]
    fn partial_document_holds_only_reachable_definitions() {
        let mut registry = Registry::new();
        registry
            .define("Size", || enumeration([1, 2]))
            .unwrap()
            .define("Grid", || obj([prop("xs", reference("Size"))]))
            .unwrap()
            .define("Unrelated", || obj([prop("x", import("Thing", "./thing"))]))
            .unwrap();
        let doc = emit_schema_for(&registry, &["Grid"], &SchemaOptions::new().root("Grid")).unwrap();
        let defs = doc["definitions"].as_object().unwrap();
        assert_eq!(defs.keys().collect::<Vec<_>>(), vec!["Grid", "Size"]);
        assert_eq!(doc["$ref"], "#/definitions/Grid");
    }

    #[test]
    fn node_schema_inlines_anonymous_nodes() {
        let registry = Registry::new();
        let node = obj([
            prop("a", string()),
            prop("b", string()).only_in(Variant::Internal),
        ]);
        let schema = node_schema(&registry, "Inline", &node, DefinitionsKey::Definitions)
            .unwrap()
            .unwrap();
        assert_eq!(schema["required"], json!(["a"]));
        assert!(schema["properties"].get("b").is_none());
    }

    #[test]
    fn reference_to_emptied_definition_leaves_no_dangling_ref() {
        let mut registry = Registry::new();
        registry
            .define("Hidden", || arr(string().only_in(Variant::Internal)))
            .unwrap()
            .define("Holder", || obj([prop("h", reference("Hidden").optional())]))
            .unwrap();

        let doc = emit_schema(&registry, &SchemaOptions::new()).unwrap();
        assert!(doc["definitions"].get("Hidden").is_none());
        assert!(doc["definitions"]["Holder"].get("properties").is_none());
        assert!(jsonschema::validator_for(&doc).is_ok());
    }

    #[test]
    fn internal_only_root_is_rejected() {
        let mut registry = Registry::new();
        registry
            .define("Hierarchy", || obj([]).only_in(Variant::Internal))
            .unwrap();
        let err = emit_schema(&registry, &SchemaOptions::new().root("Hierarchy")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "'schema root' references 'Hierarchy', which has no external shape"
        );
    }
}
