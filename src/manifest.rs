//! Definition manifests - JSON files that register definitions without code.
//!
//! ```json
//! {
//!   "definitions": {
//!     "GridSize": { "kind": "union", "members": [
//!       { "kind": "const", "value": "auto" },
//!       { "kind": "enum", "values": [1, 2, 3] }
//!     ]},
//!     "Grid": { "kind": "object", "properties": [
//!       { "name": "xs", "value": { "kind": "ref", "name": "GridSize", "optional": true } },
//!       { "name": "baseId", "value": { "kind": "string" }, "onlyIn": "internal" }
//!     ]}
//!   }
//! }
//! ```
//!
//! Every node is tagged by `kind` and may carry the metadata keys `title`,
//! `description`, `examples`, `deprecated`, `comment`, `pattern`, `optional`,
//! `default` and `onlyIn`. Misplaced metadata is reported when the definition
//! is built, just like for definitions written in code.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::LoadError;
use crate::node::{self, pascal_case, Property, SchemaNode};
use crate::registry::Registry;
use crate::types::{Literal, Variant};

#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub definitions: IndexMap<String, NodeDoc>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDoc {
    #[serde(flatten)]
    pub kind: KindDoc,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub examples: Vec<Value>,
    pub deprecated: Option<String>,
    pub comment: Option<String>,
    pub pattern: Option<String>,
    #[serde(default)]
    pub optional: bool,
    pub default: Option<Value>,
    pub only_in: Option<Variant>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum KindDoc {
    Object {
        #[serde(default)]
        properties: Vec<PropertyDoc>,
        #[serde(default)]
        extends: Vec<NodeDoc>,
        #[serde(default, rename = "additionalProperties")]
        additional_properties: Option<AdditionalDoc>,
    },
    Array {
        items: Box<NodeDoc>,
    },
    Union {
        members: Vec<NodeDoc>,
    },
    Enum {
        values: Vec<Literal>,
        #[serde(default, rename = "realEnum")]
        real_enum: bool,
    },
    Const {
        value: Literal,
    },
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Ref {
        name: String,
    },
    Raw {
        declaration: Option<String>,
        schema: Option<Value>,
    },
    Import {
        import: String,
        from: String,
    },
    Linked {
        declaration: Box<NodeDoc>,
        schema: Box<NodeDoc>,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AdditionalDoc {
    Allowed(bool),
    Schema(Box<NodeDoc>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyDoc {
    pub name: String,
    pub value: NodeDoc,
    pub only_in: Option<Variant>,
}

impl NodeDoc {
    /// Build the node this document describes.
    pub fn to_node(&self) -> SchemaNode {
        let mut out = match &self.kind {
            KindDoc::Object {
                properties,
                extends,
                additional_properties,
            } => {
                let mut object = node::obj(properties.iter().map(PropertyDoc::to_property));
                for parent in extends {
                    object = object.extends(parent.to_node());
                }
                match additional_properties {
                    Some(AdditionalDoc::Allowed(true)) => object.allow_additional_properties(),
                    Some(AdditionalDoc::Schema(schema)) => object.additional_properties(schema.to_node()),
                    Some(AdditionalDoc::Allowed(false)) | None => object,
                }
            }
            KindDoc::Array { items } => node::arr(items.to_node()),
            KindDoc::Union { members } => node::union(members.iter().map(NodeDoc::to_node)),
            KindDoc::Enum { values, real_enum } => {
                let e = node::enumeration(values.iter().cloned());
                if *real_enum {
                    e.real_enum(pascal_case)
                } else {
                    e
                }
            }
            KindDoc::Const { value } => node::constant(value.clone()),
            KindDoc::String => node::string(),
            KindDoc::Number => node::number(),
            KindDoc::Integer => node::integer(),
            KindDoc::Boolean => node::boolean(),
            KindDoc::Null => node::null(),
            KindDoc::Ref { name } => node::reference(name.clone()),
            KindDoc::Raw {
                declaration,
                schema,
            } => {
                let mut raw = node::raw();
                if let Some(text) = declaration.clone() {
                    raw = raw.emit_declaration(move || text.clone());
                }
                if let Some(schema) = schema.clone() {
                    raw = raw.emit_schema(move || schema.clone());
                }
                raw
            }
            KindDoc::Import { import, from } => node::import(import.clone(), from.clone()),
            KindDoc::Linked {
                declaration,
                schema,
            } => node::linked(declaration.to_node(), schema.to_node()),
        };

        if let Some(title) = &self.title {
            out = out.title(title.clone());
        }
        if let Some(description) = &self.description {
            out = out.description(description.clone());
        }
        for example in &self.examples {
            out = out.example(example.clone());
        }
        if let Some(note) = &self.deprecated {
            out = out.deprecated(note.clone());
        }
        if let Some(comment) = &self.comment {
            out = out.comment(comment.clone());
        }
        if let Some(pattern) = &self.pattern {
            out = out.pattern(pattern.clone());
        }
        match &self.default {
            Some(default) => out = out.optional_with(default.clone()),
            None if self.optional => out = out.optional(),
            None => {}
        }
        if let Some(variant) = self.only_in {
            out = out.only_in(variant);
        }
        out
    }
}

impl PropertyDoc {
    fn to_property(&self) -> Property {
        let p = node::prop(self.name.clone(), self.value.to_node());
        match self.only_in {
            Some(variant) => p.only_in(variant),
            None => p,
        }
    }
}

impl Manifest {
    /// Register every definition, in manifest order.
    pub fn into_registry(self) -> Result<Registry, LoadError> {
        let mut registry = Registry::new();
        for (name, doc) in self.definitions {
            registry.define(name, move || doc.to_node())?;
        }
        Ok(registry)
    }
}

/// Load a manifest file into a fresh registry.
///
/// Definitions are built lazily; construction errors surface when the
/// registry resolves them.
///
/// # Errors
///
/// Returns `LoadError::FileNotFound` if the file doesn't exist, or
/// `LoadError::InvalidManifest` if it isn't a valid manifest.
pub fn load_manifest(path: &Path) -> Result<Registry, LoadError> {
    if !path.exists() {
        return Err(LoadError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|source| LoadError::ReadError {
        path: path.to_path_buf(),
        source,
    })?;

    load_manifest_str(&content)
}

/// Load a manifest from a JSON string.
pub fn load_manifest_str(content: &str) -> Result<Registry, LoadError> {
    let manifest: Manifest =
        serde_json::from_str(content).map_err(|source| LoadError::InvalidManifest { source })?;
    manifest.into_registry()
}
