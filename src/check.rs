//! Construction checks run on a freshly built definition, before it is cached.

use std::collections::HashSet;

use regex::Regex;
use serde_json::Value;

use crate::error::GenError;
use crate::node::{AdditionalProperties, NodeKind, SchemaNode};
use crate::types::json_type_name;

/// Check a definition's node tree for construction errors.
///
/// # Errors
///
/// Returns `GenError::Construction` naming the definition and the path of the
/// first offending node.
pub fn check_definition(definition: &str, node: &SchemaNode) -> Result<(), GenError> {
    check_node(node, "").map_err(|(path, message)| GenError::Construction {
        definition: definition.to_string(),
        path: if path.is_empty() { "/".to_string() } else { path },
        message,
    })
}

type CheckResult = Result<(), (String, String)>;

fn check_node(node: &SchemaNode, path: &str) -> CheckResult {
    if let Some(misuse) = node.misuse.first() {
        return Err((path.to_string(), misuse.clone()));
    }

    let pattern = match &node.meta.pattern {
        Some(p) => Some(
            Regex::new(p)
                .map_err(|e| (format!("{}/pattern", path), format!("invalid pattern: {}", e)))?,
        ),
        None => None,
    };

    if let Some(default) = node.default_value() {
        if let Err(why) = default_compatible(node, pattern.as_ref(), default) {
            return Err((format!("{}/default", path), why));
        }
    }

    match &node.kind {
        NodeKind::Object(o) => {
            let mut seen = HashSet::new();
            for p in &o.properties {
                if !seen.insert(p.name.as_str()) {
                    return Err((
                        format!("{}/properties", path),
                        format!("duplicate property '{}'", p.name),
                    ));
                }
                check_node(&p.value, &format!("{}/properties/{}", path, p.name))?;
            }
            if let AdditionalProperties::Schema(schema) = &o.additional {
                check_node(schema, &format!("{}/additionalProperties", path))?;
            }
            for (i, parent) in o.extends.iter().enumerate() {
                let parent_path = format!("{}/extends/{}", path, i);
                match &parent.kind {
                    NodeKind::Object(_) | NodeKind::Reference(_) => check_node(parent, &parent_path)?,
                    other => {
                        return Err((
                            parent_path,
                            format!("can only extend objects or references, not {}", other.name()),
                        ))
                    }
                }
            }
        }
        NodeKind::Array(item) => check_node(item, &format!("{}/items", path))?,
        NodeKind::Union(members) => {
            for (i, member) in members.iter().enumerate() {
                check_node(member, &format!("{}/anyOf/{}", path, i))?;
            }
        }
        NodeKind::Enum(e) => {
            if let Some(bad) = e.values.iter().find(|v| !v.is_enum_member()) {
                return Err((
                    format!("{}/enum", path),
                    format!("enum members must be strings or numbers, got {}", bad.type_name()),
                ));
            }
        }
        NodeKind::Linked {
            declaration,
            schema,
        } => {
            check_node(declaration, &format!("{}/declaration", path))?;
            check_node(schema, &format!("{}/schema", path))?;
        }
        NodeKind::Const(_)
        | NodeKind::String
        | NodeKind::Number
        | NodeKind::Integer
        | NodeKind::Boolean
        | NodeKind::Null
        | NodeKind::Reference(_)
        | NodeKind::Raw(_)
        | NodeKind::Import(_) => {}
    }

    Ok(())
}

/// Whether `value` can be represented by `node`.
///
/// References, raw, import and linked nodes are opaque here and accept any default.
fn default_compatible(node: &SchemaNode, pattern: Option<&Regex>, value: &Value) -> Result<(), String> {
    let ok = match &node.kind {
        NodeKind::String => match value.as_str() {
            Some(s) => {
                if let Some(re) = pattern {
                    if !re.is_match(s) {
                        return Err(format!("default \"{}\" does not match pattern {}", s, re));
                    }
                }
                true
            }
            None => false,
        },
        NodeKind::Number => value.is_number(),
        NodeKind::Integer => {
            value.is_i64()
                || value.is_u64()
                || value.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
        }
        NodeKind::Boolean => value.is_boolean(),
        NodeKind::Null => value.is_null(),
        NodeKind::Const(lit) => lit.matches(value),
        NodeKind::Enum(e) => e.values.iter().any(|v| v.matches(value)),
        NodeKind::Object(_) => value.is_object(),
        NodeKind::Array(_) => value.is_array(),
        NodeKind::Union(members) => members.iter().any(|m| {
            let member_pattern = m.meta.pattern.as_deref().and_then(|p| Regex::new(p).ok());
            default_compatible(m, member_pattern.as_ref(), value).is_ok()
        }),
        NodeKind::Reference(_) | NodeKind::Raw(_) | NodeKind::Import(_) | NodeKind::Linked { .. } => true,
    };

    if ok {
        Ok(())
    } else {
        Err(format!(
            "default {} ({}) is not a valid {}",
            value,
            json_type_name(value),
            node.kind.name()
        ))
    }
}
