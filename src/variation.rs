//! Variation-difference detection.
//!
//! Decides whether a definition needs one declaration or two. A definition
//! differs when any node reachable from it is variant-restricted, or when its
//! Internal and External projections are structurally unequal.
//!
//! The check follows references into other definitions. A definition already
//! being checked further up the stack counts as "no difference", which keeps
//! cyclic reference graphs finite.

use serde::Serialize;

use crate::node::{AdditionalProperties, NodeKind, SchemaNode};
use crate::project::project_definition;
use crate::registry::Registry;
use crate::types::Variant;

/// Whether the named definition's Internal and External shapes differ.
///
/// Total: unknown names and broken definitions count as "no difference"; the
/// backends report those errors when they emit the definition.
pub fn contains_variation_differences(registry: &Registry, name: &str) -> bool {
    definition_differs(registry, name).differs
}

/// Whether an anonymous node differs between variants.
pub fn node_contains_variation_differences(registry: &Registry, node: &SchemaNode) -> bool {
    walk(registry, node).differs
}

#[derive(Debug, Clone, Copy, Default)]
struct Outcome {
    differs: bool,
    /// An in-progress definition was treated as "no difference".
    short_circuited: bool,
}

impl Outcome {
    const DIFFERS: Outcome = Outcome {
        differs: true,
        short_circuited: false,
    };

    fn merge(&mut self, other: Outcome) {
        self.differs |= other.differs;
        self.short_circuited |= other.short_circuited;
    }
}

fn definition_differs(registry: &Registry, name: &str) -> Outcome {
    let memo = registry.variation.borrow().get(name).copied();
    if let Some(differs) = memo {
        return Outcome {
            differs,
            short_circuited: false,
        };
    }
    if registry.checking.borrow().contains(name) {
        return Outcome {
            differs: false,
            short_circuited: true,
        };
    }
    let Ok(node) = registry.resolve(name) else {
        return Outcome::default();
    };

    registry.checking.borrow_mut().insert(name.to_string());
    let mut outcome = walk(registry, &node);
    if !outcome.differs {
        outcome.differs = projections_differ(registry, name);
    }
    registry.checking.borrow_mut().remove(name);

    // A "false" that leaned on an in-progress definition may be revised once
    // that definition finishes; only remember conclusive answers.
    if outcome.differs || !outcome.short_circuited {
        registry
            .variation
            .borrow_mut()
            .insert(name.to_string(), outcome.differs);
    }
    outcome
}

fn walk(registry: &Registry, node: &SchemaNode) -> Outcome {
    if node.restriction.is_restricted() {
        return Outcome::DIFFERS;
    }

    let mut outcome = Outcome::default();
    match &node.kind {
        NodeKind::Object(o) => {
            for p in &o.properties {
                if p.restriction.is_restricted() {
                    return Outcome::DIFFERS;
                }
                outcome.merge(walk(registry, &p.value));
                if outcome.differs {
                    return outcome;
                }
            }
            if let AdditionalProperties::Schema(schema) = &o.additional {
                outcome.merge(walk(registry, schema));
            }
            for parent in &o.extends {
                if outcome.differs {
                    break;
                }
                outcome.merge(walk(registry, parent));
            }
        }
        NodeKind::Array(item) => outcome.merge(walk(registry, item)),
        NodeKind::Union(members) => {
            for member in members {
                outcome.merge(walk(registry, member));
                if outcome.differs {
                    break;
                }
            }
        }
        NodeKind::Linked {
            declaration,
            schema,
        } => {
            outcome.merge(walk(registry, declaration));
            if !outcome.differs {
                outcome.merge(walk(registry, schema));
            }
        }
        NodeKind::Reference(name) => outcome.merge(definition_differs(registry, name)),
        NodeKind::Enum(_)
        | NodeKind::Const(_)
        | NodeKind::String
        | NodeKind::Number
        | NodeKind::Integer
        | NodeKind::Boolean
        | NodeKind::Null
        | NodeKind::Raw(_)
        | NodeKind::Import(_) => {}
    }
    outcome
}

fn projections_differ(registry: &Registry, name: &str) -> bool {
    match (
        project_definition(registry, name, Variant::Internal),
        project_definition(registry, name, Variant::External),
    ) {
        (Ok(internal), Ok(external)) => internal != external,
        _ => false,
    }
}

/// One line of a variation report.
#[derive(Debug, Clone, Serialize)]
pub struct VariationEntry {
    pub name: String,
    pub differs: bool,
    /// Top-level properties present only in the Internal shape.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub internal_only: Vec<String>,
    /// Top-level properties present only in the External shape.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub external_only: Vec<String>,
}

/// Variation status of every registered definition, in registration order.
pub fn variation_report(registry: &Registry) -> Vec<VariationEntry> {
    registry
        .names()
        .map(|name| {
            let differs = contains_variation_differences(registry, name);
            let (internal_only, external_only) = if differs {
                property_difference(registry, name)
            } else {
                (Vec::new(), Vec::new())
            };
            VariationEntry {
                name: name.to_string(),
                differs,
                internal_only,
                external_only,
            }
        })
        .collect()
}

fn property_difference(registry: &Registry, name: &str) -> (Vec<String>, Vec<String>) {
    let names_in = |variant| -> Vec<String> {
        match project_definition(registry, name, variant) {
            Ok(Some(node)) => node
                .as_object()
                .map(|o| o.properties.iter().map(|p| p.name.clone()).collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    };
    let internal = names_in(Variant::Internal);
    let external = names_in(Variant::External);
    (
        internal
            .iter()
            .filter(|n| !external.contains(*n))
            .cloned()
            .collect(),
        external
            .iter()
            .filter(|n| !internal.contains(*n))
            .cloned()
            .collect(),
    )
}
