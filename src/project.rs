//! Variant projection - filters a node tree down to one variant.
//!
//! Projection rebuilds the tree, so the source node stays untouched. Nodes and
//! properties whose restriction excludes the variant are dropped, `extends`
//! parents are flattened into their children, and every surviving node comes
//! out unrestricted.
//!
//! | Dropped node | Effect on parent |
//! |--------------|------------------|
//! | property value | property removed |
//! | union member | member removed; an empty union is dropped too |
//! | array item | array dropped |
//! | `additionalProperties` schema | becomes forbidden |
//! | reference to a definition with no projection | dropped like any other node |

use indexmap::IndexMap;

use crate::error::GenError;
use crate::node::{AdditionalProperties, NodeKind, ObjectNode, Property, SchemaNode};
use crate::registry::Registry;
use crate::types::{Variant, VariantRestriction};

/// Project a registered definition to `variant`.
///
/// Returns `Ok(None)` when the definition does not exist in that variant.
///
/// # Errors
///
/// Returns resolution errors for unknown references and `extends` errors
/// (cycles, collisions, non-object parents).
pub fn project_definition(
    registry: &Registry,
    name: &str,
    variant: Variant,
) -> Result<Option<SchemaNode>, GenError> {
    let node = registry.resolve(name)?;
    project(registry, name, &node, variant)
}

/// Project `node`, declared in `definition`, to `variant`.
pub fn project(
    registry: &Registry,
    definition: &str,
    node: &SchemaNode,
    variant: Variant,
) -> Result<Option<SchemaNode>, GenError> {
    let mut projector = Projector {
        registry,
        variant,
        definition: definition.to_string(),
        chain: vec![definition.to_string()],
    };
    projector.node(node)
}

struct Projector<'r> {
    registry: &'r Registry,
    variant: Variant,
    /// Definition currently being projected, for error messages.
    definition: String,
    /// Definitions being flattened through `extends`.
    chain: Vec<String>,
}

/// A property plus the index of the parent it came from (`None` for own properties).
type Merged = IndexMap<String, (Property, Option<usize>)>;

impl Projector<'_> {
    fn node(&mut self, node: &SchemaNode) -> Result<Option<SchemaNode>, GenError> {
        if !node.restriction.includes(self.variant) {
            return Ok(None);
        }

        let kind = match &node.kind {
            NodeKind::Object(o) => NodeKind::Object(self.object(o)?),
            NodeKind::Array(item) => match self.node(item)? {
                Some(item) => NodeKind::Array(Box::new(item)),
                None => return Ok(None),
            },
            NodeKind::Union(members) => {
                let mut kept = Vec::with_capacity(members.len());
                for member in members {
                    if let Some(m) = self.node(member)? {
                        kept.push(m);
                    }
                }
                if kept.is_empty() {
                    return Ok(None);
                }
                NodeKind::Union(kept)
            }
            NodeKind::Reference(name) => {
                if !self.target_exists(name)? {
                    return Ok(None);
                }
                NodeKind::Reference(name.clone())
            }
            NodeKind::Linked {
                declaration,
                schema,
            } => match (self.node(declaration)?, self.node(schema)?) {
                (Some(d), Some(s)) => NodeKind::Linked {
                    declaration: Box::new(d),
                    schema: Box::new(s),
                },
                _ => return Ok(None),
            },
            other => other.clone(),
        };

        Ok(Some(SchemaNode {
            kind,
            meta: node.meta.clone(),
            optionality: node.optionality.clone(),
            restriction: VariantRestriction::All,
            misuse: Vec::new(),
        }))
    }

    fn object(&mut self, o: &ObjectNode) -> Result<ObjectNode, GenError> {
        let mut merged: Merged = IndexMap::new();
        let mut inherited_additional = AdditionalProperties::Forbidden;

        for (i, parent) in o.extends.iter().enumerate() {
            let Some(parent) = self.parent(parent)? else {
                continue;
            };
            for p in parent.properties {
                let differs = match merged.get(&p.name) {
                    Some((existing, origin)) if *origin != Some(i) => Some(existing != &p),
                    _ => None,
                };
                match differs {
                    Some(true) => {
                        return Err(GenError::ExtendsCollision {
                            definition: self.definition.clone(),
                            property: p.name,
                        })
                    }
                    // Same shape from another parent (diamond); keep the first.
                    Some(false) => {}
                    None => {
                        merged.insert(p.name.clone(), (p, Some(i)));
                    }
                }
            }
            if parent.additional != AdditionalProperties::Forbidden {
                inherited_additional = parent.additional;
            }
        }

        // Own properties override inherited ones in place.
        for p in &o.properties {
            if !p.restriction.includes(self.variant) {
                continue;
            }
            if let Some(value) = self.node(&p.value)? {
                let property = Property {
                    name: p.name.clone(),
                    value,
                    restriction: VariantRestriction::All,
                };
                merged.insert(p.name.clone(), (property, None));
            }
        }

        let additional = match &o.additional {
            AdditionalProperties::Forbidden => inherited_additional,
            AdditionalProperties::Allowed => AdditionalProperties::Allowed,
            AdditionalProperties::Schema(schema) => match self.node(schema)? {
                Some(s) => AdditionalProperties::Schema(Box::new(s)),
                None => AdditionalProperties::Forbidden,
            },
        };

        Ok(ObjectNode {
            properties: merged.into_values().map(|(p, _)| p).collect(),
            additional,
            extends: Vec::new(),
        })
    }

    /// Whether the referenced definition has a projection in this variant.
    ///
    /// A definition whose check is already in progress counts as present, so
    /// reference cycles terminate. A "missing" answer that leaned on such an
    /// assumption is not memoized.
    fn target_exists(&self, name: &str) -> Result<bool, GenError> {
        let key = (name.to_string(), self.variant);
        if let Some(exists) = self.registry.presence.borrow().get(&key) {
            return Ok(*exists);
        }
        if self.registry.projecting.borrow().contains(&key) {
            self.registry.assumed.set(self.registry.assumed.get() + 1);
            return Ok(true);
        }

        let target = self.registry.resolve_from(&self.definition, name)?;
        let assumed_before = self.registry.assumed.get();
        self.registry.projecting.borrow_mut().insert(key.clone());
        let projected = project(self.registry, name, &target, self.variant);
        self.registry.projecting.borrow_mut().remove(&key);

        let exists = projected?.is_some();
        if exists || self.registry.assumed.get() == assumed_before {
            self.registry.presence.borrow_mut().insert(key, exists);
        }
        Ok(exists)
    }

    /// Project an `extends` parent into a flat object.
    fn parent(&mut self, parent: &SchemaNode) -> Result<Option<ObjectNode>, GenError> {
        let projected = match &parent.kind {
            NodeKind::Reference(name) => {
                if self.chain.iter().any(|c| c == name) {
                    let mut chain = self.chain.clone();
                    chain.push(name.clone());
                    return Err(GenError::CyclicExtends {
                        definition: self.chain[0].clone(),
                        chain,
                    });
                }
                if !parent.restriction.includes(self.variant) {
                    return Ok(None);
                }
                let target = self.registry.resolve_from(&self.definition, name)?;

                let outer = std::mem::replace(&mut self.definition, name.clone());
                self.chain.push(name.clone());
                let result = self.node(&target);
                self.chain.pop();
                self.definition = outer;
                result?
            }
            _ => self.node(parent)?,
        };

        match projected {
            None => Ok(None),
            Some(SchemaNode {
                kind: NodeKind::Object(o),
                ..
            }) => Ok(Some(o)),
            Some(other) => Err(GenError::InvalidExtends {
                definition: self.definition.clone(),
                found: other.kind.name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::*;

    fn names(node: &SchemaNode) -> Vec<&str> {
        node.as_object()
            .unwrap()
            .properties
            .iter()
            .map(|p| p.name.as_str())
            .collect()
    }

    fn example_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .define("Example", || {
                obj([
                    prop("a", string()),
                    prop("b", string().optional()).only_in(Variant::Internal),
                ])
            })
            .unwrap();
        registry
    }

    #[test]
    fn internal_only_property_dropped_from_external() {
        let registry = example_registry();
        let external = project_definition(&registry, "Example", Variant::External)
            .unwrap()
            .unwrap();
        let internal = project_definition(&registry, "Example", Variant::Internal)
            .unwrap()
            .unwrap();
        assert_eq!(names(&external), vec!["a"]);
        assert_eq!(names(&internal), vec!["a", "b"]);
    }

    #[test]
    fn projection_does_not_mutate_source() {
        let registry = example_registry();
        project_definition(&registry, "Example", Variant::External).unwrap();
        let source = registry.resolve("Example").unwrap();
        assert_eq!(names(&source), vec!["a", "b"]);
    }

    #[test]
    fn projected_nodes_are_unrestricted() {
        let registry = example_registry();
        let internal = project_definition(&registry, "Example", Variant::Internal)
            .unwrap()
            .unwrap();
        let b = internal.as_object().unwrap().property("b").unwrap();
        assert_eq!(b.restriction, VariantRestriction::All);
    }

    #[test]
    fn restricted_value_drops_property() {
        let mut registry = Registry::new();
        registry
            .define("Obj", || {
                obj([
                    prop("keep", string()),
                    prop("drop", string().only_in(Variant::External)),
                ])
            })
            .unwrap();
        let internal = project_definition(&registry, "Obj", Variant::Internal)
            .unwrap()
            .unwrap();
        assert_eq!(names(&internal), vec!["keep"]);
    }

    #[test]
    fn extends_merges_parent_first_with_override() {
        let mut registry = Registry::new();
        registry
            .define("Base", || {
                obj([
                    prop("id", string()),
                    prop("hidden", boolean().optional()),
                ])
            })
            .unwrap()
            .define("Child", || {
                obj([
                    prop("label", string()),
                    prop("hidden", boolean().optional_with(true)),
                ])
                .extends(reference("Base"))
            })
            .unwrap();

        let child = project_definition(&registry, "Child", Variant::External)
            .unwrap()
            .unwrap();
        assert_eq!(names(&child), vec!["id", "hidden", "label"]);
        let hidden = child.as_object().unwrap().property("hidden").unwrap();
        assert_eq!(hidden.value.default_value(), Some(&serde_json::json!(true)));
        assert!(child.as_object().unwrap().extends.is_empty());
    }

    #[test]
    fn extends_projects_parent_per_variant() {
        let mut registry = Registry::new();
        registry
            .define("Base", || {
                obj([
                    prop("id", string()),
                    prop("baseComponentId", string().optional()).only_in(Variant::Internal),
                ])
            })
            .unwrap()
            .define("Input", || obj([prop("value", string())]).extends(reference("Base")))
            .unwrap();

        let external = project_definition(&registry, "Input", Variant::External)
            .unwrap()
            .unwrap();
        let internal = project_definition(&registry, "Input", Variant::Internal)
            .unwrap()
            .unwrap();
        assert_eq!(names(&external), vec!["id", "value"]);
        assert_eq!(names(&internal), vec!["id", "baseComponentId", "value"]);
    }

    #[test]
    fn conflicting_parents_collide() {
        let mut registry = Registry::new();
        registry
            .define("A", || obj([prop("x", string())]))
            .unwrap()
            .define("B", || obj([prop("x", number())]))
            .unwrap()
            .define("C", || obj([]).extends(reference("A")).extends(reference("B")))
            .unwrap();

        let err = project_definition(&registry, "C", Variant::External).unwrap_err();
        assert!(matches!(
            err,
            GenError::ExtendsCollision { definition, property } if definition == "C" && property == "x"
        ));
    }

    #[test]
    fn diamond_inheritance_merges() {
        let mut registry = Registry::new();
        registry
            .define("Root", || obj([prop("id", string())]))
            .unwrap()
            .define("Left", || obj([prop("l", string())]).extends(reference("Root")))
            .unwrap()
            .define("Right", || obj([prop("r", string())]).extends(reference("Root")))
            .unwrap()
            .define("Both", || {
                obj([])
                    .extends(reference("Left"))
                    .extends(reference("Right"))
            })
            .unwrap();

        let both = project_definition(&registry, "Both", Variant::External)
            .unwrap()
            .unwrap();
        assert_eq!(names(&both), vec!["id", "l", "r"]);
    }

    #[test]
    fn extends_cycle_is_rejected() {
        let mut registry = Registry::new();
        registry
            .define("A", || obj([]).extends(reference("B")))
            .unwrap()
            .define("B", || obj([]).extends(reference("A")))
            .unwrap();

        let err = project_definition(&registry, "A", Variant::External).unwrap_err();
        match err {
            GenError::CyclicExtends { definition, chain } => {
                assert_eq!(definition, "A");
                assert_eq!(chain, vec!["A", "B", "A"]);
            }
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn extends_non_object_is_rejected() {
        let mut registry = Registry::new();
        registry
            .define("Size", || enumeration([1, 2]))
            .unwrap()
            .define("Bad", || obj([]).extends(reference("Size")))
            .unwrap();

        let err = project_definition(&registry, "Bad", Variant::External).unwrap_err();
        assert!(matches!(err, GenError::InvalidExtends { found, .. } if found == "enum"));
    }

    #[test]
    fn reference_cycles_through_properties_are_safe() {
        let mut registry = Registry::new();
        registry
            .define("Tree", || obj([prop("children", arr(reference("Tree")))]))
            .unwrap();
        let tree = project_definition(&registry, "Tree", Variant::Internal)
            .unwrap()
            .unwrap();
        assert_eq!(names(&tree), vec!["children"]);
    }

    #[test]
    fn reference_to_restricted_definition_is_dropped() {
        let mut registry = Registry::new();
        registry
            .define("Hierarchy", || obj([prop("depth", integer())]).only_in(Variant::Internal))
            .unwrap()
            .define("Node", || {
                obj([
                    prop("id", string()),
                    prop("hierarchy", reference("Hierarchy").optional()),
                ])
            })
            .unwrap();

        let external = project_definition(&registry, "Node", Variant::External)
            .unwrap()
            .unwrap();
        assert_eq!(names(&external), vec!["id"]);
        assert!(project_definition(&registry, "Hierarchy", Variant::External)
            .unwrap()
            .is_none());
    }

    #[test]
    fn union_members_filtered_and_empty_union_dropped() {
        let mut registry = Registry::new();
        registry
            .define("U", || {
                obj([
                    prop(
                        "mixed",
                        union([string(), number().only_in(Variant::Internal)]),
                    ),
                    prop("gone", union([boolean().only_in(Variant::Internal)])),
                ])
            })
            .unwrap();
        let external = project_definition(&registry, "U", Variant::External)
            .unwrap()
            .unwrap();
        assert_eq!(names(&external), vec!["mixed"]);
        let mixed = &external.as_object().unwrap().property("mixed").unwrap().value;
        assert!(matches!(&mixed.kind, NodeKind::Union(m) if m.len() == 1));
    }

    #[test]
    fn restricted_additional_properties_become_forbidden() {
        let mut registry = Registry::new();
        registry
            .define("Map", || obj([]).additional_properties(string().only_in(Variant::Internal)))
            .unwrap();
        let external = project_definition(&registry, "Map", Variant::External)
            .unwrap()
            .unwrap();
        assert_eq!(
            external.as_object().unwrap().additional,
            AdditionalProperties::Forbidden
        );
    }

    #[test]
    fn unknown_reference_reports_referencing_definition() {
        let mut registry = Registry::new();
        registry
            .define("Grid", || obj([prop("xs", reference("GridSize"))]))
            .unwrap();
        let err = project_definition(&registry, "Grid", Variant::External).unwrap_err();
        assert!(matches!(
            err,
            GenError::UnknownDefinition { referencing, missing }
                if referencing == "Grid" && missing == "GridSize"
        ));
    }

    fn emptied_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .define("Hidden", || arr(string().only_in(Variant::Internal)))
            .unwrap()
            .define("Loaded", || {
                union([
                    string().only_in(Variant::Internal),
                    integer().only_in(Variant::Internal),
                ])
            })
            .unwrap()
            .define("Holder", || {
                obj([
                    prop("id", string()),
                    prop("h", reference("Hidden").optional()),
                    prop("l", reference("Loaded").optional()),
                ])
            })
            .unwrap();
        registry
    }

    #[test]
    fn reference_to_emptied_definition_is_dropped() {
        let registry = emptied_registry();
        let external = project_definition(&registry, "Holder", Variant::External)
            .unwrap()
            .unwrap();
        let internal = project_definition(&registry, "Holder", Variant::Internal)
            .unwrap()
            .unwrap();
        assert_eq!(names(&external), vec!["id"]);
        assert_eq!(names(&internal), vec!["id", "h", "l"]);
        assert!(project_definition(&registry, "Hidden", Variant::External)
            .unwrap()
            .is_none());
    }

    #[test]
    fn mutual_references_terminate() {
        let mut registry = Registry::new();
        registry
            .define("Page", || obj([prop("parent", reference("Book").optional())]))
            .unwrap()
            .define("Book", || obj([prop("pages", arr(reference("Page")))]))
            .unwrap();
        let page = project_definition(&registry, "Page", Variant::External)
            .unwrap()
            .unwrap();
        assert_eq!(names(&page), vec!["parent"]);
        let book = project_definition(&registry, "Book", Variant::Internal)
            .unwrap()
            .unwrap();
        assert_eq!(names(&book), vec!["pages"]);
    }
}
