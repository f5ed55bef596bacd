//! Definition registry.
//!
//! Maps definition names to builders and memoizes the built node, so every
//! reference to a name sees the same instance. A registry is scoped to one
//! generation run; build a fresh one per run (or per test).

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::debug;

use crate::check::check_definition;
use crate::error::GenError;
use crate::node::SchemaNode;
use crate::types::Variant;

/// Zero-argument builder for a definition.
pub type Builder = Rc<dyn Fn() -> SchemaNode>;

#[derive(Default)]
pub struct Registry {
    builders: IndexMap<String, Builder>,
    cache: RefCell<HashMap<String, Rc<SchemaNode>>>,
    /// Memoized variation-difference results, see [`crate::variation`].
    pub(crate) variation: RefCell<HashMap<String, bool>>,
    /// Definitions whose variation check is in progress.
    pub(crate) checking: RefCell<HashSet<String>>,
    /// Whether a definition still exists after projection, see [`crate::project`].
    pub(crate) presence: RefCell<HashMap<(String, Variant), bool>>,
    /// Presence checks in progress.
    pub(crate) projecting: RefCell<HashSet<(String, Variant)>>,
    /// Bumped each time a presence check assumes an in-progress definition exists.
    pub(crate) assumed: Cell<usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a definition under a globally unique name.
    ///
    /// The builder runs at most once, the first time the name is resolved.
    /// Memoized variation and presence answers are discarded, since a new
    /// name can change them.
    ///
    /// # Errors
    ///
    /// Returns `GenError::DuplicateDefinition` if the name is taken.
    pub fn define(
        &mut self,
        name: impl Into<String>,
        builder: impl Fn() -> SchemaNode + 'static,
    ) -> Result<&mut Self, GenError> {
        let name = name.into();
        if self.builders.contains_key(&name) {
            return Err(GenError::DuplicateDefinition { name });
        }
        self.builders.insert(name, Rc::new(builder));
        self.variation.get_mut().clear();
        self.presence.get_mut().clear();
        Ok(self)
    }

    /// Definition names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.builders.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.builders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builders.is_empty()
    }

    /// Resolve a definition, building and checking it on first use.
    ///
    /// # Errors
    ///
    /// Returns `GenError::UnknownDefinition` for unregistered names, or the
    /// construction error found in the built node.
    pub fn resolve(&self, name: &str) -> Result<Rc<SchemaNode>, GenError> {
        self.resolve_from(name, name)
    }

    /// Like [`Registry::resolve`], naming `referencing` in the unknown-definition error.
    pub fn resolve_from(&self, referencing: &str, name: &str) -> Result<Rc<SchemaNode>, GenError> {
        if let Some(node) = self.cache.borrow().get(name) {
            return Ok(Rc::clone(node));
        }

        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| GenError::UnknownDefinition {
                referencing: referencing.to_string(),
                missing: name.to_string(),
            })?;

        debug!(definition = name, "building definition");
        let node = builder();
        check_definition(name, &node)?;

        // The builder has no registry handle, so nothing can have cached this
        // name while it ran.
        let node = Rc::new(node);
        self.cache
            .borrow_mut()
            .insert(name.to_string(), Rc::clone(&node));
        Ok(node)
    }

    /// Resolve every registered definition, failing on the first error.
    pub fn resolve_all(&self) -> Result<(), GenError> {
        for name in self.names() {
            self.resolve(name)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("definitions", &self.builders.keys().collect::<Vec<_>>())
            .field("built", &self.cache.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::*;
    use crate::variation::contains_variation_differences;

    #[test]
    fn resolve_returns_same_instance() {
        let mut registry = Registry::new();
        registry.define("Id", || string().title("ID")).unwrap();

        let a = registry.resolve("Id").unwrap();
        let b = registry.resolve("Id").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn builder_runs_at_most_once() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut registry = Registry::new();
        registry
            .define("Counted", move || {
                counter.set(counter.get() + 1);
                boolean()
            })
            .unwrap();

        for _ in 0..3 {
            registry.resolve("Counted").unwrap();
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn builders_are_lazy() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut registry = Registry::new();
        registry
            .define("Lazy", move || {
                counter.set(counter.get() + 1);
                number()
            })
            .unwrap();
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn duplicate_definition_rejected() {
        let mut registry = Registry::new();
        registry.define("Grid", || obj([])).unwrap();
        let err = registry.define("Grid", || obj([])).unwrap_err();
        assert!(matches!(err, GenError::DuplicateDefinition { name } if name == "Grid"));
    }

    #[test]
    fn unknown_definition_names_both_sides() {
        let registry = Registry::new();
        let err = registry.resolve_from("Grid", "GridSize").unwrap_err();
        assert!(matches!(
            err,
            GenError::UnknownDefinition { referencing, missing }
                if referencing == "Grid" && missing == "GridSize"
        ));
    }

    #[test]
    fn construction_error_is_not_cached() {
        let mut registry = Registry::new();
        registry
            .define("Broken", || obj([prop("a", string()), prop("a", string())]))
            .unwrap();
        assert!(registry.resolve("Broken").is_err());
        assert!(registry.resolve("Broken").is_err());
    }

    #[test]
    fn self_reference_is_deferred() {
        let mut registry = Registry::new();
        registry
            .define("Tree", || obj([prop("children", arr(reference("Tree")).optional())]))
            .unwrap();
        let tree = registry.resolve("Tree").unwrap();
        assert!(tree.as_object().unwrap().property("children").is_some());
    }

    #[test]
    fn late_definition_revises_variation_answer() {
        let mut registry = Registry::new();
        registry
            .define("A", || obj([prop("b", reference("B"))]))
            .unwrap();
        assert!(!contains_variation_differences(&registry, "A"));

        registry
            .define("B", || {
                obj([prop("x", string().optional()).only_in(Variant::Internal)])
            })
            .unwrap();
        assert!(contains_variation_differences(&registry, "A"));
    }

    #[test]
    fn names_keep_registration_order() {
        let mut registry = Registry::new();
        registry
            .define("B", string)
            .unwrap()
            .define("A", number)
            .unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["B", "A"]);
    }
}
