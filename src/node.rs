//! Schema node model.
//!
//! A [`SchemaNode`] is one shape in a definition tree. Nodes are built with the
//! free functions in this module ([`obj`], [`string`], [`reference`], ...) and
//! decorated with chained setters that consume and return the node:
//!
//! ```
//! use dualgen::{obj, prop, string, integer, Variant};
//!
//! let component = obj([
//!     prop("id", string().title("ID").pattern("^[a-z]+$")),
//!     prop("multiPageIndex", integer().optional()).only_in(Variant::Internal),
//! ])
//! .title("Component");
//!
//! assert_eq!(component.meta.title.as_deref(), Some("Component"));
//! ```
//!
//! Setters never fail. Misuse (a pattern on a number, `extends` on an array,
//! metadata on a reference) is recorded on the node and reported when the
//! owning definition is built by the registry.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use crate::types::{Backend, Literal, Variant, VariantRestriction};

/// Cross-cutting annotations attachable to any node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub examples: Vec<Value>,
    /// Deprecation note. Emitted as `@deprecated` and `deprecated: true`.
    pub deprecated: Option<String>,
    /// Implementation comment, only written into declarations.
    pub comment: Option<String>,
    /// Regular expression, string nodes only.
    pub pattern: Option<String>,
}

impl Metadata {
    pub fn is_empty(&self) -> bool {
        self == &Metadata::default()
    }
}

/// Whether a value must be present. The default is documentation only.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Optionality {
    #[default]
    Required,
    Optional { default: Option<Value> },
}

/// What an object allows beyond its declared properties.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AdditionalProperties {
    #[default]
    Forbidden,
    Allowed,
    Schema(Box<SchemaNode>),
}

/// A named edge inside an object.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: SchemaNode,
    pub restriction: VariantRestriction,
}

impl Property {
    /// Keep this property only in `variant`.
    pub fn only_in(mut self, variant: Variant) -> Self {
        self.restriction = VariantRestriction::only(variant);
        self
    }

    pub fn is_optional(&self) -> bool {
        self.value.is_optional()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectNode {
    pub properties: Vec<Property>,
    pub additional: AdditionalProperties,
    /// Parents merged in parent-first; references or inline objects.
    pub extends: Vec<SchemaNode>,
}

impl ObjectNode {
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Maps an enum literal to the symbol used in a real enum declaration.
#[derive(Clone)]
pub struct EnumNaming(Rc<dyn Fn(&Literal) -> String>);

impl EnumNaming {
    pub fn new(f: impl Fn(&Literal) -> String + 'static) -> Self {
        EnumNaming(Rc::new(f))
    }

    pub fn name(&self, literal: &Literal) -> String {
        (self.0)(literal)
    }
}

impl fmt::Debug for EnumNaming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EnumNaming(..)")
    }
}

impl PartialEq for EnumNaming {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumNode {
    pub values: Vec<Literal>,
    /// Set when the enum is emitted as a named symbolic enumeration.
    pub naming: Option<EnumNaming>,
}

/// Backend-specific emission function carried by a raw node.
#[derive(Clone)]
pub enum RawEmitter {
    Declaration(Rc<dyn Fn() -> String>),
    Schema(Rc<dyn Fn() -> Value>),
}

impl RawEmitter {
    fn same(&self, other: &RawEmitter) -> bool {
        match (self, other) {
            (RawEmitter::Declaration(a), RawEmitter::Declaration(b)) => Rc::ptr_eq(a, b),
            (RawEmitter::Schema(a), RawEmitter::Schema(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Escape hatch: one emitter per backend, looked up at emission time.
#[derive(Clone, Default)]
pub struct RawNode {
    pub emitters: BTreeMap<Backend, RawEmitter>,
}

impl RawNode {
    pub fn declaration(&self) -> Option<String> {
        match self.emitters.get(&Backend::Declarations) {
            Some(RawEmitter::Declaration(f)) => Some(f()),
            _ => None,
        }
    }

    pub fn schema(&self) -> Option<Value> {
        match self.emitters.get(&Backend::Schema) {
            Some(RawEmitter::Schema(f)) => Some(f()),
            _ => None,
        }
    }
}

impl fmt::Debug for RawNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawNode")
            .field("backends", &self.emitters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PartialEq for RawNode {
    fn eq(&self, other: &Self) -> bool {
        self.emitters.len() == other.emitters.len()
            && self
                .emitters
                .iter()
                .zip(other.emitters.iter())
                .all(|((ka, a), (kb, b))| ka == kb && a.same(b))
    }
}

/// A type linked from a module the generator does not own.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportNode {
    pub imported_name: String,
    pub source_module: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Object(ObjectNode),
    Array(Box<SchemaNode>),
    Union(Vec<SchemaNode>),
    Enum(EnumNode),
    Const(Literal),
    String,
    Number,
    Integer,
    Boolean,
    Null,
    Reference(String),
    Raw(RawNode),
    Import(ImportNode),
    /// Declarations come from `declaration`, the schema from `schema`.
    Linked {
        declaration: Box<SchemaNode>,
        schema: Box<SchemaNode>,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Object(_) => "object",
            NodeKind::Array(_) => "array",
            NodeKind::Union(_) => "union",
            NodeKind::Enum(_) => "enum",
            NodeKind::Const(_) => "const",
            NodeKind::String => "string",
            NodeKind::Number => "number",
            NodeKind::Integer => "integer",
            NodeKind::Boolean => "boolean",
            NodeKind::Null => "null",
            NodeKind::Reference(_) => "reference",
            NodeKind::Raw(_) => "raw",
            NodeKind::Import(_) => "import",
            NodeKind::Linked { .. } => "linked",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub kind: NodeKind,
    pub meta: Metadata,
    pub optionality: Optionality,
    pub restriction: VariantRestriction,
    /// Setter misuse, reported by the construction checks.
    pub(crate) misuse: Vec<String>,
}

impl PartialEq for SchemaNode {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.meta == other.meta
            && self.optionality == other.optionality
            && self.restriction == other.restriction
    }
}

impl SchemaNode {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            meta: Metadata::default(),
            optionality: Optionality::Required,
            restriction: VariantRestriction::All,
            misuse: Vec::new(),
        }
    }

    // --- Metadata ---

    pub fn title(mut self, title: impl Into<String>) -> Self {
        if self.reject_metadata("title") {
            self.meta.title = Some(title.into());
        }
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        if self.reject_metadata("description") {
            self.meta.description = Some(description.into());
        }
        self
    }

    /// Add an example. Adding the same example twice keeps one copy.
    pub fn example(mut self, example: impl Into<Value>) -> Self {
        if self.reject_metadata("examples") {
            let example = example.into();
            if !self.meta.examples.contains(&example) {
                self.meta.examples.push(example);
            }
        }
        self
    }

    pub fn deprecated(mut self, note: impl Into<String>) -> Self {
        if self.reject_metadata("deprecated") {
            self.meta.deprecated = Some(note.into());
        }
        self
    }

    /// Comment written into the generated declaration, never into the schema.
    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        if self.reject_metadata("comment") {
            self.meta.comment = Some(comment.into());
        }
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        if !matches!(self.kind, NodeKind::String) {
            let kind = self.kind.name();
            self.misuse
                .push(format!("pattern can only be set on string nodes, not {}", kind));
            return self;
        }
        self.meta.pattern = Some(pattern.into());
        self
    }

    // --- Optionality and variants ---

    /// Mark optional without a documented default. Keeps an existing default.
    pub fn optional(mut self) -> Self {
        if matches!(self.optionality, Optionality::Required) {
            self.optionality = Optionality::Optional { default: None };
        }
        self
    }

    /// Mark optional with a documented default value.
    pub fn optional_with(mut self, default: impl Into<Value>) -> Self {
        self.optionality = Optionality::Optional {
            default: Some(default.into()),
        };
        self
    }

    /// Keep this node only in `variant`.
    pub fn only_in(mut self, variant: Variant) -> Self {
        self.restriction = VariantRestriction::only(variant);
        self
    }

    // --- Object-only ---

    /// Append a property to an object node.
    pub fn property(mut self, property: Property) -> Self {
        match &mut self.kind {
            NodeKind::Object(o) => o.properties.push(property),
            other => {
                let kind = other.name();
                self.misuse
                    .push(format!("cannot add property '{}' to {}", property.name, kind));
            }
        }
        self
    }

    /// Merge the properties of `parent` into this object.
    pub fn extends(mut self, parent: SchemaNode) -> Self {
        match &mut self.kind {
            NodeKind::Object(o) => {
                if !o.extends.contains(&parent) {
                    o.extends.push(parent);
                }
            }
            other => {
                let kind = other.name();
                self.misuse.push(format!("{} nodes cannot extend anything", kind));
            }
        }
        self
    }

    pub fn additional_properties(mut self, schema: SchemaNode) -> Self {
        self.set_additional(AdditionalProperties::Schema(Box::new(schema)));
        self
    }

    pub fn allow_additional_properties(mut self) -> Self {
        self.set_additional(AdditionalProperties::Allowed);
        self
    }

    fn set_additional(&mut self, additional: AdditionalProperties) {
        match &mut self.kind {
            NodeKind::Object(o) => o.additional = additional,
            other => {
                let kind = other.name();
                self.misuse
                    .push(format!("additionalProperties cannot be set on {}", kind));
            }
        }
    }

    // --- Enum-only ---

    /// Emit this enum as a named enumeration, naming each member with `naming`.
    pub fn real_enum(mut self, naming: impl Fn(&Literal) -> String + 'static) -> Self {
        match &mut self.kind {
            NodeKind::Enum(e) => e.naming = Some(EnumNaming::new(naming)),
            other => {
                let kind = other.name();
                self.misuse
                    .push(format!("only enum nodes can be real enums, not {}", kind));
            }
        }
        self
    }

    // --- Raw-only ---

    /// Declaration backend emitter for a raw node.
    pub fn emit_declaration(mut self, f: impl Fn() -> String + 'static) -> Self {
        self.set_raw(Backend::Declarations, RawEmitter::Declaration(Rc::new(f)));
        self
    }

    /// Schema backend emitter for a raw node.
    pub fn emit_schema(mut self, f: impl Fn() -> Value + 'static) -> Self {
        self.set_raw(Backend::Schema, RawEmitter::Schema(Rc::new(f)));
        self
    }

    fn set_raw(&mut self, backend: Backend, emitter: RawEmitter) {
        match &mut self.kind {
            NodeKind::Raw(r) => {
                r.emitters.insert(backend, emitter);
            }
            other => {
                let kind = other.name();
                self.misuse
                    .push(format!("{} emitter can only be set on raw nodes, not {}", backend, kind));
            }
        }
    }

    // --- Queries ---

    pub fn is_optional(&self) -> bool {
        matches!(self.optionality, Optionality::Optional { .. })
    }

    pub fn default_value(&self) -> Option<&Value> {
        match &self.optionality {
            Optionality::Optional { default } => default.as_ref(),
            Optionality::Required => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectNode> {
        match &self.kind {
            NodeKind::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn reference_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Reference(name) => Some(name),
            _ => None,
        }
    }

    /// Returns false (and records misuse) when this node is a reference.
    fn reject_metadata(&mut self, what: &str) -> bool {
        if let NodeKind::Reference(name) = &self.kind {
            let msg = format!(
                "reference to '{}' cannot carry {}; set it on the definition",
                name, what
            );
            self.misuse.push(msg);
            return false;
        }
        true
    }
}

// --- Builders ---

pub fn obj(properties: impl IntoIterator<Item = Property>) -> SchemaNode {
    SchemaNode::new(NodeKind::Object(ObjectNode {
        properties: properties.into_iter().collect(),
        ..ObjectNode::default()
    }))
}

pub fn prop(name: impl Into<String>, value: SchemaNode) -> Property {
    Property {
        name: name.into(),
        value,
        restriction: VariantRestriction::All,
    }
}

pub fn arr(item: SchemaNode) -> SchemaNode {
    SchemaNode::new(NodeKind::Array(Box::new(item)))
}

pub fn union(members: impl IntoIterator<Item = SchemaNode>) -> SchemaNode {
    SchemaNode::new(NodeKind::Union(members.into_iter().collect()))
}

pub fn enumeration<L: Into<Literal>>(values: impl IntoIterator<Item = L>) -> SchemaNode {
    SchemaNode::new(NodeKind::Enum(EnumNode {
        values: values.into_iter().map(Into::into).collect(),
        naming: None,
    }))
}

pub fn constant(value: impl Into<Literal>) -> SchemaNode {
    SchemaNode::new(NodeKind::Const(value.into()))
}

pub fn string() -> SchemaNode {
    SchemaNode::new(NodeKind::String)
}

pub fn number() -> SchemaNode {
    SchemaNode::new(NodeKind::Number)
}

pub fn integer() -> SchemaNode {
    SchemaNode::new(NodeKind::Integer)
}

pub fn boolean() -> SchemaNode {
    SchemaNode::new(NodeKind::Boolean)
}

pub fn null() -> SchemaNode {
    SchemaNode::new(NodeKind::Null)
}

/// Reference a named definition. Resolved lazily by whichever backend visits it.
pub fn reference(name: impl Into<String>) -> SchemaNode {
    SchemaNode::new(NodeKind::Reference(name.into()))
}

/// An empty raw node; add emitters with `emit_declaration` / `emit_schema`.
pub fn raw() -> SchemaNode {
    SchemaNode::new(NodeKind::Raw(RawNode::default()))
}

pub fn import(imported_name: impl Into<String>, source_module: impl Into<String>) -> SchemaNode {
    SchemaNode::new(NodeKind::Import(ImportNode {
        imported_name: imported_name.into(),
        source_module: source_module.into(),
    }))
}

pub fn linked(declaration: SchemaNode, schema: SchemaNode) -> SchemaNode {
    SchemaNode::new(NodeKind::Linked {
        declaration: Box::new(declaration),
        schema: Box::new(schema),
    })
}

/// Default real-enum naming: `"on-change"` becomes `OnChange`, `3` becomes `N3`.
pub fn pascal_case(literal: &Literal) -> String {
    let text = literal.to_string();
    let mut out = String::with_capacity(text.len());
    let mut upper = true;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if upper {
                out.extend(c.to_uppercase());
            } else {
                out.push(c);
            }
            upper = false;
        } else {
            upper = true;
        }
    }
    match out.chars().next() {
        Some(c) if c.is_ascii_digit() => format!("N{}", out),
        None => "Empty".to_string(),
        _ => out,
    }
}
