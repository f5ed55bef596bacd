//! Core types shared by the node model, projection and backends.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default suffix appended to the Internal declaration of a definition.
pub const DEFAULT_INTERNAL_SUFFIX: &str = "Internal";

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One of the two shapes a definition can take.
///
/// `External` is what authors write and what tooling validates. `Internal` is
/// the shape after the application has post-processed it, and may carry extra
/// fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Variant {
    Internal,
    External,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::External, Variant::Internal];
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Internal => f.write_str("internal"),
            Variant::External => f.write_str("external"),
        }
    }
}

/// Which variants a node or property survives projection into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum VariantRestriction {
    #[default]
    All,
    InternalOnly,
    ExternalOnly,
}

impl VariantRestriction {
    /// Restriction that keeps a node only in `variant`.
    pub fn only(variant: Variant) -> Self {
        match variant {
            Variant::Internal => VariantRestriction::InternalOnly,
            Variant::External => VariantRestriction::ExternalOnly,
        }
    }

    /// Whether a node with this restriction exists in `variant`.
    pub fn includes(&self, variant: Variant) -> bool {
        match (self, variant) {
            (VariantRestriction::All, _) => true,
            (VariantRestriction::InternalOnly, Variant::Internal) => true,
            (VariantRestriction::ExternalOnly, Variant::External) => true,
            (VariantRestriction::InternalOnly, Variant::External) => false,
            (VariantRestriction::ExternalOnly, Variant::Internal) => false,
        }
    }

    pub fn is_restricted(&self) -> bool {
        !matches!(self, VariantRestriction::All)
    }
}

/// Emission targets. Raw nodes carry one emitter per backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Backend {
    Declarations,
    Schema,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Declarations => f.write_str("declarations"),
            Backend::Schema => f.write_str("schema"),
        }
    }
}

/// A literal value usable in `const` and `enum` nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Literal {
    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(i) => Value::from(*i),
            Literal::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Literal::Str(s) => Value::String(s.clone()),
        }
    }

    /// Whether this literal equals a JSON value (numbers compare numerically).
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Literal::Null, Value::Null) => true,
            (Literal::Bool(a), Value::Bool(b)) => a == b,
            (Literal::Str(a), Value::String(b)) => a == b,
            (Literal::Int(a), Value::Number(n)) => n.as_f64() == Some(*a as f64),
            (Literal::Float(a), Value::Number(n)) => n.as_f64() == Some(*a),
            _ => false,
        }
    }

    /// Enum members may only be strings or numbers.
    pub fn is_enum_member(&self) -> bool {
        matches!(self, Literal::Int(_) | Literal::Float(_) | Literal::Str(_))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "boolean",
            Literal::Int(_) | Literal::Float(_) => "number",
            Literal::Str(_) => "string",
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{}", x),
            Literal::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::Str(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::Str(s)
    }
}

impl From<i64> for Literal {
    fn from(i: i64) -> Self {
        Literal::Int(i)
    }
}

impl From<i32> for Literal {
    fn from(i: i32) -> Self {
        Literal::Int(i64::from(i))
    }
}

impl From<f64> for Literal {
    fn from(f: f64) -> Self {
        Literal::Float(f)
    }
}

impl From<bool> for Literal {
    fn from(b: bool) -> Self {
        Literal::Bool(b)
    }
}
