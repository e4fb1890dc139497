//! Declared value types of properties.

use serde_json::Value;
use std::fmt;

/// Type descriptor of a registered property.
///
/// Scalars map onto the JSON value model; containers are parameterised by
/// their element type, so `set<string>` and `set<integer>` are different
/// declarations.
///
/// ```
/// use entity_props::PropertyType;
///
/// let tags = PropertyType::set(PropertyType::String);
/// assert_eq!(tags.to_string(), "set<string>");
/// assert!(tags.is_container());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Bool,
    /// Signed or unsigned 64-bit integer
    Integer,
    Float,
    String,
    /// Any JSON document, stored verbatim
    Json,
    List(Box<PropertyType>),
    /// Unordered collection without duplicates
    Set(Box<PropertyType>),
    /// String-keyed map
    Map(Box<PropertyType>),
}

impl PropertyType {
    pub fn list(element: PropertyType) -> Self {
        PropertyType::List(Box::new(element))
    }

    pub fn set(element: PropertyType) -> Self {
        PropertyType::Set(Box::new(element))
    }

    pub fn map(value: PropertyType) -> Self {
        PropertyType::Map(Box::new(value))
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            PropertyType::List(_) | PropertyType::Set(_) | PropertyType::Map(_)
        )
    }

    /// Value used when a property is absent and declares no default factory.
    ///
    /// Containers start empty, scalars are null.
    pub fn zero_value(&self) -> Value {
        match self {
            PropertyType::List(_) | PropertyType::Set(_) => Value::Array(Vec::new()),
            PropertyType::Map(_) => Value::Object(serde_json::Map::new()),
            _ => Value::Null,
        }
    }

    /// Check that `value` has the runtime shape of this type.
    ///
    /// Null is only accepted by `json`; clearing a property is handled before
    /// values reach the converter.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            PropertyType::Bool => value.is_boolean(),
            PropertyType::Integer => value.is_i64() || value.is_u64(),
            PropertyType::Float => value.is_number(),
            PropertyType::String => value.is_string(),
            PropertyType::Json => true,
            PropertyType::List(element) | PropertyType::Set(element) => value
                .as_array()
                .is_some_and(|items| items.iter().all(|item| element.accepts(item))),
            PropertyType::Map(element) => value
                .as_object()
                .is_some_and(|entries| entries.values().all(|item| element.accepts(item))),
        }
    }
}

/// Short name of a value's runtime shape, for error messages.
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyType::Bool => write!(f, "bool"),
            PropertyType::Integer => write!(f, "integer"),
            PropertyType::Float => write!(f, "float"),
            PropertyType::String => write!(f, "string"),
            PropertyType::Json => write!(f, "json"),
            PropertyType::List(element) => write!(f, "list<{}>", element),
            PropertyType::Set(element) => write!(f, "set<{}>", element),
            PropertyType::Map(element) => write!(f, "map<{}>", element),
        }
    }
}
