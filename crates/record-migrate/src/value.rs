use std::fmt;

use im::OrdMap;
use serde::{Deserialize, Serialize};

/// A single property value inside a record.
///
/// The set of kinds is deliberately small: everything a persisted record can
/// hold after decoding. Enumerated style tokens are plain strings; whether a
/// token is legal is decided by a [`StyleRegistry`](crate::StyleRegistry),
/// not by the value itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Explicit null (nullable fields).
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Any number. Stored as `f64`, like the documents it is decoded from.
    Number(f64),
    /// String or enumerated style token.
    String(String),
    /// Ordered list of values.
    List(Vec<Value>),
    /// Nested property bag.
    Object(PropertyBag),
}

impl Value {
    /// The string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// The numeric content, if this is a number.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean content, if this is a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The nested bag, if this is an object.
    pub fn as_object(&self) -> Option<&PropertyBag> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// True for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the value kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Object(_) => "object",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Object(bag) => write!(f, "{bag}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::List(items)
    }
}

impl From<PropertyBag> for Value {
    fn from(bag: PropertyBag) -> Self {
        Self::Object(bag)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Null, Into::into)
    }
}

/// An unordered mapping of field name to [`Value`].
///
/// Backed by a persistent map: cloning is O(1) and every "modification"
/// produces a new bag that shares structure with the old one. Migration steps
/// take a bag by value and hand back the next one, so a caller's bag is never
/// changed underneath it.
///
/// ```
/// use record_migrate::PropertyBag;
///
/// let v1 = PropertyBag::new().with("align", "justify");
/// let v2 = v1.clone().with("url", "");
///
/// assert_eq!(v1.len(), 1);
/// assert_eq!(v2.get_str("url"), Some(""));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyBag(OrdMap<String, Value>);

impl PropertyBag {
    /// An empty bag.
    pub fn new() -> Self {
        Self(OrdMap::new())
    }

    /// Returns a bag with `key` set to `value`.
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self(self.0.update(key.into(), value.into()))
    }

    /// Returns a bag without `key`. Absent keys are not an error.
    pub fn without(self, key: &str) -> Self {
        Self(self.0.without(key))
    }

    /// Set a field in place on an owned bag.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Remove a field from an owned bag.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_number)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Field names in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// `(name, value)` pairs in sorted name order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for PropertyBag {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl fmt::Display for PropertyBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}
