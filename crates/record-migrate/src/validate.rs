//! Post-migration structural validation of property bags.
//!
//! The engine never calls into this module. Loaders run a
//! [`SchemaValidator`] after migration and before treating a record as live.

use std::collections::BTreeMap;
use std::fmt;

use crate::styles::StyleRegistry;
use crate::value::{PropertyBag, Value};

/// A record's props do not match its kind's current schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct ValidationError {
    /// Record kind being validated.
    pub kind: String,
    /// Dotted path of the offending field, if the error is field-specific.
    pub field: Option<String>,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "[kind={}, field={field}] {}", self.kind, self.message),
            None => write!(f, "[kind={}] {}", self.kind, self.message),
        }
    }
}

/// What a single field must look like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldRule {
    String,
    Bool,
    /// Any finite number.
    Number,
    /// A finite number greater than zero.
    NonZeroNumber,
    /// A finite number, zero or greater.
    PositiveNumber,
    /// Empty, a relative path, or an `http`/`https`/`mailto` url.
    LinkUrl,
    /// A token of the named enumerated style.
    Style(String),
    /// `null` or the inner rule.
    Nullable(Box<FieldRule>),
    /// A list whose items all follow the inner rule.
    ListOf(Box<FieldRule>),
    /// An object with numeric `x` and `y`.
    Vec2,
    /// Any object.
    Object,
}

impl FieldRule {
    pub fn style(id: impl Into<String>) -> Self {
        Self::Style(id.into())
    }

    pub fn nullable(self) -> Self {
        Self::Nullable(Box::new(self))
    }

    pub fn list_of(self) -> Self {
        Self::ListOf(Box::new(self))
    }
}

/// The current, closed schema of one record kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindSchema {
    kind: String,
    fields: BTreeMap<String, FieldRule>,
}

impl KindSchema {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: BTreeMap::new(),
        }
    }

    /// Add a required field.
    pub fn field(mut self, name: impl Into<String>, rule: FieldRule) -> Self {
        self.fields.insert(name.into(), rule);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldRule> {
        &self.fields
    }
}

/// Checks a bag against a kind schema.
pub trait SchemaValidator {
    fn validate(&self, props: &PropertyBag, schema: &KindSchema) -> Result<(), ValidationError>;
}

/// Default validator; resolves [`FieldRule::Style`] through a
/// [`StyleRegistry`].
#[derive(Debug, Clone, Default)]
pub struct StyleAwareValidator {
    styles: StyleRegistry,
}

impl StyleAwareValidator {
    pub fn new(styles: StyleRegistry) -> Self {
        Self { styles }
    }

    pub fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    fn check(&self, value: &Value, rule: &FieldRule) -> Result<(), String> {
        match (rule, value) {
            (FieldRule::Nullable(_), Value::Null) => Ok(()),
            (FieldRule::Nullable(inner), _) => self.check(value, inner),
            (FieldRule::String, Value::String(_)) => Ok(()),
            (FieldRule::Bool, Value::Bool(_)) => Ok(()),
            (FieldRule::Number, Value::Number(n)) if n.is_finite() => Ok(()),
            (FieldRule::NonZeroNumber, Value::Number(n)) if n.is_finite() && *n > 0.0 => Ok(()),
            (FieldRule::PositiveNumber, Value::Number(n)) if n.is_finite() && *n >= 0.0 => Ok(()),
            (FieldRule::LinkUrl, Value::String(s)) => {
                if is_valid_link_url(s) {
                    Ok(())
                } else {
                    Err(format!("expected a valid url, got {s:?}"))
                }
            }
            (FieldRule::Style(id), Value::String(token)) => match self.styles.is_valid(id, token) {
                Some(true) => Ok(()),
                Some(false) => Err(format!("{token:?} is not a legal value of style {id}")),
                None => Err(format!("unknown style {id}")),
            },
            (FieldRule::ListOf(inner), Value::List(items)) => items
                .iter()
                .enumerate()
                .try_for_each(|(i, item)| self.check(item, inner).map_err(|e| format!("[{i}]: {e}"))),
            (FieldRule::Vec2, Value::Object(obj)) => {
                for axis in ["x", "y"] {
                    match obj.get_number(axis) {
                        Some(n) if n.is_finite() => {}
                        _ => return Err(format!("expected a numeric {axis}")),
                    }
                }
                Ok(())
            }
            (FieldRule::Object, Value::Object(_)) => Ok(()),
            (rule, value) => Err(format!("expected {}, got {value}", describe(rule))),
        }
    }
}

impl SchemaValidator for StyleAwareValidator {
    fn validate(&self, props: &PropertyBag, schema: &KindSchema) -> Result<(), ValidationError> {
        let error = |field: &str, message: String| ValidationError {
            kind: schema.kind.clone(),
            field: Some(field.to_string()),
            message,
        };

        if let Some(extra) = props.keys().find(|k| !schema.fields.contains_key(k.as_str())) {
            return Err(error(extra.as_str(), "unexpected field".into()));
        }

        for (name, rule) in &schema.fields {
            let value = props
                .get(name)
                .ok_or_else(|| error(name.as_str(), "missing required field".into()))?;
            self.check(value, rule)
                .map_err(|message| error(name.as_str(), message))?;
        }
        Ok(())
    }
}

fn describe(rule: &FieldRule) -> String {
    match rule {
        FieldRule::String => "a string".into(),
        FieldRule::Bool => "a bool".into(),
        FieldRule::Number => "a finite number".into(),
        FieldRule::NonZeroNumber => "a number > 0".into(),
        FieldRule::PositiveNumber => "a number >= 0".into(),
        FieldRule::LinkUrl => "a url string".into(),
        FieldRule::Style(id) => format!("a {id} token"),
        FieldRule::Nullable(inner) => format!("null or {}", describe(inner)),
        FieldRule::ListOf(inner) => format!("a list of {}", describe(inner)),
        FieldRule::Vec2 => "an {x, y} object".into(),
        FieldRule::Object => "an object".into(),
    }
}

const LINK_PROTOCOLS: &[&str] = &["http", "https", "mailto"];

/// True for the empty string, relative paths (`/x`, `./x`) and urls using
/// one of the allowed link protocols. `http:` and `https:` urls need a host,
/// with or without the `//`.
pub fn is_valid_link_url(url: &str) -> bool {
    if url.is_empty() {
        return true;
    }
    if url.chars().any(char::is_whitespace) {
        return false;
    }
    if url.starts_with('/') || url.starts_with("./") {
        return true;
    }
    let Some((scheme, rest)) = url.split_once(':') else {
        return false;
    };
    let scheme = scheme.to_ascii_lowercase();
    if !LINK_PROTOCOLS.contains(&scheme.as_str()) {
        return false;
    }
    if scheme == "mailto" {
        return !rest.is_empty();
    }
    // Like browser url parsing, http(s) tolerates missing or extra slashes
    // before the host.
    rest.trim_start_matches(['/', '\\'])
        .split(['/', '\\', '?', '#'])
        .next()
        .is_some_and(|host| !host.is_empty())
}
