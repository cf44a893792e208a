use std::collections::BTreeMap;

/// An enumerated style property: a closed set of legal string tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumStyle {
    id: String,
    default: String,
    values: Vec<String>,
}

impl EnumStyle {
    /// Define a style. `default` is added to `values` if missing.
    pub fn new<I, S>(id: impl Into<String>, default: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let default = default.into();
        let mut values: Vec<String> = values.into_iter().map(Into::into).collect();
        if !values.contains(&default) {
            values.push(default.clone());
        }
        Self {
            id: id.into(),
            default,
            values,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn default_value(&self) -> &str {
        &self.default
    }

    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn is_valid(&self, token: &str) -> bool {
        self.values.iter().any(|v| v == token)
    }
}

/// Lookup table of enumerated styles by id.
///
/// Steps and validators consult it; the engine never does.
#[derive(Debug, Clone, Default)]
pub struct StyleRegistry {
    styles: BTreeMap<String, EnumStyle>,
}

impl StyleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a style.
    pub fn with(mut self, style: EnumStyle) -> Self {
        self.styles.insert(style.id.clone(), style);
        self
    }

    pub fn get(&self, id: &str) -> Option<&EnumStyle> {
        self.styles.get(id)
    }

    /// `None` when the style itself is unknown.
    pub fn is_valid(&self, id: &str, token: &str) -> Option<bool> {
        self.get(id).map(|s| s.is_valid(token))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.styles.keys().map(String::as_str)
    }
}
