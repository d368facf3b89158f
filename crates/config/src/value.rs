use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

/// JSON shape a field value may be constrained to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Bool,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl ValueKind {
    /// Returns the most specific kind of `value`, or `None` for null.
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Bool),
            Value::Number(number) if number.is_i64() || number.is_u64() => Some(Self::Integer),
            Value::Number(_) => Some(Self::Number),
            Value::String(_) => Some(Self::String),
            Value::Array(_) => Some(Self::Array),
            Value::Object(_) => Some(Self::Object),
        }
    }

    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Number => value.is_number(),
            kind => Self::of(value) == Some(kind),
        }
    }

    /// Converts a raw string (typically an environment variable) into a value
    /// of this kind. Strings that do not fit the kind yield `None`.
    pub fn coerce(self, raw: &str) -> Option<Value> {
        match self {
            Self::String => Some(Value::String(raw.to_string())),
            _ => serde_json::from_str::<Value>(raw)
                .ok()
                .filter(|value| self.accepts(value)),
        }
    }
}

pub type Predicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Constraint checked whenever a field is written.
#[derive(Clone, Default)]
pub enum Match {
    #[default]
    Any,
    Kind(ValueKind),
    OneOf(Vec<Value>),
    Predicate(Predicate),
}

impl Match {
    pub fn predicate<F>(check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(check))
    }

    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::Any => true,
            Self::Kind(kind) => kind.accepts(value),
            Self::OneOf(allowed) => allowed.contains(value),
            Self::Predicate(check) => check(value),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Any => "any value".to_string(),
            Self::Kind(kind) => kind.to_string(),
            Self::OneOf(allowed) => format!("one of {}", Value::Array(allowed.clone())),
            Self::Predicate(_) => "a custom predicate".to_string(),
        }
    }
}

impl From<ValueKind> for Match {
    fn from(kind: ValueKind) -> Self {
        Self::Kind(kind)
    }
}

impl fmt::Debug for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("Any"),
            Self::Kind(kind) => f.debug_tuple("Kind").field(kind).finish(),
            Self::OneOf(allowed) => f.debug_tuple("OneOf").field(allowed).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

pub type Provider = Arc<dyn Fn() -> Value + Send + Sync>;

/// Fallback used when a field has no explicit value.
///
/// `Computed` providers are invoked on every read of an unset field; the
/// result is never cached.
#[derive(Clone)]
pub enum DefaultValue {
    Static(Value),
    Computed(Provider),
}

impl DefaultValue {
    pub fn computed<F>(provider: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(provider))
    }

    pub fn resolve(&self) -> Value {
        match self {
            Self::Static(value) => value.clone(),
            Self::Computed(provider) => provider(),
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed(_))
    }
}

impl Default for DefaultValue {
    fn default() -> Self {
        Self::Static(Value::Null)
    }
}

impl From<Value> for DefaultValue {
    fn from(value: Value) -> Self {
        Self::Static(value)
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(value) => f.debug_tuple("Static").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Registration options for a field: value constraint plus nil policy.
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    matcher: Match,
    allow_nil: bool,
}

impl FieldOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matching(mut self, matcher: impl Into<Match>) -> Self {
        self.matcher = matcher.into();
        self
    }

    pub fn nullable(mut self) -> Self {
        self.allow_nil = true;
        self
    }

    pub fn matcher(&self) -> &Match {
        &self.matcher
    }

    pub fn allows_nil(&self) -> bool {
        self.allow_nil
    }
}
