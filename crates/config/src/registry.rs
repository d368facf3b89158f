use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::value::{DefaultValue, FieldOptions, ValueKind};

#[derive(Debug, Clone)]
struct Field {
    default: DefaultValue,
    options: FieldOptions,
    value: Option<Value>,
}

impl Field {
    fn accepts(&self, value: &Value) -> bool {
        if value.is_null() {
            self.options.allows_nil()
        } else {
            self.options.matcher().accepts(value)
        }
    }
}

/// Named configuration fields, one-hop aliases and nested sub-configurations.
#[derive(Debug, Clone, Default)]
pub struct Config {
    fields: BTreeMap<String, Field>,
    aliases: BTreeMap<String, String>,
    configs: BTreeMap<String, Config>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new field. Names already used by a field, alias or
    /// sub-configuration are rejected and the existing entry is left intact.
    pub fn add_field(
        &mut self,
        name: impl Into<String>,
        default: impl Into<DefaultValue>,
        options: FieldOptions,
    ) -> Result<&mut Self, ConfigError> {
        let name = name.into();
        self.ensure_available(&name)?;
        debug!(field = %name, matcher = ?options.matcher(), "config field registered");
        self.fields.insert(
            name,
            Field {
                default: default.into(),
                options,
                value: None,
            },
        );
        Ok(self)
    }

    /// Registers `alias` as another name for the existing field `canonical`.
    pub fn add_alias(
        &mut self,
        alias: impl Into<String>,
        canonical: &str,
    ) -> Result<&mut Self, ConfigError> {
        let alias = alias.into();
        if !self.fields.contains_key(canonical) {
            return Err(ConfigError::UnknownAliasTarget {
                alias,
                target: canonical.to_string(),
            });
        }
        self.ensure_available(&alias)?;
        self.aliases.insert(alias, canonical.to_string());
        Ok(self)
    }

    /// Registers an empty sub-configuration and hands it back for population.
    pub fn add_config(&mut self, name: impl Into<String>) -> Result<&mut Config, ConfigError> {
        let name = name.into();
        self.ensure_available(&name)?;
        Ok(self.configs.entry(name).or_default())
    }

    pub fn resolve_alias<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(String::as_str).unwrap_or(name)
    }

    /// `true` for fields and aliases of fields; sub-configurations excluded.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(self.resolve_alias(name))
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    /// Reads a field: the explicit value if one was set, otherwise its
    /// default. Computed defaults run again on every call.
    pub fn get(&self, name: &str) -> Result<Value, ConfigError> {
        let (canonical, field) = self.field(name)?;
        let value = match &field.value {
            Some(value) => value.clone(),
            None => field.default.resolve(),
        };
        if value.is_null() && !field.options.allows_nil() {
            return Err(ConfigError::NilNotAllowed {
                name: canonical.to_string(),
            });
        }
        Ok(value)
    }

    /// Like [`Config::get`], but folds null into `None`.
    pub fn get_opt(&self, name: &str) -> Result<Option<Value>, ConfigError> {
        match self.get(name) {
            Ok(Value::Null) | Err(ConfigError::NilNotAllowed { .. }) => Ok(None),
            Ok(value) => Ok(Some(value)),
            Err(err) => Err(err),
        }
    }

    /// Writes a field after checking it against the field's constraint. A
    /// rejected value leaves the previous one in place.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        let value = value.into();
        let canonical = self.resolve_alias(name).to_string();
        let field = self
            .fields
            .get_mut(&canonical)
            .ok_or_else(|| ConfigError::UnknownField {
                name: name.to_string(),
            })?;
        if !field.accepts(&value) {
            return Err(ConfigError::TypeMismatch {
                name: canonical,
                expected: field.options.matcher().describe(),
                actual: describe_value(&value),
            });
        }
        field.value = Some(value);
        Ok(())
    }

    /// Drops an explicit value so reads fall back to the default again.
    pub fn reset(&mut self, name: &str) -> Result<(), ConfigError> {
        let canonical = self.resolve_alias(name).to_string();
        let field = self
            .fields
            .get_mut(&canonical)
            .ok_or_else(|| ConfigError::UnknownField {
                name: name.to_string(),
            })?;
        field.value = None;
        Ok(())
    }

    pub fn is_set(&self, name: &str) -> bool {
        self.fields
            .get(self.resolve_alias(name))
            .is_some_and(|field| field.value.is_some())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn alias_names(&self) -> impl Iterator<Item = &str> {
        self.aliases.keys().map(String::as_str)
    }

    pub fn config_names(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }

    pub fn config(&self, name: &str) -> Option<&Config> {
        self.configs.get(name)
    }

    pub fn config_mut(&mut self, name: &str) -> Option<&mut Config> {
        self.configs.get_mut(name)
    }

    fn field(&self, name: &str) -> Result<(&str, &Field), ConfigError> {
        let canonical = self.resolve_alias(name);
        self.fields
            .get_key_value(canonical)
            .map(|(key, field)| (key.as_str(), field))
            .ok_or_else(|| ConfigError::UnknownField {
                name: name.to_string(),
            })
    }

    fn ensure_available(&self, name: &str) -> Result<(), ConfigError> {
        if self.fields.contains_key(name)
            || self.aliases.contains_key(name)
            || self.configs.contains_key(name)
        {
            return Err(ConfigError::DuplicateName {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

fn describe_value(value: &Value) -> String {
    ValueKind::of(value)
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| "null".to_string())
}

/// Cloneable handle to one configuration shared by every component of a
/// process (or of a test).
#[derive(Debug, Clone, Default)]
pub struct SharedConfig {
    inner: Arc<RwLock<Config>>,
}

impl SharedConfig {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, Config> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Config> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, name: &str) -> Result<Value, ConfigError> {
        self.read().get(name)
    }

    pub fn set(&self, name: &str, value: impl Into<Value>) -> Result<(), ConfigError> {
        self.write().set(name, value)
    }

    /// Runs `apply` against the configuration under the write lock.
    pub fn update<R>(&self, apply: impl FnOnce(&mut Config) -> R) -> R {
        let mut guard = self.write();
        apply(&mut *guard)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Errors raised synchronously by registration, reads and writes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("configuration name `{name}` is already defined")]
    DuplicateName { name: String },
    #[error("unknown configuration field `{name}`")]
    UnknownField { name: String },
    #[error("alias `{alias}` targets `{target}`, which is not a configuration field")]
    UnknownAliasTarget { alias: String, target: String },
    #[error("configuration field `{name}` expects {expected}, got {actual}")]
    TypeMismatch {
        name: String,
        expected: String,
        actual: String,
    },
    #[error("configuration field `{name}` is unset and does not allow nil")]
    NilNotAllowed { name: String },
}
