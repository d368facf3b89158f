//! JSON manifest shipped by each service package.
//!
//! ```json
//! {
//!   "service": "storage",
//!   "fields": [
//!     { "name": "project_id", "kind": "string", "allow_nil": true },
//!     { "name": "endpoint", "default": "https://storage.googleapis.com",
//!       "env": ["STORAGE_EMULATOR_HOST"], "kind": "string" }
//!   ],
//!   "shared_fields": [
//!     { "name": "retries", "default": 3, "kind": "integer", "aliases": ["max_retries"] }
//!   ]
//! }
//! ```

use gcloud_config::{Config, ConfigError, DefaultValue, FieldOptions, Value, ValueKind};
use gcloud_core::first_present_var;
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceManifest {
    pub service: String,
    /// Catalog entry that builds this service's client; defaults to `service`.
    #[serde(default)]
    pub factory: Option<String>,
    /// Registered under the `<service>` sub-configuration.
    #[serde(default)]
    pub fields: Vec<FieldManifest>,
    /// Registered at the top level, shared with every other service.
    #[serde(default)]
    pub shared_fields: Vec<FieldManifest>,
}

impl ServiceManifest {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    pub fn factory_name(&self) -> &str {
        self.factory.as_deref().unwrap_or(&self.service)
    }

    /// Adds the manifest's fields to `config`. Registration is staged on a
    /// copy, so a conflict leaves `config` exactly as it was.
    pub fn register(&self, config: &mut Config) -> Result<(), ConfigError> {
        let mut staged = config.clone();
        for field in &self.shared_fields {
            field.register(&mut staged)?;
        }
        if !self.fields.is_empty() {
            let scoped = staged.add_config(self.service.as_str())?;
            for field in &self.fields {
                field.register(scoped)?;
            }
        }
        *config = staged;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldManifest {
    pub name: String,
    #[serde(default)]
    pub default: Value,
    /// Variables consulted (in order) on every read of the unset field.
    #[serde(default)]
    pub env: Vec<String>,
    #[serde(default)]
    pub kind: Option<ValueKind>,
    #[serde(default)]
    pub allow_nil: bool,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl FieldManifest {
    pub fn register(&self, config: &mut Config) -> Result<(), ConfigError> {
        config.add_field(self.name.as_str(), self.default_value(), self.options())?;
        for alias in &self.aliases {
            config.add_alias(alias.as_str(), &self.name)?;
        }
        Ok(())
    }

    fn options(&self) -> FieldOptions {
        let options = match self.kind {
            Some(kind) => FieldOptions::new().matching(kind),
            None => FieldOptions::new(),
        };
        if self.allow_nil {
            options.nullable()
        } else {
            options
        }
    }

    fn default_value(&self) -> DefaultValue {
        if self.env.is_empty() {
            return DefaultValue::Static(self.default.clone());
        }

        let vars = self.env.clone();
        let fallback = self.default.clone();
        let kind = self.kind.unwrap_or(ValueKind::String);
        let name = self.name.clone();
        DefaultValue::computed(move || {
            let keys: Vec<&str> = vars.iter().map(String::as_str).collect();
            let Some((var, raw)) = first_present_var(&keys) else {
                return fallback.clone();
            };
            kind.coerce(&raw).unwrap_or_else(|| {
                warn!(field = %name, var, %kind, "ignoring environment value of the wrong kind");
                fallback.clone()
            })
        })
    }
}
