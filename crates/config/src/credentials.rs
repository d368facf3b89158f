use std::path::{Path, PathBuf};

use gcloud_core::first_present_var;
use serde_json::{Map, Value};
use strum_macros::Display;
use tracing::{debug, warn};

/// Variables consulted for default credentials, highest priority first.
pub const CREDENTIAL_ENV_VARS: [&str; 6] = [
    "GOOGLE_CLOUD_CREDENTIALS",
    "GOOGLE_CLOUD_CREDENTIALS_JSON",
    "GOOGLE_CLOUD_KEYFILE",
    "GOOGLE_CLOUD_KEYFILE_JSON",
    "GCLOUD_KEYFILE",
    "GCLOUD_KEYFILE_JSON",
];

/// Key of the single-entry object that holds [`Credentials::Raw`] content in
/// configuration, keeping it apart from keyfile paths.
pub const RAW_CREDENTIALS_KEY: &str = "raw_credentials";

/// Service-account credentials in one of the shapes callers may supply.
/// Interpreting them (loading keys, minting tokens) is left to the auth
/// library behind each service client.
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    /// Path to a JSON keyfile.
    Keyfile(PathBuf),
    /// Parsed keyfile contents.
    Json(Map<String, Value>),
    /// Content that is neither a path nor a JSON object.
    Raw(String),
}

impl Credentials {
    pub fn keyfile(path: impl Into<PathBuf>) -> Self {
        Self::Keyfile(path.into())
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Keyfile(path) => Value::String(path.to_string_lossy().into_owned()),
            Self::Json(map) => Value::Object(map.clone()),
            Self::Raw(raw) => {
                let mut tagged = Map::new();
                tagged.insert(RAW_CREDENTIALS_KEY.to_string(), Value::String(raw.clone()));
                Value::Object(tagged)
            }
        }
    }

    /// Reads credentials back out of a configuration value. Strings are
    /// keyfile paths unless they hold a JSON object; other shapes are not
    /// credentials.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(raw_content(map).map_or_else(
                || Self::Json(map.clone()),
                |raw| Self::Raw(raw.to_string()),
            )),
            Value::String(text) if text.trim_start().starts_with('{') => {
                Some(parse_json_object(text).map_or_else(|| Self::Raw(text.clone()), Self::Json))
            }
            Value::String(text) => Some(Self::Keyfile(PathBuf::from(text))),
            _ => None,
        }
    }
}

impl From<PathBuf> for Credentials {
    fn from(path: PathBuf) -> Self {
        Self::Keyfile(path)
    }
}

impl From<Map<String, Value>> for Credentials {
    fn from(map: Map<String, Value>) -> Self {
        Self::Json(map)
    }
}

/// How the value of a credentials variable is read, derived from its name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum CredentialSource {
    /// `*_JSON`: the value is the keyfile contents.
    JsonContent,
    /// `*_KEYFILE`: the value is a keyfile path.
    KeyfilePath,
    /// Anything else: a path when it names an existing file, else contents.
    PathOrJson,
}

impl CredentialSource {
    pub fn for_var(name: &str) -> Self {
        if name.ends_with("_JSON") {
            Self::JsonContent
        } else if name.ends_with("_KEYFILE") {
            Self::KeyfilePath
        } else {
            Self::PathOrJson
        }
    }

    pub fn interpret(self, raw: &str) -> Credentials {
        match self {
            Self::KeyfilePath => Credentials::Keyfile(PathBuf::from(raw)),
            Self::PathOrJson if Path::new(raw).is_file() => Credentials::Keyfile(PathBuf::from(raw)),
            Self::JsonContent | Self::PathOrJson => match parse_json_object(raw) {
                Some(map) => Credentials::Json(map),
                None => {
                    warn!(source = %self, "credentials are not a JSON object, passing raw content");
                    Credentials::Raw(raw.to_string())
                }
            },
        }
    }
}

/// Resolves credentials from the first variable in `vars` with a non-blank
/// value. Later variables are never consulted once one is found.
pub fn credentials_from_env(vars: &[&str]) -> Option<Credentials> {
    let Some((var, raw)) = first_present_var(vars) else {
        debug!("no default credentials found in environment");
        return None;
    };
    let source = CredentialSource::for_var(var);
    debug!(var, %source, "resolving credentials from environment");
    Some(source.interpret(&raw))
}

fn raw_content(map: &Map<String, Value>) -> Option<&str> {
    match map.get(RAW_CREDENTIALS_KEY) {
        Some(Value::String(raw)) if map.len() == 1 => Some(raw),
        _ => None,
    }
}

fn parse_json_object(raw: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
