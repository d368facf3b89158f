//! Environment-variable helpers used by every crate in the workspace.

use std::env;

use thiserror::Error;
use tracing::debug;

/// When set, `.env` hydration is skipped entirely.
pub const SKIP_DOTENV_VAR: &str = "GCLOUD_SKIP_DOTENV";

/// Returns the trimmed value of `key`, treating blank values as absent.
pub fn optional_var(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Scans `keys` in order and returns the first one holding a non-blank value.
pub fn first_present_var<'a>(keys: &[&'a str]) -> Option<(&'a str, String)> {
    keys.iter()
        .find_map(|key| optional_var(key).map(|value| (*key, value)))
}

/// Presence check that ignores the value, including empty strings.
pub fn is_var_set(key: &str) -> bool {
    env::var_os(key).is_some()
}

/// Loads `.env` from the working directory (if present) into the process
/// environment. A missing file is not an error.
pub fn hydrate_env_file() -> Result<(), EnvError> {
    if is_var_set(SKIP_DOTENV_VAR) {
        return Ok(());
    }
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env file"),
        Err(dotenvy::Error::Io(err)) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(EnvError::Dotenv { source: err }),
    }

    Ok(())
}

/// Errors emitted when `.env` hydration fails.
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("failed to load .env file: {source}")]
    Dotenv {
        #[from]
        source: dotenvy::Error,
    },
}
