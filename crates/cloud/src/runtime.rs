//! Toolchain age warnings.
//!
//! Thresholds follow the Rust release train: "supported" is the oldest
//! release the client libraries still build on, "recommended" the oldest
//! one they are tested against. Bump both when the MSRV moves.

use std::io::{self, Write};

use gcloud_core::{is_var_set, Version, VersionError};
use tracing::debug;

pub const SUPPORTED_VERSION_THRESHOLD: &str = "1.75";
pub const RECOMMENDED_VERSION_THRESHOLD: &str = "1.80";

/// Any value, even empty, silences the warnings.
pub const SUPPRESS_WARNINGS_VAR: &str = "GOOGLE_CLOUD_SUPPRESS_RUST_WARNINGS";

/// `rustc` release this crate was compiled with, or `unknown`.
pub const RUNTIME_VERSION: &str = env!("GCLOUD_RUSTC_VERSION");

pub const UNKNOWN_VERSION_MESSAGE: &str = "Unable to determine current Rust version.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeSupport {
    Recommended,
    NearingEndOfLife { current: Version, recommended: Version },
    EndOfLife { current: Version, recommended: Version },
}

impl RuntimeSupport {
    pub fn warning_lines(&self) -> Vec<String> {
        let (headline, advice, recommended) = match self {
            Self::Recommended => return Vec::new(),
            Self::EndOfLife {
                current,
                recommended,
            } => (
                format!(
                    "WARNING: You are running Rust {current}, which has reached end-of-life and \
                     is no longer supported by the Google Cloud API clients."
                ),
                "It is strongly recommended that you upgrade to",
                recommended,
            ),
            Self::NearingEndOfLife {
                current,
                recommended,
            } => (
                format!("WARNING: You are running Rust {current}, which is nearing end-of-life."),
                "Consider upgrading to",
                recommended,
            ),
        };
        vec![
            headline,
            format!(
                "The Google Cloud API clients work best on supported versions of Rust. \
                 {advice} Rust {recommended} or later."
            ),
            "See https://releases.rs/ for more info on the Rust release schedule.".to_string(),
            format!("To suppress this message, set the {SUPPRESS_WARNINGS_VAR} environment variable."),
        ]
    }
}

/// Classifies `current` against the two thresholds.
pub fn assess(
    current: &str,
    supported: &str,
    recommended: &str,
) -> Result<RuntimeSupport, VersionError> {
    let current = Version::parse(current)?;
    let supported = Version::parse(supported)?;
    let recommended = Version::parse(recommended)?;

    Ok(if current < supported {
        RuntimeSupport::EndOfLife {
            current,
            recommended,
        }
    } else if current < recommended {
        RuntimeSupport::NearingEndOfLife {
            current,
            recommended,
        }
    } else {
        RuntimeSupport::Recommended
    })
}

/// Writes the warning for `current` to `out`, unless [`SUPPRESS_WARNINGS_VAR`]
/// is set. An unparseable version produces a single diagnostic line.
pub fn warn_on_old_runtime_version_to(
    out: &mut dyn Write,
    current: &str,
    supported: &str,
    recommended: &str,
) -> io::Result<()> {
    if is_var_set(SUPPRESS_WARNINGS_VAR) {
        return Ok(());
    }
    match assess(current, supported, recommended) {
        Ok(support) => {
            for line in support.warning_lines() {
                writeln!(out, "{line}")?;
            }
        }
        Err(err) => {
            debug!(%err, current, "runtime version check failed");
            writeln!(out, "{UNKNOWN_VERSION_MESSAGE}")?;
        }
    }
    Ok(())
}

/// Checks the compiling toolchain against the thresholds and warns on
/// stderr. Never fails.
pub fn warn_on_old_runtime_version(supported: &str, recommended: &str) {
    let stderr = io::stderr();
    let mut out = stderr.lock();
    if let Err(err) = warn_on_old_runtime_version_to(&mut out, RUNTIME_VERSION, supported, recommended) {
        debug!(%err, "could not write runtime version warning");
    }
}
