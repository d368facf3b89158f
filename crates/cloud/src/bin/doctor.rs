//! Bootstraps the SDK the way an application would and reports what it found:
//! installed services, their resolved settings, and the shared defaults.

use std::io;

use gcloud::{BootstrapError, Cloud};
use gcloud_core::{hydrate_env_file, init_telemetry, TelemetryConfig};

fn main() -> io::Result<()> {
    if let Err(err) = run() {
        eprintln!("[gcloud-doctor] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}

fn run() -> Result<(), BootstrapError> {
    hydrate_env_file()?;
    init_telemetry(&TelemetryConfig::from_env("GCLOUD"))?;

    let report = gcloud::init()?;
    println!(
        "service packages: {} loaded, {} already loaded",
        report.loaded.len(),
        report.skipped.len()
    );
    for path in &report.loaded {
        println!("  {}", path.display());
    }

    let cloud = Cloud::default();
    let services = cloud.services()?;
    if services.is_empty() {
        println!("no services installed (set {})", gcloud_services::SERVICE_PATH_VAR);
    }
    for service in services {
        let settings = cloud.settings(&service)?;
        println!(
            "{service}: project_id={} credentials={} retries={} timeout={}",
            settings.project_id().unwrap_or("-"),
            describe_credentials(settings.credentials()),
            settings
                .retries()
                .map_or_else(|| "-".to_string(), |retries| retries.to_string()),
            settings
                .timeout()
                .map_or_else(|| "-".to_string(), |timeout| format!("{timeout:?}")),
        );
    }

    Ok(())
}

fn describe_credentials(credentials: Option<&gcloud::Credentials>) -> &'static str {
    match credentials {
        None => "none",
        Some(gcloud::Credentials::Keyfile(_)) => "keyfile",
        Some(gcloud::Credentials::Json(_)) => "json",
        Some(gcloud::Credentials::Raw(_)) => "raw",
    }
}
