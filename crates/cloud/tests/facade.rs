use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::Duration,
};

use gcloud::{Cloud, Context, Credentials, ServiceClient, ServiceError, ServiceSettings};
use gcloud_config::{CREDENTIAL_ENV_VARS, PROJECT_ENV_VARS};
use gcloud_services::{factory, InstallRoot};
use serde_json::json;
use tempfile::TempDir;

static ENV_GUARD: Mutex<()> = Mutex::new(());

#[derive(Debug)]
struct StorageClient {
    settings: ServiceSettings,
}

impl ServiceClient for StorageClient {
    fn service_name(&self) -> &str {
        "storage"
    }

    fn settings(&self) -> &ServiceSettings {
        &self.settings
    }
}

fn clear_env() {
    for var in PROJECT_ENV_VARS.iter().chain(CREDENTIAL_ENV_VARS.iter()) {
        env::remove_var(var);
    }
}

fn install(root: &Path, package_dir: &str, service: &str, body: serde_json::Value) -> PathBuf {
    let dir = root.join(package_dir);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("service-client-{service}.json"));
    fs::write(&path, body.to_string()).unwrap();
    path
}

fn storage_manifest() -> serde_json::Value {
    json!({
        "service": "storage",
        "fields": [
            { "name": "project_id", "kind": "string", "allow_nil": true },
            { "name": "timeout", "default": 30 }
        ],
        "shared_fields": [
            { "name": "retries", "default": 3, "kind": "integer" }
        ]
    })
}

fn context_with_storage(root: &TempDir) -> Context {
    let context = Context::new(InstallRoot::new([root.path()])).unwrap();
    context.register_factory(
        "storage",
        factory(|settings| {
            Ok(Arc::new(StorageClient {
                settings: settings.clone(),
            }))
        }),
    );
    context
}

#[test]
fn facade_keeps_only_what_the_caller_passed() {
    let cloud = Cloud::builder().project_id("p").retries(5).build();
    assert_eq!(cloud.project_id(), Some("p"));
    assert_eq!(cloud.retries(), Some(5));
    assert_eq!(cloud.credentials(), None);
    assert_eq!(cloud.timeout(), None);
}

#[test]
fn service_settings_fall_back_to_configuration() {
    let _guard = ENV_GUARD.lock().unwrap();
    clear_env();
    let root = TempDir::new().unwrap();
    install(root.path(), "gcloud-storage-1.0.0", "storage", storage_manifest());
    let context = context_with_storage(&root);
    context.auto_load_packages().unwrap();

    context
        .configure(|config| config.set("project", "shared-project"))
        .unwrap();

    let cloud = Cloud::builder().context(context.clone()).build();
    let storage = cloud.service("storage").unwrap();
    assert_eq!(storage.service_name(), "storage");
    assert_eq!(storage.settings().project_id(), Some("shared-project"));
    assert_eq!(storage.settings().retries(), Some(3));
    assert_eq!(storage.settings().timeout(), Some(Duration::from_secs(30)));
    assert_eq!(storage.settings().credentials(), None);

    context
        .configure(|config| {
            config
                .config_mut("storage")
                .expect("storage sub-config")
                .set("project_id", "storage-project")
        })
        .unwrap();
    let storage = cloud.service("storage").unwrap();
    assert_eq!(storage.settings().project_id(), Some("storage-project"));

    let explicit = Cloud::builder()
        .context(context)
        .project_id("mine")
        .retries(0)
        .build();
    let storage = explicit.service("storage").unwrap();
    assert_eq!(storage.settings().project_id(), Some("mine"));
    assert_eq!(storage.settings().retries(), Some(0));
}

#[test]
fn environment_defaults_reach_service_settings() {
    let _guard = ENV_GUARD.lock().unwrap();
    clear_env();
    let root = TempDir::new().unwrap();
    install(root.path(), "gcloud-storage-1.0.0", "storage", storage_manifest());
    let context = context_with_storage(&root);
    context.auto_load_packages().unwrap();
    let cloud = Cloud::builder().context(context).build();

    env::set_var("GOOGLE_CLOUD_PROJECT", "foo");
    env::set_var("GCLOUD_PROJECT", "bar");
    env::set_var("GOOGLE_CLOUD_KEYFILE", "/keys/sa.json");

    let settings = cloud.settings("storage").unwrap();
    assert_eq!(settings.project_id(), Some("foo"));
    assert_eq!(
        settings.credentials(),
        Some(&Credentials::keyfile("/keys/sa.json"))
    );

    clear_env();
    let settings = cloud.settings("storage").unwrap();
    assert_eq!(settings.project_id(), None);
    assert_eq!(settings.credentials(), None);
}

#[test]
fn raw_environment_credentials_stay_raw() {
    let _guard = ENV_GUARD.lock().unwrap();
    clear_env();
    let root = TempDir::new().unwrap();
    install(root.path(), "gcloud-storage-1.0.0", "storage", storage_manifest());
    let context = context_with_storage(&root);
    context.auto_load_packages().unwrap();
    let cloud = Cloud::builder().context(context).build();

    env::set_var("GOOGLE_CLOUD_CREDENTIALS", "opaque-token");
    let settings = cloud.settings("storage").unwrap();
    assert_eq!(
        settings.credentials(),
        Some(&Credentials::Raw("opaque-token".into()))
    );
    clear_env();
}

#[test]
fn facade_sees_services_loaded_after_it_was_built() {
    let root = TempDir::new().unwrap();
    let context = context_with_storage(&root);
    let cloud = Cloud::builder().context(context.clone()).build();

    assert!(matches!(
        cloud.service("storage"),
        Err(ServiceError::UnknownService { .. })
    ));
    assert!(cloud.services().unwrap().is_empty());

    install(root.path(), "gcloud-storage-1.0.0", "storage", storage_manifest());
    context.auto_load_packages().unwrap();
    assert_eq!(cloud.services().unwrap(), vec!["storage".to_string()]);
    assert!(cloud.service("storage").is_ok());
}

#[test]
fn repeated_discovery_loads_each_manifest_once() {
    let root = TempDir::new().unwrap();
    install(root.path(), "gcloud-storage-1.0.0", "storage", storage_manifest());
    install(
        root.path(),
        "gcloud-pubsub-0.3.0",
        "pubsub",
        json!({ "service": "pubsub", "factory": "generic" }),
    );
    let context = Context::bootstrap(InstallRoot::new([root.path()]));
    // the storage factory is not linked yet, so bootstrap must fail fast
    assert!(context.is_err());

    let context = context_with_storage(&root);
    let first = context.auto_load_packages().unwrap();
    let second = context.auto_load_packages().unwrap();
    assert_eq!(first.loaded.len(), 2);
    assert!(second.loaded.is_empty());
    assert_eq!(second.skipped.len(), 2);

    let pubsub = Cloud::builder()
        .context(context)
        .project_id("p")
        .build()
        .service("pubsub")
        .unwrap();
    assert_eq!(pubsub.service_name(), "pubsub");
    assert_eq!(pubsub.settings().project_id(), Some("p"));
}

#[test]
fn process_wide_configuration_is_shared() {
    let first = gcloud::configure(|_| Ok(())).unwrap();
    let second = gcloud::config().unwrap();
    assert!(first.ptr_eq(&second));
    assert!(first.read().has_field("project_id"));
    assert!(first.read().has_field("keyfile"));
    assert!(gcloud::global().unwrap().ptr_eq(gcloud::global().unwrap()));
}
