//! Config sync against the in-memory and directory object stores.

use std::sync::Arc;

use bytes::Bytes;
use chrono::NaiveDate;
use esp_e2e::{ConfigSync, DirectoryObjectStore, InMemoryObjectStore, ObjectStore};
use esp_fixtures::PlaceholderResolver;
use esp_testkit::fixtures::{FixtureDirs, json as docs};

fn resolver() -> PlaceholderResolver {
    PlaceholderResolver::for_date(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap())
}

fn names(files: &[&str]) -> Vec<String> {
    files.iter().map(ToString::to_string).collect()
}

#[tokio::test]
async fn second_sync_is_a_noop() {
    let dirs = FixtureDirs::new();
    dirs.write_config("rsv.json", &docs::campaign_config("RSV"));
    dirs.write_config("covid.json", &docs::campaign_config("COVID"));
    let store = Arc::new(InMemoryObjectStore::new());
    let sync = ConfigSync::new(store.clone(), "campaigns/", resolver());

    let wanted = names(&["rsv.json", "covid.json"]);
    let first = sync.sync_configs(&wanted, dirs.configs_dir()).await.unwrap();
    assert_eq!(first.uploaded, ["campaigns/rsv.json", "campaigns/covid.json"]);
    assert!(first.deleted.is_empty());
    assert_eq!(
        first.context.for_scope("rsv.json").unwrap()["DATE_DAY_30"],
        "20250715"
    );

    let second = sync.sync_configs(&wanted, dirs.configs_dir()).await.unwrap();
    assert!(second.is_noop());
    assert_eq!(second.unchanged.len(), 2);
    assert_eq!(store.snapshot().len(), 2);
}

#[tokio::test]
async fn obsolete_configs_are_deleted_and_changes_reuploaded() {
    let dirs = FixtureDirs::new();
    dirs.write_config("rsv.json", &docs::campaign_config("RSV"));
    let store = Arc::new(InMemoryObjectStore::new());
    store
        .put_object("campaigns/old.json", Bytes::from_static(b"{}"))
        .await
        .unwrap();
    store
        .put_object("other/keep.json", Bytes::from_static(b"{}"))
        .await
        .unwrap();
    let sync = ConfigSync::new(store.clone(), "campaigns", resolver());

    let report = sync
        .sync_configs(&names(&["rsv.json"]), dirs.configs_dir())
        .await
        .unwrap();
    assert_eq!(report.deleted, ["campaigns/old.json"]);
    assert_eq!(report.uploaded, ["campaigns/rsv.json"]);

    // The same file resolved on a later day is a different document.
    let later = ConfigSync::new(
        store.clone(),
        "campaigns",
        PlaceholderResolver::for_date(NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()),
    );
    let report = later
        .sync_configs(&names(&["rsv.json"]), dirs.configs_dir())
        .await
        .unwrap();
    assert_eq!(report.uploaded, ["campaigns/rsv.json"]);

    let keys: Vec<String> = store.snapshot().into_keys().collect();
    assert_eq!(keys, ["campaigns/rsv.json", "other/keep.json"]);

    let removed = later.delete_all().await.unwrap();
    assert_eq!(removed, ["campaigns/rsv.json"]);
    assert_eq!(store.snapshot().len(), 1);
}

#[tokio::test]
async fn directory_store_mirrors_configs_on_disk() {
    let dirs = FixtureDirs::new();
    dirs.write_config("rsv.json", &docs::campaign_config("RSV"));
    let mirror = tempfile::TempDir::new().unwrap();
    let store = Arc::new(DirectoryObjectStore::new(mirror.path()));
    let sync = ConfigSync::new(store, "campaigns", resolver());

    sync.sync_configs(&names(&["rsv.json"]), dirs.configs_dir())
        .await
        .unwrap();
    let written =
        std::fs::read_to_string(mirror.path().join("campaigns").join("rsv.json")).unwrap();
    assert!(written.contains("\"EndDate\": \"20250715\""), "{written}");
    assert!(!written.contains("<<"));

    let again = sync
        .sync_configs(&names(&["rsv.json"]), dirs.configs_dir())
        .await
        .unwrap();
    assert!(again.is_noop());
}

#[tokio::test]
async fn missing_config_file_is_an_error() {
    let dirs = FixtureDirs::new();
    let sync = ConfigSync::new(Arc::new(InMemoryObjectStore::new()), "", resolver());
    let err = sync
        .sync_configs(&names(&["absent.json"]), dirs.configs_dir())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("absent.json"), "{err}");
}
