// The download phase across several sources: one failing bucket must not stop the others.

use chrono::{TimeZone, Utc};
use cycle_hire_core::config::{BucketSource, DownloadConfig, FetchPolicy};
use cycle_hire_core::contract::{ListPage, MockObjectStore, RemoteObject};
use cycle_hire_core::error::{PhaseError, StoreError};
use cycle_hire_core::pipeline::run_download_phase;
use mockall::predicate::eq;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn source(name: &str, bucket: &str, dir: &Path) -> BucketSource {
    BucketSource {
        name: name.into(),
        bucket: bucket.into(),
        directory: dir.to_path_buf(),
        region: None,
    }
}

fn object(bucket: &str, key: &str, size: u64) -> RemoteObject {
    RemoteObject {
        bucket: bucket.into(),
        key: key.into(),
        size,
        last_modified: Some(Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()),
    }
}

#[tokio::test]
async fn listing_failure_skips_only_that_source() {
    let tmp = tempdir().unwrap();
    let tfl_dir = tmp.path().join("tfl_cycling_data");
    let citi_dir = tmp.path().join("citibike_trip_data");

    let mut store = MockObjectStore::new();
    store
        .expect_list_page()
        .with(eq("cycling.data.tfl.gov.uk"), eq(None::<String>))
        .returning(|_, _| Err(StoreError::Request("NoSuchBucket".into())));
    store
        .expect_list_page()
        .with(eq("tripdata"), eq(None::<String>))
        .returning(|_, _| {
            Ok(ListPage {
                objects: vec![
                    object("tripdata", "rides_2021.csv", 100),
                    object("tripdata", "rides_2022.zip", 200),
                    object("tripdata", "empty.csv", 0),
                ],
                next_token: None,
            })
        });
    store
        .expect_download_object()
        .times(2)
        .returning(|_, key, destination| {
            fs::write(destination, key)?;
            Ok(key.len() as u64)
        });

    let config = DownloadConfig {
        sources: vec![
            source("TfL_Cycling", "cycling.data.tfl.gov.uk", &tfl_dir),
            source("NYC_CitiBike", "tripdata", &citi_dir),
        ],
        policy: FetchPolicy {
            max_files: None,
            ..FetchPolicy::default()
        },
        endpoint: None,
    };

    let report = run_download_phase(&config, &store)
        .await
        .expect("listing failures are not fatal");

    assert_eq!(report.sources.len(), 2);
    assert_eq!(report.listing_failures(), 1);
    let tfl = &report.sources[0];
    assert!(tfl.listing_error.as_deref().unwrap().contains("NoSuchBucket"));
    assert!(tfl.fetch.is_none());

    assert_eq!(report.listed(), 3);
    assert_eq!(report.downloaded(), 2);
    assert_eq!(report.failed_downloads(), 0);
    assert!(citi_dir.join("rides_2021.csv").is_file());
    assert!(citi_dir.join("rides_2022.zip").is_file());
    assert!(!citi_dir.join("empty.csv").exists());
}

#[tokio::test]
async fn objects_of_each_source_land_in_its_own_directory() {
    let tmp = tempdir().unwrap();
    let a_dir = tmp.path().join("a");
    let b_dir = tmp.path().join("b");

    let mut store = MockObjectStore::new();
    store
        .expect_list_page()
        .with(eq("bucket-a"), eq(None::<String>))
        .returning(|_, _| {
            Ok(ListPage {
                objects: vec![object("bucket-a", "2020/trips.zip", 10)],
                next_token: None,
            })
        });
    store
        .expect_list_page()
        .with(eq("bucket-b"), eq(None::<String>))
        .returning(|_, _| {
            Ok(ListPage {
                objects: vec![object("bucket-b", "trips.csv", 10)],
                next_token: None,
            })
        });
    store
        .expect_download_object()
        .returning(|bucket, _, destination| {
            fs::write(destination, bucket)?;
            Ok(bucket.len() as u64)
        });

    let config = DownloadConfig {
        sources: vec![
            source("A", "bucket-a", &a_dir),
            source("B", "bucket-b", &b_dir),
        ],
        policy: FetchPolicy::default(),
        endpoint: None,
    };

    let report = run_download_phase(&config, &store).await.unwrap();
    assert_eq!(report.downloaded(), 2);
    assert_eq!(fs::read_to_string(a_dir.join("trips.zip")).unwrap(), "bucket-a");
    assert_eq!(fs::read_to_string(b_dir.join("trips.csv")).unwrap(), "bucket-b");
}

#[tokio::test]
async fn uncreatable_target_directory_ends_the_phase() {
    let tmp = tempdir().unwrap();
    let blocker = tmp.path().join("blocker");
    fs::write(&blocker, "a file, not a directory").unwrap();

    let mut store = MockObjectStore::new();
    store
        .expect_list_page()
        .with(eq("bucket-a"), eq(None::<String>))
        .times(1)
        .returning(|_, _| {
            Ok(ListPage {
                objects: vec![object("bucket-a", "trips.csv", 10)],
                next_token: None,
            })
        });
    store
        .expect_list_page()
        .with(eq("bucket-b"), eq(None::<String>))
        .never();
    store.expect_download_object().never();

    let config = DownloadConfig {
        sources: vec![
            source("A", "bucket-a", &blocker.join("a")),
            source("B", "bucket-b", &tmp.path().join("b")),
        ],
        policy: FetchPolicy::default(),
        endpoint: None,
    };

    let err = run_download_phase(&config, &store).await.unwrap_err();
    assert!(matches!(err, PhaseError::Fetch(_)));
    assert!(!tmp.path().join("b").exists());
}
