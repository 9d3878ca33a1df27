//! Batch runs over date ranges.

mod common;

use std::sync::Arc;

use common::*;
use grid_processor::SwathExtractor;
use ingestion::{BatchDriver, BatchSummary, DayIngester, IngestionError};
use storage::SwathStore;
use swath_common::{DayKey, SwathError};
use test_utils::storm_grid;

const DATES: [&str; 3] = ["20240501", "20240502", "20240503"];

fn day(s: &str) -> DayKey {
    DayKey::parse(s).unwrap()
}

/// One evening file per date; each falls inside exactly one day's window.
fn evening_keys() -> Vec<String> {
    DATES.iter().map(|d| key(d, "180000")).collect()
}

fn decoder() -> FakeDecoder {
    FakeDecoder::new(
        evening_keys()
            .iter()
            .map(|k| (local_name(k), storm_grid(31, 2.0, 10.0))),
    )
}

fn driver(
    lister: Arc<FakeLister>,
    decoder: FakeDecoder,
    store: SwathStore,
) -> (BatchDriver, tempfile::TempDir) {
    let cache = tempfile::tempdir().unwrap();
    let ingester = DayIngester::new(
        store,
        lister,
        Arc::new(FakeFetcher::new(cache.path())),
        Arc::new(decoder),
        product(1440),
        SwathExtractor::default(),
    );
    (BatchDriver::new(ingester, 2), cache)
}

#[tokio::test]
async fn test_batch_ingests_every_day() {
    let store = SwathStore::open_memory().await.unwrap();
    let lister = Arc::new(FakeLister::with_keys(evening_keys()));
    let (driver, _cache) = driver(lister, decoder(), store.clone());

    let summary = driver
        .run(day("2024-05-01"), day("2024-05-03"))
        .await
        .unwrap();
    assert_eq!(
        summary,
        BatchSummary {
            total: 3,
            completed: 3,
            failed: 0,
            cached: 0,
            no_data: 0,
        }
    );

    let stored: Vec<String> = store
        .stored_days()
        .await
        .unwrap()
        .iter()
        .map(|d| d.to_string())
        .collect();
    assert_eq!(stored, vec!["2024-05-01", "2024-05-02", "2024-05-03"]);

    let rerun = driver
        .run(day("2024-05-01"), day("2024-05-03"))
        .await
        .unwrap();
    assert_eq!(rerun.cached, 3);
    assert_eq!(rerun.completed, 3);
}

#[tokio::test]
async fn test_failed_day_does_not_stop_others() {
    let store = SwathStore::open_memory().await.unwrap();
    // Only the 2024-05-03 window reaches into the 20240504 prefix.
    let lister = Arc::new(FakeLister::with_keys(evening_keys()).panicking_on("20240504"));
    let (driver, _cache) = driver(lister, decoder(), store.clone());

    let summary = driver
        .run(day("2024-05-01"), day("2024-05-03"))
        .await
        .unwrap();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.failed, 1);

    assert!(store.exists(day("2024-05-01")).await.unwrap());
    assert!(store.exists(day("2024-05-02")).await.unwrap());
    assert!(!store.exists(day("2024-05-03")).await.unwrap());
}

#[tokio::test]
async fn test_corrupt_file_is_skipped_not_failed() {
    let store = SwathStore::open_memory().await.unwrap();
    let lister = Arc::new(FakeLister::with_keys(evening_keys()));
    let (driver, _cache) = driver(
        lister,
        decoder().panicking_on("20240502-180000"),
        store.clone(),
    );

    let summary = driver
        .run(day("2024-05-01"), day("2024-05-03"))
        .await
        .unwrap();
    assert_eq!(summary.completed, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.no_data, 1);

    assert!(store.exists(day("2024-05-01")).await.unwrap());
    assert!(!store.exists(day("2024-05-02")).await.unwrap());
    assert!(store.exists(day("2024-05-03")).await.unwrap());
}

#[tokio::test]
async fn test_days_without_data_are_completed_not_failed() {
    let store = SwathStore::open_memory().await.unwrap();
    let lister = Arc::new(FakeLister::failing());
    let (driver, _cache) = driver(lister, decoder(), store.clone());

    let summary = driver
        .run(day("2024-05-01"), day("2024-05-02"))
        .await
        .unwrap();
    assert_eq!(summary.completed, 2);
    assert_eq!(summary.no_data, 2);
    assert_eq!(summary.failed, 0);
    assert!(store.stored_days().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_inverted_range_is_rejected_before_work() {
    let store = SwathStore::open_memory().await.unwrap();
    let lister = Arc::new(FakeLister::with_keys(evening_keys()));
    let (driver, _cache) = driver(lister.clone(), decoder(), store);

    let err = driver
        .run(day("2024-05-03"), day("2024-05-01"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IngestionError::Swath(SwathError::InvalidParameter { .. })
    ));
    assert_eq!(lister.calls(), 0);
}

#[tokio::test]
async fn test_single_day_range() {
    let store = SwathStore::open_memory().await.unwrap();
    let lister = Arc::new(FakeLister::with_keys(evening_keys()));
    let (driver, _cache) = driver(lister, decoder(), store);

    let summary = driver
        .run(day("2024-05-02"), day("2024-05-02"))
        .await
        .unwrap();
    assert_eq!(summary.total, 1);
    assert_eq!(summary.completed, 1);
}
