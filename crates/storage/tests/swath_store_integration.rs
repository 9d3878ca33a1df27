//! File-backed store behavior: persistence, concurrent writers and region reads.

use futures::future::join_all;
use geo::Area;
use storage::{DayRecord, ReadFilter, SwathStore};
use swath_common::{DayKey, SwathCollection, ThresholdSet};
use test_utils::{bbox, bounding_box, days, sample_collection, square_swath};

fn storm_record(created_at: &str) -> DayRecord {
    DayRecord {
        day: DayKey::parse(days::STORM_DAY).unwrap(),
        product: "MESH_Max_1440min".to_string(),
        start_time: "2024-05-01T12:00:00Z".to_string(),
        end_time: "2024-05-02T12:00:00Z".to_string(),
        source_files: vec!["MRMS_MESH_Max_1440min_00.50_20240502-120000.grib2".to_string()],
        created_at: created_at.to_string(),
        swaths: sample_collection(),
    }
}

#[tokio::test]
async fn test_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("swaths.db");
    let day = DayKey::parse(days::STORM_DAY).unwrap();

    {
        let store = SwathStore::open(&path).await.unwrap();
        assert_eq!(store.insert(&storm_record("2024-05-03T00:00:00Z")).await.unwrap(), 4);
    }

    let store = SwathStore::open(&path).await.unwrap();
    assert!(store.exists(day).await.unwrap());
    let out = store.read(day, &ReadFilter::all()).await.unwrap();
    assert_eq!(out, sample_collection());

    let info = store.day_info(day).await.unwrap().unwrap();
    assert_eq!(info.source_files.len(), 1);
    assert_eq!(info.feature_count, 4);
}

#[tokio::test]
async fn test_concurrent_inserts_store_one_copy() {
    let dir = tempfile::tempdir().unwrap();
    let store = SwathStore::open(&dir.path().join("swaths.db")).await.unwrap();

    let writers = (0..4).map(|i| {
        let store = store.clone();
        async move {
            let record = storm_record(&format!("2024-05-03T00:00:0{}Z", i));
            store.insert(&record).await.unwrap()
        }
    });
    let inserted: Vec<usize> = join_all(writers).await;

    assert_eq!(inserted.iter().sum::<usize>(), 4);
    assert_eq!(inserted.iter().filter(|n| **n > 0).count(), 1);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.days, 1);
    assert_eq!(stats.features, 4);
}

#[tokio::test]
async fn test_read_with_disjoint_region_is_empty() {
    let store = SwathStore::open_memory().await.unwrap();
    let day = DayKey::parse(days::STORM_DAY).unwrap();
    store.insert(&storm_record("2024-05-03T00:00:00Z")).await.unwrap();

    let filter = ReadFilter::all().with_region(bounding_box(bbox::ATLANTIC));
    assert!(store.read(day, &filter).await.unwrap().is_empty());
    // The day itself is still there.
    assert!(store.exists(day).await.unwrap());
}

#[tokio::test]
async fn test_read_clips_to_region() {
    let store = SwathStore::open_memory().await.unwrap();
    let day = DayKey::parse(days::STORM_DAY).unwrap();
    let mut record = storm_record("2024-05-03T00:00:00Z");
    record.swaths = SwathCollection::new(vec![square_swath(1.0, -99.6, 39.4, 0.2)]);
    store.insert(&record).await.unwrap();

    // Covers the western half of the square.
    let region = swath_common::BoundingBox::new(-99.7, 39.3, -99.5, 39.7);
    let out = store
        .read(day, &ReadFilter::all().with_region(region))
        .await
        .unwrap();
    assert_eq!(out.len(), 1);
    let area = out.features[0].geometry.unsigned_area();
    assert!((area - 0.02).abs() < 1e-9, "area {}", area);

    let stored = store.read(day, &ReadFilter::all()).await.unwrap();
    assert!((stored.features[0].geometry.unsigned_area() - 0.04).abs() < 1e-9);
}

#[tokio::test]
async fn test_threshold_and_region_filters_combine() {
    let store = SwathStore::open_memory().await.unwrap();
    let day = DayKey::parse(days::STORM_DAY).unwrap();
    store.insert(&storm_record("2024-05-03T00:00:00Z")).await.unwrap();

    // Only the 1.0 inch square near the north-west corner falls in this box.
    let region = swath_common::BoundingBox::new(-99.95, 39.85, -99.8, 40.0);
    let filter = ReadFilter::all()
        .with_thresholds(ThresholdSet::parse("1.0").unwrap())
        .with_region(region);
    let out = store.read(day, &filter).await.unwrap();
    assert_eq!(out.len(), 1);
    assert_eq!(out.features[0].properties.threshold, 1.0);
}

#[tokio::test]
async fn test_missing_day_reads_empty() {
    let store = SwathStore::open_memory().await.unwrap();
    let day = DayKey::parse(days::QUIET_DAY).unwrap();
    assert!(!store.exists(day).await.unwrap());
    assert!(store.read(day, &ReadFilter::all()).await.unwrap().is_empty());
    assert!(store.day_info(day).await.unwrap().is_none());
}
