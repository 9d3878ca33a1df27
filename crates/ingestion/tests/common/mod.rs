//! Fake source collaborators that record their calls.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use grid_processor::{GridDecoder, GridProcessorError, RawGrid, SwathExtractor};
use ingestion::{DayIngester, IngestionError, ProductConfig, SourceFetcher, SourceLister};
use storage::SwathStore;
use swath_common::Grid;

pub const PREFIX: &str = "CONUS/MESH_Max_1440min_00.50";

/// Object key for a file stamped `date` (YYYYMMDD) at `time` (HHMMSS).
pub fn key(date: &str, time: &str) -> String {
    format!(
        "{}/{}/MRMS_MESH_Max_1440min_00.50_{}-{}.grib2.gz",
        PREFIX, date, date, time
    )
}

/// Name the fetcher gives the local copy of `key`.
pub fn local_name(key: &str) -> String {
    key.rsplit('/')
        .next()
        .unwrap()
        .trim_end_matches(".gz")
        .to_string()
}

/// Product settings with values already in inches.
pub fn product(window_minutes: u32) -> ProductConfig {
    ProductConfig {
        window_minutes,
        unit_scale: 1.0,
        ..Default::default()
    }
}

/// Lists a fixed set of keys, or fails every prefix. Prefixes containing
/// `panic_on` panic.
pub struct FakeLister {
    keys: Vec<String>,
    fail: bool,
    panic_on: Option<String>,
    calls: AtomicUsize,
}

impl FakeLister {
    pub fn with_keys(keys: Vec<String>) -> Self {
        Self {
            keys,
            fail: false,
            panic_on: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::with_keys(Vec::new())
        }
    }

    pub fn panicking_on(mut self, pattern: &str) -> Self {
        self.panic_on = Some(pattern.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceLister for FakeLister {
    async fn list_prefix(&self, prefix: &str) -> ingestion::Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(pattern) = &self.panic_on {
            if prefix.contains(pattern.as_str()) {
                panic!("listing {} crashed", prefix);
            }
        }
        if self.fail {
            return Err(IngestionError::Listing(format!("{}: connection reset", prefix)));
        }
        Ok(self
            .keys
            .iter()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// Writes a placeholder file per key into a directory.
pub struct FakeFetcher {
    dir: PathBuf,
    fail: bool,
    fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            fail: false,
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(dir: &Path) -> Self {
        Self {
            fail: true,
            ..Self::new(dir)
        }
    }

    pub fn calls(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, source_id: &str) -> ingestion::Result<PathBuf> {
        self.fetched.lock().unwrap().push(source_id.to_string());
        if self.fail {
            return Err(IngestionError::fetch(source_id, "download failed: 503"));
        }
        let path = self.dir.join(local_name(source_id));
        tokio::fs::write(&path, b"GRIB").await?;
        Ok(path)
    }
}

/// Serves grids by local file name. Unknown names fail to decode; names
/// containing `panic_on` panic.
pub struct FakeDecoder {
    grids: HashMap<String, Grid>,
    panic_on: Option<String>,
}

impl FakeDecoder {
    pub fn new(grids: impl IntoIterator<Item = (String, Grid)>) -> Self {
        Self {
            grids: grids.into_iter().collect(),
            panic_on: None,
        }
    }

    pub fn panicking_on(mut self, pattern: &str) -> Self {
        self.panic_on = Some(pattern.to_string());
        self
    }
}

impl GridDecoder for FakeDecoder {
    fn decode(&self, path: &Path) -> grid_processor::Result<RawGrid> {
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        if let Some(pattern) = &self.panic_on {
            if name.contains(pattern.as_str()) {
                panic!("corrupt grid {}", name);
            }
        }
        let grid = self
            .grids
            .get(&name)
            .ok_or_else(|| GridProcessorError::decode_failed(format!("{}: bad section 0", name)))?;
        Ok(to_raw(grid))
    }
}

/// Inverse of `normalize`: cell-center axes, rows north to south.
pub fn to_raw(grid: &Grid) -> RawGrid {
    let lats = (0..grid.height())
        .map(|row| grid.transform().cell_center(row, 0).1)
        .collect();
    let lons = (0..grid.width())
        .map(|col| grid.transform().cell_center(0, col).0)
        .collect();
    RawGrid {
        values: grid.values().to_vec(),
        lats,
        lons,
    }
}

/// Everything a day-pipeline test needs, with handles on the fakes.
pub struct Harness {
    pub store: SwathStore,
    pub lister: Arc<FakeLister>,
    pub fetcher: Arc<FakeFetcher>,
    pub ingester: DayIngester,
    pub cache: tempfile::TempDir,
}

pub async fn harness(
    lister: FakeLister,
    fetcher: impl FnOnce(&Path) -> FakeFetcher,
    decoder: FakeDecoder,
    product: ProductConfig,
) -> Harness {
    let store = SwathStore::open_memory().await.unwrap();
    harness_on(store, lister, fetcher, decoder, product)
}

/// [`harness`] against a caller-supplied store.
pub fn harness_on(
    store: SwathStore,
    lister: FakeLister,
    fetcher: impl FnOnce(&Path) -> FakeFetcher,
    decoder: FakeDecoder,
    product: ProductConfig,
) -> Harness {
    let cache = tempfile::tempdir().unwrap();
    let lister = Arc::new(lister);
    let fetcher = Arc::new(fetcher(cache.path()));
    let ingester = DayIngester::new(
        store.clone(),
        lister.clone(),
        fetcher.clone(),
        Arc::new(decoder),
        product,
        SwathExtractor::default(),
    );
    Harness {
        store,
        lister,
        fetcher,
        ingester,
        cache,
    }
}
