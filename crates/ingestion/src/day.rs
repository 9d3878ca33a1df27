//! Per-day ingestion state machine.

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use grid_processor::{
    normalize, GridDecoder, MaxCompositor, NormalizeParams, SwathExtractor, SwathTags,
};
use storage::{DayRecord, ReadFilter, SwathStore};
use swath_common::{format_time, DataWindow, DayKey, Grid, SwathCollection, ThresholdSet};

use crate::config::{IngestionConfig, ProductConfig};
use crate::error::Result;
use crate::sources::{list_window, MrmsS3Source, SourceFetcher, SourceLister};

/// How a day's run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    /// The day was already stored, or a concurrent run stored it while this
    /// one found no usable data.
    Cached,
    /// Sources were processed and the Day Record stored. `inserted` is zero
    /// when a concurrent run stored the day first.
    Ingested { swaths: usize, inserted: usize },
    /// No usable source data. Nothing is stored, so a later run retries.
    NoData { reason: String },
}

/// Result of one day's run: the outcome and the day's full, unfiltered swaths.
#[derive(Debug, Clone, PartialEq)]
pub struct DayResult {
    pub day: DayKey,
    pub outcome: DayOutcome,
    pub swaths: SwathCollection,
}

impl DayResult {
    fn cached(day: DayKey, swaths: SwathCollection) -> Self {
        Self {
            day,
            outcome: DayOutcome::Cached,
            swaths,
        }
    }
}

/// Runs the ingestion state machine for single days.
///
/// Cloning is cheap; every collaborator is shared.
#[derive(Clone)]
pub struct DayIngester {
    store: SwathStore,
    lister: Arc<dyn SourceLister>,
    fetcher: Arc<dyn SourceFetcher>,
    decoder: Arc<dyn GridDecoder>,
    product: ProductConfig,
    extractor: SwathExtractor,
}

impl DayIngester {
    /// Build an ingester from explicit collaborators.
    ///
    /// Extraction always runs unclipped; any clip in `extractor` is ignored.
    pub fn new(
        store: SwathStore,
        lister: Arc<dyn SourceLister>,
        fetcher: Arc<dyn SourceFetcher>,
        decoder: Arc<dyn GridDecoder>,
        product: ProductConfig,
        extractor: SwathExtractor,
    ) -> Self {
        let params = extractor.params().clone().with_clip(None);
        Self {
            store,
            lister,
            fetcher,
            decoder,
            product,
            extractor: SwathExtractor::new(params),
        }
    }

    /// Build an ingester against the public MRMS bucket with GRIB2 decoding.
    pub fn from_config(config: &IngestionConfig, store: SwathStore) -> Result<Self> {
        config.validate()?;
        let source = Arc::new(MrmsS3Source::new(&config.source)?);
        Ok(Self::new(
            store,
            source.clone(),
            source,
            Arc::new(grid_processor::Grib2Decoder),
            config.product.clone(),
            SwathExtractor::new(config.extraction.clone()),
        ))
    }

    pub fn store(&self) -> &SwathStore {
        &self.store
    }

    /// Ensure `day` is ingested and return its full Day Record swaths.
    ///
    /// Fetch and decode failures never surface as errors: they yield
    /// [`DayOutcome::NoData`]. Only store failures are returned as `Err`.
    #[instrument(skip(self), fields(date = %day))]
    pub async fn run(&self, day: DayKey) -> Result<DayResult> {
        let started = Instant::now();

        info!(stage = "CHECK_STORE", "Checking store");
        if self.store.exists(day).await? {
            let swaths = self.store.read(day, &ReadFilter::all()).await?;
            counter!("swath_days_cached_total").increment(1);
            info!(stage = "DONE", swaths = swaths.len(), "Day already stored");
            return Ok(DayResult::cached(day, swaths));
        }

        let window = DataWindow::for_day(day);
        info!(
            stage = "LIST_SOURCE",
            start = %window.start_string(),
            end = %window.end_string(),
            "Listing source files"
        );
        let mut keys = list_window(self.lister.as_ref(), &self.product, &window).await;
        if keys.is_empty() {
            return self.no_data(day, "no source files listed").await;
        }
        if self.product.is_rolling_day() {
            // Each file already holds the maximum over a full day.
            keys = keys.split_off(keys.len() - 1);
        }

        info!(stage = "FETCH_SOURCE", count = keys.len(), "Fetching source files");
        let mut fetched = Vec::with_capacity(keys.len());
        for key in &keys {
            match self.fetcher.fetch(key).await {
                Ok(path) => fetched.push(path),
                Err(e) => warn!(key = %key, error = %e, "Fetch failed, skipping file"),
            }
        }
        if fetched.is_empty() {
            return self.no_data(day, "no source files could be fetched").await;
        }

        info!(stage = "DECODE", count = fetched.len(), "Decoding source files");
        let decoder = self.decoder.clone();
        let params = self.product.normalize_params();
        let paths = fetched.clone();
        let (composite, source_files) = tokio::task::spawn_blocking(move || {
            decode_and_composite(decoder.as_ref(), &params, &paths)
        })
        .await?;
        let Some(grid) = composite else {
            return self.no_data(day, "no source files could be decoded").await;
        };
        info!(
            stage = "COMPOSITE",
            grids = source_files.len(),
            valid_cells = grid.valid_count(),
            "Composited grids"
        );

        info!(stage = "EXTRACT", "Extracting swaths");
        let created_at = format_time(Utc::now());
        let tags = SwathTags {
            product: self.product.name.clone(),
            start_time: window.start_string(),
            end_time: window.end_string(),
            source_files: source_files.clone(),
            created_at: created_at.clone(),
        };
        let extractor = self.extractor.clone();
        let swaths = tokio::task::spawn_blocking(move || {
            extractor.extract(&grid, &ThresholdSet::canonical(), &tags)
        })
        .await?;

        info!(stage = "STORE", swaths = swaths.len(), "Storing day record");
        let record = DayRecord {
            day,
            product: self.product.name.clone(),
            start_time: window.start_string(),
            end_time: window.end_string(),
            source_files,
            created_at,
            swaths,
        };
        let inserted = self.store.insert(&record).await?;
        counter!("swath_polygons_stored_total").increment(inserted as u64);

        info!(stage = "CLEANUP", files = fetched.len(), "Removing fetched files");
        for path in &fetched {
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "Failed to remove fetched file");
            }
        }

        // Read back so a lost insert race returns the winner's record.
        let stored = self.store.read(day, &ReadFilter::all()).await?;
        info!(
            stage = "DONE",
            swaths = stored.len(),
            inserted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Day ingested"
        );

        Ok(DayResult {
            day,
            outcome: DayOutcome::Ingested {
                swaths: record.swaths.len(),
                inserted,
            },
            swaths: stored,
        })
    }

    /// A concurrent run may have stored the day while this one was losing
    /// its files, so the store is checked again before reporting no data.
    async fn no_data(&self, day: DayKey, reason: &str) -> Result<DayResult> {
        if self.store.exists(day).await? {
            let swaths = self.store.read(day, &ReadFilter::all()).await?;
            info!(stage = "DONE", reason, "Day stored by a concurrent run");
            return Ok(DayResult::cached(day, swaths));
        }
        info!(stage = "DONE", reason, "No data available for day");
        Ok(DayResult {
            day,
            outcome: DayOutcome::NoData {
                reason: reason.to_string(),
            },
            swaths: SwathCollection::empty(),
        })
    }

    /// Read `day` with the caller's filters, ingesting it first if it is
    /// not stored. Only the requested threshold groups are loaded.
    pub async fn swaths(&self, day: DayKey, filter: &ReadFilter) -> Result<SwathCollection> {
        if !self.store.exists(day).await? {
            let result = self.run(day).await?;
            if let DayOutcome::NoData { .. } = result.outcome {
                return Ok(SwathCollection::empty());
            }
        }
        Ok(self.store.read(day, filter).await?)
    }
}

/// Decode, normalize and max-composite files one at a time. Files that fail,
/// including ones that panic the decoder, are logged and skipped. Returns the
/// composite and the names of the files that contributed to it.
fn decode_and_composite(
    decoder: &dyn GridDecoder,
    params: &NormalizeParams,
    paths: &[PathBuf],
) -> (Option<Grid>, Vec<String>) {
    let mut compositor = MaxCompositor::new();
    let mut used = Vec::new();

    for path in paths {
        let decoded = match panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(path))) {
            Ok(decoded) => decoded,
            Err(_) => {
                warn!(path = %path.display(), "Decoder panicked, skipping file");
                continue;
            }
        };
        let grid = decoded
            .and_then(|raw| normalize(&raw, params))
            .and_then(|(grid, _)| compositor.add(grid));
        match grid {
            Ok(()) => {
                debug!(path = %path.display(), "Added grid to composite");
                used.push(
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string()),
                );
            }
            Err(e) => warn!(path = %path.display(), error = %e, "Decode failed, skipping file"),
        }
    }

    (compositor.finish(), used)
}
