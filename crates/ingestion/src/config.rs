//! Ingestion configuration.

use std::env;
use std::path::{Path, PathBuf};

use grid_processor::{ExtractionParams, NormalizeParams, MM_TO_INCHES, MRMS_MISSING_VALUE};
use serde::{Deserialize, Serialize};

use crate::error::{IngestionError, Result};

/// Minutes in one full day; products with a window at least this long are
/// already a daily maximum.
pub const FULL_DAY_MINUTES: u32 = 1440;

/// The MRMS product being ingested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductConfig {
    /// Product name written into every swath's attributes.
    pub name: String,
    /// Object key prefix; per-date folders `{prefix}/{YYYYMMDD}/` sit below it.
    pub prefix: String,
    /// Rolling accumulation window of each published file.
    pub window_minutes: u32,
    /// Sentinel marking missing cells in decoded files.
    pub missing_value: f64,
    /// Multiplier from decoded units to inches.
    pub unit_scale: f64,
}

impl Default for ProductConfig {
    fn default() -> Self {
        Self {
            name: "MESH_Max_1440min".to_string(),
            prefix: "CONUS/MESH_Max_1440min_00.50".to_string(),
            window_minutes: FULL_DAY_MINUTES,
            missing_value: MRMS_MISSING_VALUE,
            unit_scale: MM_TO_INCHES,
        }
    }
}

impl ProductConfig {
    /// Whether a single file already covers the whole day.
    pub fn is_rolling_day(&self) -> bool {
        self.window_minutes >= FULL_DAY_MINUTES
    }

    pub fn normalize_params(&self) -> NormalizeParams {
        NormalizeParams {
            missing_value: self.missing_value,
            unit_scale: self.unit_scale,
        }
    }
}

/// Where source files come from and where they are cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub bucket: String,
    /// Base URL override (e.g. a mirror). Defaults to the bucket's public S3 endpoint.
    pub endpoint: Option<String>,
    pub cache_dir: PathBuf,
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            bucket: "noaa-mrms-pds".to_string(),
            endpoint: None,
            cache_dir: PathBuf::from("./cache"),
            timeout_secs: 300,
        }
    }
}

impl SourceConfig {
    /// Base URL that object keys are appended to.
    pub fn base_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.s3.amazonaws.com", self.bucket),
        }
    }
}

/// Top-level ingestion configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// SQLite database holding the swath store.
    pub database_path: PathBuf,

    /// Number of days ingested concurrently by the batch driver.
    pub concurrency: usize,

    /// Default batch length, counted back from yesterday.
    pub lookback_days: u32,

    pub product: ProductConfig,
    pub source: SourceConfig,
    pub extraction: ExtractionParams,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("./data/swaths.db"),
            concurrency: 4,
            lookback_days: 5 * 365,
            product: ProductConfig::default(),
            source: SourceConfig::default(),
            extraction: ExtractionParams::default(),
        }
    }
}

impl IngestionConfig {
    /// Load configuration from a YAML file. Missing keys take their defaults.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| {
            IngestionError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self {
            extraction: ExtractionParams::from_env(),
            ..Self::default()
        };

        if let Ok(val) = env::var("DATABASE_PATH") {
            config.database_path = PathBuf::from(val);
        }
        if let Ok(val) = env::var("CACHE_DIR") {
            config.source.cache_dir = PathBuf::from(val);
        }
        if let Ok(val) = env::var("MRMS_BUCKET") {
            config.source.bucket = val;
        }
        if let Ok(val) = env::var("MRMS_ENDPOINT") {
            config.source.endpoint = Some(val);
        }
        if let Ok(val) = env::var("MRMS_PRODUCT") {
            config.product.name = val;
        }
        if let Ok(val) = env::var("MRMS_PREFIX") {
            config.product.prefix = val;
        }
        config.product.window_minutes =
            parse_env("MRMS_WINDOW_MINUTES", config.product.window_minutes)?;
        config.concurrency = parse_env("INGEST_CONCURRENCY", config.concurrency)?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(IngestionError::InvalidConfig(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.product.prefix.trim_matches('/').is_empty() {
            return Err(IngestionError::InvalidConfig(
                "product prefix must not be empty".to_string(),
            ));
        }
        if !(self.product.unit_scale.is_finite() && self.product.unit_scale > 0.0) {
            return Err(IngestionError::InvalidConfig(
                "unit_scale must be positive".to_string(),
            ));
        }
        self.extraction
            .validate()
            .map_err(|e| IngestionError::InvalidConfig(e.to_string()))?;
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map_err(|_| IngestionError::InvalidConfig(format!("{} is not valid: {}", name, val))),
        Err(_) => Ok(default),
    }
}
