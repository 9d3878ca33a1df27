//! Source listing and retrieval collaborators.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use flate2::read::GzDecoder;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use swath_common::DataWindow;

use crate::config::{ProductConfig, SourceConfig};
use crate::error::{IngestionError, Result};

/// Lists object keys below a prefix.
#[async_trait]
pub trait SourceLister: Send + Sync {
    /// Every key under `prefix`, in any order.
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Retrieves a source object to the local filesystem.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    /// Local path of the decompressed file. Fetching an identifier that is
    /// already cached returns the existing path without any network call.
    async fn fetch(&self, source_id: &str) -> Result<PathBuf>;
}

/// Source identifiers for `product` whose embedded timestamp falls inside
/// `window`, sorted by timestamp.
///
/// One prefix is listed per UTC date the window touches. A prefix that
/// fails to list is logged and skipped, so a total outage yields an empty
/// list rather than an error.
#[instrument(skip(lister, product), fields(product = %product.name, start = %window.start_string()))]
pub async fn list_window(
    lister: &dyn SourceLister,
    product: &ProductConfig,
    window: &DataWindow,
) -> Vec<String> {
    let mut found: Vec<(DateTime<Utc>, String)> = Vec::new();

    for day in window.days() {
        let prefix = format!("{}/{}/", product.prefix.trim_end_matches('/'), day.compact());
        match lister.list_prefix(&prefix).await {
            Ok(keys) => {
                debug!(prefix = %prefix, count = keys.len(), "Listed prefix");
                found.extend(keys.into_iter().filter_map(|key| {
                    parse_key_time(&key)
                        .filter(|t| window.contains(*t))
                        .map(|t| (t, key))
                }));
            }
            Err(e) => {
                warn!(prefix = %prefix, error = %e, "Listing failed, skipping prefix");
            }
        }
    }

    found.sort();
    found.dedup();
    found.into_iter().map(|(_, key)| key).collect()
}

/// Timestamp embedded in an MRMS object name, e.g.
/// `MRMS_MESH_Max_1440min_00.50_20240501-120000.grib2.gz` → 2024-05-01 12:00:00Z.
pub fn parse_key_time(key: &str) -> Option<DateTime<Utc>> {
    let name = file_name(key);
    let stem = name.trim_end_matches(".gz").trim_end_matches(".grib2");
    let stamp = stem.rsplit('_').next()?;
    NaiveDateTime::parse_from_str(stamp, "%Y%m%d-%H%M%S")
        .ok()
        .map(|t| t.and_utc())
}

fn file_name(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

// ============================================================================
// MRMS public bucket
// ============================================================================

/// `ListObjectsV2` response body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListBucketResult {
    #[serde(default)]
    contents: Vec<S3Object>,
    #[serde(default)]
    is_truncated: bool,
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct S3Object {
    key: String,
}

fn parse_list_response(body: &str) -> Result<ListBucketResult> {
    quick_xml::de::from_str(body)
        .map_err(|e| IngestionError::Listing(format!("malformed ListBucketResult: {}", e)))
}

/// Anonymous HTTP access to the public MRMS bucket, with a local file cache.
pub struct MrmsS3Source {
    client: Client,
    base_url: String,
    cache_dir: PathBuf,
}

impl MrmsS3Source {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IngestionError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            cache_dir: config.cache_dir.clone(),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Cache path for a source identifier, with any `.gz` suffix removed.
    pub fn cache_path(&self, source_id: &str) -> PathBuf {
        self.cache_dir
            .join(file_name(source_id).trim_end_matches(".gz"))
    }

    async fn download(&self, source_id: &str, local_path: &Path) -> Result<()> {
        let url = format!("{}/{}", self.base_url, source_id);
        debug!(url = %url, "Downloading file");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(IngestionError::fetch(
                source_id,
                format!("download failed: {}", response.status()),
            ));
        }
        let bytes = response.bytes().await?;

        let part_path = part_path(local_path);
        if source_id.ends_with(".gz") {
            let compressed = self.cache_dir.join(file_name(source_id));
            tokio::fs::write(&compressed, &bytes).await?;

            let (src, dst) = (compressed.clone(), part_path.clone());
            let unpacked = tokio::task::spawn_blocking(move || gunzip(&src, &dst)).await?;
            let _ = tokio::fs::remove_file(&compressed).await;
            let unpacked = unpacked?;
            debug!(compressed = bytes.len(), unpacked, "Decompressed file");
        } else {
            tokio::fs::write(&part_path, &bytes).await?;
        }

        tokio::fs::rename(&part_path, local_path).await?;
        info!(size = bytes.len(), path = %local_path.display(), "Downloaded file");
        Ok(())
    }
}

#[async_trait]
impl SourceLister for MrmsS3Source {
    #[instrument(skip(self))]
    async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let list_url = format!("{}/", self.base_url);
        let mut keys = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .get(&list_url)
                .query(&[("list-type", "2"), ("prefix", prefix)]);
            if let Some(t) = &token {
                request = request.query(&[("continuation-token", t.as_str())]);
            }

            let response = request.send().await.map_err(|e| {
                IngestionError::Listing(format!("{}: {}", prefix, e))
            })?;
            if !response.status().is_success() {
                return Err(IngestionError::Listing(format!(
                    "{}: S3 list failed: {}",
                    prefix,
                    response.status()
                )));
            }
            let body = response
                .text()
                .await
                .map_err(|e| IngestionError::Listing(format!("{}: {}", prefix, e)))?;

            let page = parse_list_response(&body)?;
            keys.extend(page.contents.into_iter().map(|o| o.key));

            match (page.is_truncated, page.next_continuation_token) {
                (true, Some(next)) => token = Some(next),
                _ => break,
            }
        }

        Ok(keys)
    }
}

#[async_trait]
impl SourceFetcher for MrmsS3Source {
    #[instrument(skip(self))]
    async fn fetch(&self, source_id: &str) -> Result<PathBuf> {
        let local_path = self.cache_path(source_id);
        if tokio::fs::try_exists(&local_path).await.unwrap_or(false) {
            debug!(path = %local_path.display(), "Using cached file");
            return Ok(local_path);
        }

        tokio::fs::create_dir_all(&self.cache_dir).await?;

        if let Err(e) = self.download(source_id, &local_path).await {
            let _ = tokio::fs::remove_file(part_path(&local_path)).await;
            let _ = tokio::fs::remove_file(self.cache_dir.join(file_name(source_id))).await;
            return Err(match e {
                e @ IngestionError::Fetch { .. } => e,
                other => IngestionError::fetch(source_id, other),
            });
        }

        Ok(local_path)
    }
}

fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Decompress `src` into `dst`, returning the decompressed size.
fn gunzip(src: &Path, dst: &Path) -> Result<u64> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(src)?));
    let mut out = BufWriter::new(File::create(dst)?);
    let written = std::io::copy(&mut decoder, &mut out)
        .map_err(|e| IngestionError::Decompression(format!("{}: {}", src.display(), e)))?;
    out.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::sync::Mutex;
    use swath_common::DayKey;

    #[test]
    fn test_parse_key_time() {
        let t = parse_key_time(
            "CONUS/MESH_Max_1440min_00.50/20240501/MRMS_MESH_Max_1440min_00.50_20240501-120000.grib2.gz",
        )
        .unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

        let t = parse_key_time("MRMS_MESH_Max_60min_00.50_20240502-013000.grib2").unwrap();
        assert_eq!(t, Utc.with_ymd_and_hms(2024, 5, 2, 1, 30, 0).unwrap());

        assert!(parse_key_time("CONUS/MESH_Max_1440min_00.50/20240501/").is_none());
        assert!(parse_key_time("README.txt").is_none());
    }

    #[test]
    fn test_parse_list_response() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<ListBucketResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <Name>noaa-mrms-pds</Name>
  <Prefix>CONUS/MESH_Max_1440min_00.50/20240501/</Prefix>
  <KeyCount>2</KeyCount>
  <MaxKeys>1000</MaxKeys>
  <IsTruncated>true</IsTruncated>
  <NextContinuationToken>abc123</NextContinuationToken>
  <Contents>
    <Key>CONUS/MESH_Max_1440min_00.50/20240501/MRMS_MESH_Max_1440min_00.50_20240501-000000.grib2.gz</Key>
    <Size>12345</Size>
  </Contents>
  <Contents>
    <Key>CONUS/MESH_Max_1440min_00.50/20240501/MRMS_MESH_Max_1440min_00.50_20240501-000200.grib2.gz</Key>
    <Size>12346</Size>
  </Contents>
</ListBucketResult>"#;

        let page = parse_list_response(body).unwrap();
        assert_eq!(page.contents.len(), 2);
        assert!(page.is_truncated);
        assert_eq!(page.next_continuation_token.as_deref(), Some("abc123"));
        assert!(page.contents[1].key.ends_with("000200.grib2.gz"));
    }

    #[test]
    fn test_parse_empty_list_response() {
        let body = r#"<ListBucketResult><Name>noaa-mrms-pds</Name><KeyCount>0</KeyCount><IsTruncated>false</IsTruncated></ListBucketResult>"#;
        let page = parse_list_response(body).unwrap();
        assert!(page.contents.is_empty());
        assert!(!page.is_truncated);
    }

    struct StaticLister {
        prefixes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SourceLister for StaticLister {
        async fn list_prefix(&self, prefix: &str) -> Result<Vec<String>> {
            self.prefixes.lock().unwrap().push(prefix.to_string());
            if prefix.ends_with("20240501/") {
                Ok(vec![
                    format!("{}MRMS_MESH_Max_1440min_00.50_20240501-180000.grib2.gz", prefix),
                    format!("{}MRMS_MESH_Max_1440min_00.50_20240501-060000.grib2.gz", prefix),
                    format!("{}MRMS_MESH_Max_1440min_00.50_20240501-120000.grib2.gz", prefix),
                ])
            } else {
                Err(IngestionError::Listing("boom".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_list_window_filters_and_sorts() {
        let lister = StaticLister {
            prefixes: Mutex::new(Vec::new()),
        };
        let window = DataWindow::for_day(DayKey::parse("2024-05-01").unwrap());
        let keys = list_window(&lister, &ProductConfig::default(), &window).await;

        assert_eq!(
            *lister.prefixes.lock().unwrap(),
            vec![
                "CONUS/MESH_Max_1440min_00.50/20240501/".to_string(),
                "CONUS/MESH_Max_1440min_00.50/20240502/".to_string(),
            ]
        );
        // 06:00 is before the noon start; the failing second prefix is skipped.
        assert_eq!(keys.len(), 2);
        assert!(keys[0].ends_with("120000.grib2.gz"));
        assert!(keys[1].ends_with("180000.grib2.gz"));
    }

    #[tokio::test]
    async fn test_fetch_uses_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = SourceConfig {
            // Nothing listens here; a cache hit must not touch the network.
            endpoint: Some("http://127.0.0.1:9".to_string()),
            cache_dir: dir.path().to_path_buf(),
            timeout_secs: 1,
            ..Default::default()
        };
        let source = MrmsS3Source::new(&config).unwrap();
        let key = "CONUS/X/20240501/MRMS_X_20240501-120000.grib2.gz";
        let cached = dir.path().join("MRMS_X_20240501-120000.grib2");
        std::fs::write(&cached, b"GRIB").unwrap();

        assert_eq!(source.cache_path(key), cached);
        assert_eq!(source.fetch(key).await.unwrap(), cached);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = SourceConfig {
            endpoint: Some("http://127.0.0.1:9".to_string()),
            cache_dir: dir.path().to_path_buf(),
            timeout_secs: 1,
            ..Default::default()
        };
        let source = MrmsS3Source::new(&config).unwrap();
        let result = source.fetch("CONUS/X/20240501/MRMS_X_20240501-120000.grib2.gz").await;

        assert!(matches!(result, Err(IngestionError::Fetch { .. })));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_gunzip() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.grib2.gz");
        let dst = dir.path().join("a.grib2");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"GRIB payload").unwrap();
        std::fs::write(&src, encoder.finish().unwrap()).unwrap();

        assert_eq!(gunzip(&src, &dst).unwrap(), 12);
        assert_eq!(std::fs::read(&dst).unwrap(), b"GRIB payload");
    }

    #[test]
    fn test_gunzip_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.grib2.gz");
        std::fs::write(&src, b"not gzip").unwrap();
        assert!(matches!(
            gunzip(&src, &dir.path().join("a.grib2")),
            Err(IngestionError::Decompression(_))
        ));
    }
}
