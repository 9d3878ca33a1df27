//! Swath persistence using SQLite with sqlx.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use geojson::Feature;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::{debug, info, instrument};

use swath_common::{
    clip_to_region, BoundingBox, DayKey, SwathCollection, SwathError, SwathPolygon, SwathResult,
    ThresholdSet,
};

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS swath_days (
    valid_date TEXT PRIMARY KEY,
    product TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    source_files TEXT NOT NULL,
    created_at TEXT NOT NULL,
    feature_count INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS swath_groups (
    valid_date TEXT NOT NULL REFERENCES swath_days(valid_date) ON DELETE CASCADE,
    threshold_key INTEGER NOT NULL,
    features TEXT NOT NULL,
    feature_count INTEGER NOT NULL,
    PRIMARY KEY (valid_date, threshold_key)
)
"#;

fn db_err(context: &'static str) -> impl Fn(sqlx::Error) -> SwathError {
    move |e| SwathError::StorageError(format!("{}: {}", context, e))
}

/// Everything persisted for one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayRecord {
    pub day: DayKey,
    pub product: String,
    pub start_time: String,
    pub end_time: String,
    pub source_files: Vec<String>,
    pub created_at: String,
    /// Full-extent swaths for every canonical threshold.
    pub swaths: SwathCollection,
}

impl DayRecord {
    /// Features grouped by threshold key, in insertion order within a group.
    fn groups(&self) -> SwathResult<BTreeMap<u32, Vec<Feature>>> {
        let mut groups: BTreeMap<u32, Vec<Feature>> = BTreeMap::new();
        for swath in &self.swaths.features {
            let key = swath.properties.threshold_key()?.key();
            groups.entry(key).or_default().push(swath.to_feature()?);
        }
        Ok(groups)
    }
}

/// Read-time filters. Stored data is never filtered; filters apply on the way out.
#[derive(Debug, Clone, Default)]
pub struct ReadFilter {
    pub thresholds: Option<ThresholdSet>,
    pub region: Option<BoundingBox>,
}

impl ReadFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_thresholds(mut self, thresholds: ThresholdSet) -> Self {
        self.thresholds = Some(thresholds);
        self
    }

    pub fn with_region(mut self, region: BoundingBox) -> Self {
        self.region = Some(region);
        self
    }
}

/// Day-level metadata without the geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct DayInfo {
    pub day: DayKey,
    pub product: String,
    pub start_time: String,
    pub end_time: String,
    pub source_files: Vec<String>,
    pub created_at: String,
    pub feature_count: u64,
}

/// Store-wide counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub days: u64,
    pub groups: u64,
    pub features: u64,
}

/// Durable day-keyed swath repository.
///
/// The primary keys on `swath_days(valid_date)` and
/// `swath_groups(valid_date, threshold_key)` make concurrent inserts of the
/// same day resolve to exactly one stored copy.
#[derive(Debug, Clone)]
pub struct SwathStore {
    pool: SqlitePool,
}

impl SwathStore {
    /// Open or create the store at the given path.
    pub async fn open(path: &Path) -> SwathResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err("Failed to open SQLite database"))?;

        let store = Self { pool };
        store.migrate().await?;

        info!(path = %path.display(), "Opened swath store");
        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub async fn open_memory() -> SwathResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to ":memory:" is a separate database, so keep exactly one alive.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(db_err("Failed to open in-memory database"))?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> SwathResult<()> {
        for statement in SCHEMA_SQL.split(';') {
            let trimmed = statement.trim();
            if !trimmed.is_empty() {
                sqlx::query(trimmed)
                    .execute(&self.pool)
                    .await
                    .map_err(db_err("Migration failed"))?;
            }
        }
        Ok(())
    }

    /// Whether a Day Record exists for `day`.
    pub async fn exists(&self, day: DayKey) -> SwathResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM swath_days WHERE valid_date = ?")
            .bind(day.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Existence check failed"))?;
        Ok(row.is_some())
    }

    /// Insert a Day Record. Returns the number of swaths newly stored, which
    /// is zero when the day (or any of its threshold groups) already exists.
    #[instrument(skip(self, record), fields(day = %record.day))]
    pub async fn insert(&self, record: &DayRecord) -> SwathResult<usize> {
        let groups = record.groups()?;
        let day = record.day.to_string();
        let source_files = serde_json::to_string(&record.source_files)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        let day_rows = sqlx::query(
            r#"
            INSERT INTO swath_days (valid_date, product, start_time, end_time, source_files, created_at, feature_count)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (valid_date) DO NOTHING
            "#,
        )
        .bind(&day)
        .bind(&record.product)
        .bind(&record.start_time)
        .bind(&record.end_time)
        .bind(&source_files)
        .bind(&record.created_at)
        .bind(record.swaths.len() as i64)
        .execute(&mut *tx)
        .await
        .map_err(db_err("Failed to insert day"))?
        .rows_affected();

        if day_rows == 0 {
            tx.rollback()
                .await
                .map_err(db_err("Failed to roll back"))?;
            debug!("Day already stored, insert skipped");
            return Ok(0);
        }

        let mut inserted = 0usize;
        for (key, features) in &groups {
            let rows = sqlx::query(
                r#"
                INSERT INTO swath_groups (valid_date, threshold_key, features, feature_count)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (valid_date, threshold_key) DO NOTHING
                "#,
            )
            .bind(&day)
            .bind(*key as i64)
            .bind(serde_json::to_string(features)?)
            .bind(features.len() as i64)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to insert threshold group"))?
            .rows_affected();

            if rows > 0 {
                inserted += features.len();
            }
        }

        tx.commit()
            .await
            .map_err(db_err("Failed to commit day"))?;

        info!(groups = groups.len(), swaths = inserted, "Stored day record");
        Ok(inserted)
    }

    /// Read a day's swaths, highest threshold first.
    ///
    /// Only the groups named by `filter.thresholds` are loaded. With a region
    /// filter each swath is clipped to it and swaths left empty are dropped.
    /// A missing day reads as an empty collection; use [`Self::exists`] to
    /// tell the two apart.
    #[instrument(skip(self, filter), fields(day = %day))]
    pub async fn read(&self, day: DayKey, filter: &ReadFilter) -> SwathResult<SwathCollection> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT threshold_key, features FROM swath_groups WHERE valid_date = ");
        query.push_bind(day.to_string());

        if let Some(thresholds) = &filter.thresholds {
            if thresholds.is_empty() {
                return Ok(SwathCollection::empty());
            }
            query.push(" AND threshold_key IN (");
            let mut keys = query.separated(", ");
            for threshold in thresholds.ascending() {
                keys.push_bind(threshold.key() as i64);
            }
            keys.push_unseparated(")");
        }
        query.push(" ORDER BY threshold_key DESC");

        let rows: Vec<(i64, String)> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err("Failed to read threshold groups"))?;

        let mut swaths = Vec::new();
        for (_, features) in rows {
            let features: Vec<Feature> = serde_json::from_str(&features)?;
            for feature in features {
                let swath = SwathPolygon::from_feature(feature)?;
                match &filter.region {
                    None => swaths.push(swath),
                    Some(region) => {
                        if let Some(geometry) = clip_to_region(&swath.geometry, region) {
                            swaths.push(SwathPolygon {
                                geometry,
                                properties: swath.properties,
                            });
                        }
                    }
                }
            }
        }

        debug!(swaths = swaths.len(), "Read day");
        Ok(SwathCollection::new(swaths))
    }

    /// Day-level metadata, if the day is stored.
    pub async fn day_info(&self, day: DayKey) -> SwathResult<Option<DayInfo>> {
        let row: Option<(String, String, String, String, String, i64)> = sqlx::query_as(
            r#"
            SELECT product, start_time, end_time, source_files, created_at, feature_count
            FROM swath_days WHERE valid_date = ?
            "#,
        )
        .bind(day.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err("Failed to read day"))?;

        row.map(|row| {
            Ok(DayInfo {
                day,
                product: row.0,
                start_time: row.1,
                end_time: row.2,
                source_files: serde_json::from_str(&row.3)?,
                created_at: row.4,
                feature_count: row.5 as u64,
            })
        })
        .transpose()
    }

    /// Delete a day and all of its groups. Returns whether anything was removed.
    pub async fn remove(&self, day: DayKey) -> SwathResult<bool> {
        let day = day.to_string();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_err("Failed to begin transaction"))?;

        sqlx::query("DELETE FROM swath_groups WHERE valid_date = ?")
            .bind(&day)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to delete groups"))?;

        let removed = sqlx::query("DELETE FROM swath_days WHERE valid_date = ?")
            .bind(&day)
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to delete day"))?
            .rows_affected();

        tx.commit()
            .await
            .map_err(db_err("Failed to commit delete"))?;

        if removed > 0 {
            info!(day = %day, "Removed day record");
        }
        Ok(removed > 0)
    }

    /// All stored days, oldest first.
    pub async fn stored_days(&self) -> SwathResult<Vec<DayKey>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT valid_date FROM swath_days ORDER BY valid_date ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(db_err("Failed to list days"))?;

        rows.into_iter().map(|(d,)| DayKey::parse(&d)).collect()
    }

    /// Store-wide counts.
    pub async fn stats(&self) -> SwathResult<StoreStats> {
        let (days,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM swath_days")
            .fetch_one(&self.pool)
            .await
            .map_err(db_err("Failed to count days"))?;

        let (groups, features): (i64, Option<i64>) =
            sqlx::query_as("SELECT COUNT(*), SUM(feature_count) FROM swath_groups")
                .fetch_one(&self.pool)
                .await
                .map_err(db_err("Failed to count groups"))?;

        Ok(StoreStats {
            days: days as u64,
            groups: groups as u64,
            features: features.unwrap_or(0) as u64,
        })
    }
}
