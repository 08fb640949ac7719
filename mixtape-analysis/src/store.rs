//! Library store for analyzed track records
//!
//! SQLite-backed, keyed by filepath. Array-valued fields (beat grid,
//! structure, hot cues) are stored as JSON text columns. Updates are
//! atomic per record; concurrent upserts for the same filepath serialize
//! through a per-key lock. The startup schema check creates the table and
//! adds any missing columns, so records written by older builds read back
//! with NULL defaults.

use crate::error::{AnalysisError, Result};
use mixtape_common::track::{EnergyProfile, KeyScale, Track};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Columns of the tracks table; the second element is the type used when a
/// missing column is added by migration.
const TRACK_COLUMNS: &[(&str, &str)] = &[
    ("filepath", "TEXT PRIMARY KEY"),
    ("file_hash", "TEXT"),
    ("last_modified", "INTEGER"),
    ("title", "TEXT"),
    ("artist", "TEXT"),
    ("album", "TEXT"),
    ("genre", "TEXT"),
    ("year", "INTEGER"),
    ("duration", "REAL"),
    ("bpm", "REAL"),
    ("beat_times", "TEXT"),
    ("key", "TEXT"),
    ("scale", "TEXT"),
    ("camelot_key", "TEXT"),
    ("key_confidence", "REAL"),
    ("energy_level", "REAL"),
    ("energy_profile", "TEXT"),
    ("structure", "TEXT"),
    ("hot_cues", "TEXT"),
    ("analysis_version", "INTEGER"),
    ("analyzed_at", "TEXT"),
];

/// Fields accepted in query criteria
const QUERYABLE_FIELDS: &[&str] = &[
    "bpm",
    "energy_level",
    "duration",
    "year",
    "genre",
    "key",
    "camelot_key",
    "energy_profile",
];

/// Simple query criteria with a MongoDB-style operator sublanguage.
///
/// Supports `$gte`, `$lte`, and `$eq` on a fixed set of fields:
///
/// ```ignore
/// let criteria = Criteria::new().gte("bpm", 108.0).lte("bpm", 132.0).eq("genre", "house");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Criteria {
    clauses: Vec<(String, &'static str, Value)>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gte(mut self, field: &str, value: f64) -> Self {
        self.clauses.push((field.to_string(), ">=", value.into()));
        self
    }

    pub fn lte(mut self, field: &str, value: f64) -> Self {
        self.clauses.push((field.to_string(), "<=", value.into()));
        self
    }

    pub fn eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.clauses.push((field.to_string(), "=", value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Parse an operator document like
    /// `{"bpm": {"$gte": 100, "$lte": 140}, "genre": {"$eq": "house"}}`.
    pub fn from_document(doc: &serde_json::Map<String, Value>) -> Result<Self> {
        let mut criteria = Criteria::new();
        for (field, ops) in doc {
            let Value::Object(ops) = ops else {
                return Err(AnalysisError::InvalidCriteria(format!(
                    "field {field} must map to an operator object"
                )));
            };
            for (op, value) in ops {
                let sql_op = match op.as_str() {
                    "$gte" => ">=",
                    "$lte" => "<=",
                    "$eq" => "=",
                    other => {
                        return Err(AnalysisError::InvalidCriteria(format!(
                            "unsupported operator {other}"
                        )))
                    }
                };
                criteria
                    .clauses
                    .push((field.clone(), sql_op, value.clone()));
            }
        }
        Ok(criteria)
    }

    /// Render to a WHERE clause and bind values.
    fn to_sql(&self) -> Result<(String, Vec<Value>)> {
        let mut parts = Vec::with_capacity(self.clauses.len());
        let mut binds = Vec::with_capacity(self.clauses.len());
        for (field, op, value) in &self.clauses {
            if !QUERYABLE_FIELDS.contains(&field.as_str()) {
                return Err(AnalysisError::InvalidCriteria(format!(
                    "field {field} is not queryable"
                )));
            }
            if !matches!(value, Value::Number(_) | Value::String(_)) {
                return Err(AnalysisError::InvalidCriteria(format!(
                    "unsupported value for {field}"
                )));
            }
            parts.push(format!("{field} {op} ?"));
            binds.push(value.clone());
        }
        Ok((parts.join(" AND "), binds))
    }
}

/// SQLite-backed track record store.
pub struct LibraryStore {
    pool: SqlitePool,
    write_locks: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LibraryStore {
    /// Open (creating if missing) a store at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let store = Self::from_pool(pool);
        store.init_schema().await?;
        info!(path = %path.display(), "Library store ready");
        Ok(store)
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> Result<Self> {
        // One connection only: each in-memory connection is its own database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        let store = Self::from_pool(pool);
        store.init_schema().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Create the tracks table and add any missing columns.
    pub async fn init_schema(&self) -> Result<()> {
        let columns: Vec<String> = TRACK_COLUMNS
            .iter()
            .map(|(name, ty)| format!("{name} {ty}"))
            .collect();
        let create = format!(
            "CREATE TABLE IF NOT EXISTS tracks ({})",
            columns.join(", ")
        );
        sqlx::query(&create).execute(&self.pool).await?;

        // Additive migration: older databases gain new columns with NULLs
        let existing: Vec<String> = sqlx::query("PRAGMA table_info(tracks)")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|row| row.get::<String, _>("name"))
            .collect();

        for (name, ty) in TRACK_COLUMNS {
            if !existing.iter().any(|c| c == name) {
                // Strip constraints; added columns default to NULL
                let base_type = ty.split_whitespace().next().unwrap_or("TEXT");
                debug!(column = name, "Adding missing column to tracks table");
                sqlx::query(&format!("ALTER TABLE tracks ADD COLUMN {name} {base_type}"))
                    .execute(&self.pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Fetch one record by filepath.
    pub async fn get(&self, filepath: &str) -> Result<Option<Track>> {
        let row = sqlx::query("SELECT * FROM tracks WHERE filepath = ?")
            .bind(filepath)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| row_to_track(&r)).transpose()
    }

    /// Insert or update one record atomically.
    pub async fn upsert(&self, track: &Track) -> Result<()> {
        // Serialize writers per filepath
        let key_lock = {
            let mut locks = self.write_locks.lock().await;
            locks
                .entry(track.filepath.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        let _guard = key_lock.lock().await;

        sqlx::query(
            r#"
            INSERT INTO tracks (
                filepath, file_hash, last_modified, title, artist, album,
                genre, year, duration, bpm, beat_times, key, scale,
                camelot_key, key_confidence, energy_level, energy_profile,
                structure, hot_cues, analysis_version, analyzed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(filepath) DO UPDATE SET
                file_hash = excluded.file_hash,
                last_modified = excluded.last_modified,
                title = excluded.title,
                artist = excluded.artist,
                album = excluded.album,
                genre = excluded.genre,
                year = excluded.year,
                duration = excluded.duration,
                bpm = excluded.bpm,
                beat_times = excluded.beat_times,
                key = excluded.key,
                scale = excluded.scale,
                camelot_key = excluded.camelot_key,
                key_confidence = excluded.key_confidence,
                energy_level = excluded.energy_level,
                energy_profile = excluded.energy_profile,
                structure = excluded.structure,
                hot_cues = excluded.hot_cues,
                analysis_version = excluded.analysis_version,
                analyzed_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&track.filepath)
        .bind(&track.file_hash)
        .bind(track.last_modified)
        .bind(&track.title)
        .bind(&track.artist)
        .bind(&track.album)
        .bind(&track.genre)
        .bind(track.year)
        .bind(track.duration)
        .bind(track.bpm)
        .bind(serde_json::to_string(&track.beat_times).unwrap_or_else(|_| "[]".into()))
        .bind(&track.key)
        .bind(scale_to_str(track.scale))
        .bind(track.camelot_key.map(|k| k.to_string()))
        .bind(track.key_confidence)
        .bind(track.energy_level)
        .bind(profile_to_str(track.energy_profile))
        .bind(serde_json::to_string(&track.structure).unwrap_or_else(|_| "[]".into()))
        .bind(serde_json::to_string(&track.hot_cues).unwrap_or_else(|_| "[]".into()))
        .bind(track.analysis_version)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Find records matching the criteria; empty criteria returns all.
    pub async fn find_by(&self, criteria: &Criteria) -> Result<Vec<Track>> {
        let (clause, binds) = criteria.to_sql()?;
        let sql = if clause.is_empty() {
            "SELECT * FROM tracks".to_string()
        } else {
            format!("SELECT * FROM tracks WHERE {clause}")
        };

        let mut query = sqlx::query(&sql);
        for bind in binds {
            query = match bind {
                Value::Number(n) => query.bind(n.as_f64()),
                Value::String(s) => query.bind(s),
                _ => unreachable!("validated in to_sql"),
            };
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_track).collect()
    }

    /// All stored filepaths.
    pub async fn all_filepaths(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT filepath FROM tracks")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("filepath")).collect())
    }
}

fn scale_to_str(scale: KeyScale) -> &'static str {
    match scale {
        KeyScale::Major => "major",
        KeyScale::Minor => "minor",
        KeyScale::Unknown => "unknown",
    }
}

fn profile_to_str(profile: EnergyProfile) -> &'static str {
    match profile {
        EnergyProfile::Low => "low",
        EnergyProfile::Medium => "medium",
        EnergyProfile::High => "high",
        EnergyProfile::Dynamic => "dynamic",
    }
}

fn row_to_track(row: &SqliteRow) -> Result<Track> {
    let json_field = |name: &str| -> String {
        row.try_get::<Option<String>, _>(name)
            .ok()
            .flatten()
            .unwrap_or_else(|| "[]".to_string())
    };

    let scale = match row
        .try_get::<Option<String>, _>("scale")
        .ok()
        .flatten()
        .as_deref()
    {
        Some("major") => KeyScale::Major,
        Some("minor") => KeyScale::Minor,
        _ => KeyScale::Unknown,
    };

    let energy_profile = match row
        .try_get::<Option<String>, _>("energy_profile")
        .ok()
        .flatten()
        .as_deref()
    {
        Some("low") => EnergyProfile::Low,
        Some("high") => EnergyProfile::High,
        Some("dynamic") => EnergyProfile::Dynamic,
        _ => EnergyProfile::Medium,
    };

    Ok(Track {
        filepath: row.try_get("filepath")?,
        file_hash: row
            .try_get::<Option<String>, _>("file_hash")?
            .unwrap_or_default(),
        last_modified: row
            .try_get::<Option<i64>, _>("last_modified")?
            .unwrap_or(0),
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        album: row.try_get("album")?,
        genre: row.try_get("genre")?,
        year: row.try_get("year")?,
        duration: row.try_get::<Option<f64>, _>("duration")?.unwrap_or(0.0),
        bpm: row.try_get::<Option<f64>, _>("bpm")?.unwrap_or(0.0),
        beat_times: serde_json::from_str(&json_field("beat_times"))
            .map_err(|e| AnalysisError::InvalidRecord(format!("beat_times: {e}")))?,
        key: row
            .try_get::<Option<String>, _>("key")?
            .unwrap_or_else(|| "Unknown".to_string()),
        scale,
        camelot_key: row
            .try_get::<Option<String>, _>("camelot_key")?
            .and_then(|s| s.parse().ok()),
        key_confidence: row
            .try_get::<Option<f64>, _>("key_confidence")?
            .unwrap_or(0.0),
        energy_level: row
            .try_get::<Option<f64>, _>("energy_level")?
            .unwrap_or(0.0),
        energy_profile,
        structure: serde_json::from_str(&json_field("structure"))
            .map_err(|e| AnalysisError::InvalidRecord(format!("structure: {e}")))?,
        hot_cues: serde_json::from_str(&json_field("hot_cues"))
            .map_err(|e| AnalysisError::InvalidRecord(format!("hot_cues: {e}")))?,
        analysis_version: row
            .try_get::<Option<i64>, _>("analysis_version")?
            .unwrap_or(0),
    })
}
