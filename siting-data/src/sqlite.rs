//! SQLite persistence for sites, score records and analysis parameters.
//!
//! The database holds three tables (`sites`, `analysis_results` and
//! `analysis_parameters`) plus the `sites_with_scores` view that joins each
//! site with its latest score. Numeric columns are read tolerantly: a value
//! of the wrong storage class surfaces as [`StoreError::MalformedField`]
//! instead of failing the whole connection.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Error as SqliteError, Row, Transaction, params};
use serde::Serialize;
use siting_core::{
    Clock, ScoreRecord, ScoreStore, Site, SiteId, SiteScoreRow, SiteScoreSource, SiteStore,
    StoreError, SubScores, SystemClock, WeightParameterStore, WeightVector,
};
use thiserror::Error;

use crate::fs::ensure_parent_dir;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sites (
    site_id INTEGER PRIMARY KEY,
    site_name TEXT NOT NULL,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    area_sqm INTEGER NOT NULL,
    solar_irradiance_kwh REAL NOT NULL,
    grid_distance_km REAL NOT NULL,
    slope_degrees REAL NOT NULL,
    road_distance_km REAL NOT NULL,
    elevation_m INTEGER NOT NULL,
    land_type TEXT NOT NULL,
    region TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS sites_region_idx ON sites (region);
CREATE INDEX IF NOT EXISTS sites_land_type_idx ON sites (land_type);

CREATE TABLE IF NOT EXISTS analysis_parameters (
    parameter_name TEXT PRIMARY KEY,
    weight_value REAL NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS analysis_results (
    site_id INTEGER PRIMARY KEY REFERENCES sites (site_id) ON DELETE CASCADE,
    solar_irradiance_score REAL NOT NULL,
    area_score REAL NOT NULL,
    grid_distance_score REAL NOT NULL,
    slope_score REAL NOT NULL,
    infrastructure_score REAL NOT NULL,
    total_suitability_score REAL NOT NULL,
    parameters_snapshot TEXT NOT NULL,
    analysis_timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS analysis_results_total_idx
    ON analysis_results (total_suitability_score);
CREATE INDEX IF NOT EXISTS analysis_results_timestamp_idx
    ON analysis_results (analysis_timestamp);

CREATE VIEW IF NOT EXISTS sites_with_scores AS
SELECT s.site_id, s.site_name, s.latitude, s.longitude, s.area_sqm,
       s.solar_irradiance_kwh, s.grid_distance_km, s.slope_degrees,
       s.road_distance_km, s.elevation_m, s.land_type, s.region,
       s.created_at, s.updated_at,
       r.solar_irradiance_score, r.area_score, r.grid_distance_score,
       r.slope_score, r.infrastructure_score, r.total_suitability_score,
       r.parameters_snapshot, r.analysis_timestamp
FROM sites AS s
JOIN analysis_results AS r ON r.site_id = s.site_id;
";

const SITE_COLUMNS: &str = "site_id, site_name, latitude, longitude, area_sqm, \
    solar_irradiance_kwh, grid_distance_km, slope_degrees, road_distance_km, elevation_m, \
    land_type, region, created_at, updated_at";

const SCORE_COLUMNS: &str = "solar_irradiance_score, area_score, grid_distance_score, \
    slope_score, infrastructure_score, total_suitability_score, parameters_snapshot, \
    analysis_timestamp";

/// Errors raised while opening or initialising the database.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Failed to create the parent directory for the database file.
    #[error("failed to create parent directory for {path:?}")]
    CreateDirectory {
        /// Database path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Opening the SQLite database failed.
    #[error("failed to open SQLite database at {path:?}")]
    Open {
        /// Database path.
        path: Utf8PathBuf,
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Enabling SQLite foreign keys failed.
    #[error("failed to enable SQLite foreign keys")]
    ForeignKeys {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
    /// Creating tables, indexes or the view failed.
    #[error("failed to create the siting schema")]
    CreateSchema {
        /// Source error returned by `rusqlite`.
        #[source]
        source: SqliteError,
    },
}

/// A site with its timestamps and latest score record, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteDetail {
    /// The site.
    #[serde(flatten)]
    pub site: Site,
    /// When the site was first stored.
    pub created_at: DateTime<Utc>,
    /// When the site was last upserted.
    pub updated_at: DateTime<Utc>,
    /// Latest score record.
    pub latest_analysis: Option<ScoreRecord>,
}

/// SQLite-backed implementation of every engine store trait.
pub struct SqliteSiteStore {
    connection: Connection,
    clock: Arc<dyn Clock>,
}

impl SqliteSiteStore {
    /// Open or create the database at `path`.
    ///
    /// Parent directories are created automatically and the schema is
    /// initialised if missing.
    ///
    /// # Errors
    /// Returns [`PersistError`] when the file cannot be opened or the schema
    /// cannot be created.
    pub fn open(path: &Utf8Path) -> Result<Self, PersistError> {
        ensure_parent_dir(path).map_err(|source| PersistError::CreateDirectory {
            path: path.to_path_buf(),
            source,
        })?;
        let connection =
            Connection::open(path.as_std_path()).map_err(|source| PersistError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Self::initialise(connection)
    }

    /// Open a private in-memory database.
    ///
    /// # Errors
    /// Returns [`PersistError`] when the schema cannot be created.
    pub fn open_in_memory() -> Result<Self, PersistError> {
        let connection = Connection::open_in_memory().map_err(|source| PersistError::Open {
            path: Utf8PathBuf::from(":memory:"),
            source,
        })?;
        Self::initialise(connection)
    }

    fn initialise(connection: Connection) -> Result<Self, PersistError> {
        connection
            .pragma_update(None, "foreign_keys", true)
            .map_err(|source| PersistError::ForeignKeys { source })?;
        connection
            .execute_batch(SCHEMA)
            .map_err(|source| PersistError::CreateSchema { source })?;
        Ok(Self {
            connection,
            clock: Arc::new(SystemClock),
        })
    }

    /// Stamp site timestamps with `clock` instead of the system time.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the store's clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn shared_clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub(crate) fn transaction(&mut self) -> Result<Transaction<'_>, SqliteError> {
        self.connection.transaction()
    }

    /// Weights persisted as analysis parameters; gaps take their defaults.
    ///
    /// # Errors
    /// Returns [`StoreError`] when the parameters cannot be read.
    pub fn active_weights(&self) -> Result<WeightVector, StoreError> {
        let stored = self.read_parameters()?;
        Ok(WeightVector::from_parameters(
            stored.iter().map(|(name, value)| (name.as_str(), *value)),
        ))
    }

    /// A site with its timestamps and latest score.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for unknown keys, otherwise any read failure.
    pub fn site_detail(&self, site_id: SiteId) -> Result<SiteDetail, StoreError> {
        let (site, created_at, updated_at) = self.stored_site(site_id)?;
        let latest_analysis = self.score(site_id)?;
        Ok(SiteDetail {
            site,
            created_at,
            updated_at,
            latest_analysis,
        })
    }

    fn stored_site(
        &self,
        site_id: SiteId,
    ) -> Result<(Site, DateTime<Utc>, DateTime<Utc>), StoreError> {
        let mut statement = self
            .connection
            .prepare(&format!("SELECT {SITE_COLUMNS} FROM sites WHERE site_id = ?1"))
            .map_err(backend("prepare site lookup"))?;
        let mut rows = statement
            .query(params![site_id])
            .map_err(backend("query site"))?;
        rows.next()
            .map_err(backend("read site"))?
            .ok_or(StoreError::NotFound { site_id })
            .and_then(stored_site_from_row)
    }
}

fn backend(operation: &'static str) -> impl FnOnce(SqliteError) -> StoreError {
    move |source| StoreError::backend(operation, source)
}

/// Insert or update one site row, keeping its original `created_at`.
pub(crate) fn upsert_site_row(
    connection: &Connection,
    site: &Site,
    now: DateTime<Utc>,
) -> Result<(), SqliteError> {
    let stamp = now.to_rfc3339();
    connection.execute(
        &format!(
            "INSERT INTO sites ({SITE_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13)
             ON CONFLICT (site_id) DO UPDATE SET
                site_name = excluded.site_name,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                area_sqm = excluded.area_sqm,
                solar_irradiance_kwh = excluded.solar_irradiance_kwh,
                grid_distance_km = excluded.grid_distance_km,
                slope_degrees = excluded.slope_degrees,
                road_distance_km = excluded.road_distance_km,
                elevation_m = excluded.elevation_m,
                land_type = excluded.land_type,
                region = excluded.region,
                updated_at = excluded.updated_at"
        ),
        params![
            site.site_id,
            site.site_name,
            site.latitude,
            site.longitude,
            site.area_sqm,
            site.solar_irradiance_kwh,
            site.grid_distance_km,
            site.slope_degrees,
            site.road_distance_km,
            site.elevation_m,
            site.land_type,
            site.region,
            stamp,
        ],
    )?;
    Ok(())
}

/// Insert or replace the score record of one site in a single statement.
pub(crate) fn upsert_score_row(
    connection: &Connection,
    record: &ScoreRecord,
) -> Result<(), StoreError> {
    let snapshot = serde_json::to_string(&record.weights_snapshot)
        .map_err(|source| StoreError::backend("serialise weights snapshot", source))?;
    let subs = &record.sub_scores;
    connection
        .execute(
            &format!(
                "INSERT INTO analysis_results (site_id, {SCORE_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT (site_id) DO UPDATE SET
                    solar_irradiance_score = excluded.solar_irradiance_score,
                    area_score = excluded.area_score,
                    grid_distance_score = excluded.grid_distance_score,
                    slope_score = excluded.slope_score,
                    infrastructure_score = excluded.infrastructure_score,
                    total_suitability_score = excluded.total_suitability_score,
                    parameters_snapshot = excluded.parameters_snapshot,
                    analysis_timestamp = excluded.analysis_timestamp"
            ),
            params![
                record.site_id,
                subs.solar_irradiance_score,
                subs.area_score,
                subs.grid_distance_score,
                subs.slope_score,
                subs.infrastructure_score,
                record.total_score,
                snapshot,
                record.computed_at.to_rfc3339(),
            ],
        )
        .map_err(backend("upsert score"))?;
    Ok(())
}

fn describe(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "missing".to_owned(),
        ValueRef::Integer(v) => format!("integer {v}"),
        ValueRef::Real(v) => format!("real {v}"),
        ValueRef::Text(bytes) => format!("text {:?}", String::from_utf8_lossy(bytes)),
        ValueRef::Blob(_) => "blob".to_owned(),
    }
}

fn malformed(site_id: SiteId, field: &str, reason: String) -> StoreError {
    StoreError::MalformedField {
        site_id,
        field: field.to_owned(),
        reason,
    }
}

fn value_ref<'row>(row: &'row Row<'_>, column: &str) -> Result<ValueRef<'row>, StoreError> {
    row.get_ref(column).map_err(backend("read column"))
}

#[expect(
    clippy::cast_precision_loss,
    reason = "integer-stored reals are small measurements"
)]
fn read_f64(row: &Row<'_>, site_id: SiteId, column: &str) -> Result<f64, StoreError> {
    match value_ref(row, column)? {
        ValueRef::Real(v) => Ok(v),
        ValueRef::Integer(v) => Ok(v as f64),
        other => Err(malformed(site_id, column, describe(other))),
    }
}

fn read_i64(row: &Row<'_>, site_id: SiteId, column: &str) -> Result<i64, StoreError> {
    match value_ref(row, column)? {
        ValueRef::Integer(v) => Ok(v),
        other => Err(malformed(site_id, column, describe(other))),
    }
}

fn read_text(row: &Row<'_>, site_id: SiteId, column: &str) -> Result<String, StoreError> {
    match value_ref(row, column)? {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|err| malformed(site_id, column, err.to_string())),
        other => Err(malformed(site_id, column, describe(other))),
    }
}

fn read_timestamp(
    row: &Row<'_>,
    site_id: SiteId,
    column: &str,
) -> Result<DateTime<Utc>, StoreError> {
    let text = read_text(row, site_id, column)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|stamp| stamp.with_timezone(&Utc))
        .map_err(|err| malformed(site_id, column, format!("{text:?}: {err}")))
}

fn stored_site_from_row(
    row: &Row<'_>,
) -> Result<(Site, DateTime<Utc>, DateTime<Utc>), StoreError> {
    let site_id: SiteId = row.get("site_id").map_err(backend("read site id"))?;
    let site = Site {
        site_id,
        site_name: read_text(row, site_id, "site_name")?,
        latitude: read_f64(row, site_id, "latitude")?,
        longitude: read_f64(row, site_id, "longitude")?,
        area_sqm: read_i64(row, site_id, "area_sqm")?,
        solar_irradiance_kwh: read_f64(row, site_id, "solar_irradiance_kwh")?,
        grid_distance_km: read_f64(row, site_id, "grid_distance_km")?,
        slope_degrees: read_f64(row, site_id, "slope_degrees")?,
        road_distance_km: read_f64(row, site_id, "road_distance_km")?,
        elevation_m: read_i64(row, site_id, "elevation_m")?,
        land_type: read_text(row, site_id, "land_type")?,
        region: read_text(row, site_id, "region")?,
    };
    let created_at = read_timestamp(row, site_id, "created_at")?;
    let updated_at = read_timestamp(row, site_id, "updated_at")?;
    Ok((site, created_at, updated_at))
}

fn score_from_row(row: &Row<'_>, site_id: SiteId) -> Result<ScoreRecord, StoreError> {
    let snapshot_text = read_text(row, site_id, "parameters_snapshot")?;
    let weights_snapshot: WeightVector = serde_json::from_str(&snapshot_text)
        .map_err(|err| malformed(site_id, "parameters_snapshot", err.to_string()))?;
    Ok(ScoreRecord {
        site_id,
        sub_scores: SubScores {
            solar_irradiance_score: read_f64(row, site_id, "solar_irradiance_score")?,
            area_score: read_f64(row, site_id, "area_score")?,
            grid_distance_score: read_f64(row, site_id, "grid_distance_score")?,
            slope_score: read_f64(row, site_id, "slope_score")?,
            infrastructure_score: read_f64(row, site_id, "infrastructure_score")?,
        },
        total_score: read_f64(row, site_id, "total_suitability_score")?,
        weights_snapshot,
        computed_at: read_timestamp(row, site_id, "analysis_timestamp")?,
    })
}

impl SiteStore for SqliteSiteStore {
    fn upsert_site(&mut self, site: &Site) -> Result<(), StoreError> {
        upsert_site_row(&self.connection, site, self.clock.now()).map_err(backend("upsert site"))
    }

    fn site(&self, site_id: SiteId) -> Result<Site, StoreError> {
        self.stored_site(site_id).map(|(site, _, _)| site)
    }

    fn site_ids(&self) -> Result<Vec<SiteId>, StoreError> {
        let mut statement = self
            .connection
            .prepare("SELECT site_id FROM sites ORDER BY site_id")
            .map_err(backend("prepare site listing"))?;
        let ids = statement
            .query_map([], |row| row.get(0))
            .map_err(backend("list sites"))?
            .collect::<Result<Vec<SiteId>, _>>()
            .map_err(backend("read site id"))?;
        Ok(ids)
    }
}

impl ScoreStore for SqliteSiteStore {
    fn upsert_score(&mut self, record: &ScoreRecord) -> Result<(), StoreError> {
        upsert_score_row(&self.connection, record)
    }

    fn score(&self, site_id: SiteId) -> Result<Option<ScoreRecord>, StoreError> {
        let mut statement = self
            .connection
            .prepare(&format!(
                "SELECT {SCORE_COLUMNS} FROM analysis_results WHERE site_id = ?1"
            ))
            .map_err(backend("prepare score lookup"))?;
        let mut rows = statement
            .query(params![site_id])
            .map_err(backend("query score"))?;
        rows.next()
            .map_err(backend("read score"))?
            .map(|row| score_from_row(row, site_id))
            .transpose()
    }
}

impl WeightParameterStore for SqliteSiteStore {
    fn write_parameters(&mut self, parameters: &[(&'static str, f64)]) -> Result<(), StoreError> {
        let stamp = self.clock.now().to_rfc3339();
        let transaction = self
            .connection
            .transaction()
            .map_err(backend("begin parameter transaction"))?;
        for (name, value) in parameters {
            transaction
                .execute(
                    "INSERT INTO analysis_parameters
                        (parameter_name, weight_value, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)
                     ON CONFLICT (parameter_name) DO UPDATE SET
                        weight_value = excluded.weight_value,
                        updated_at = excluded.updated_at",
                    params![name, value, stamp],
                )
                .map_err(backend("write parameter"))?;
        }
        transaction
            .commit()
            .map_err(backend("commit parameter transaction"))
    }

    fn read_parameters(&self) -> Result<Vec<(String, f64)>, StoreError> {
        let mut statement = self
            .connection
            .prepare(
                "SELECT parameter_name, weight_value FROM analysis_parameters
                 ORDER BY parameter_name",
            )
            .map_err(backend("prepare parameter listing"))?;
        let parameters = statement
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(backend("list parameters"))?
            .collect::<Result<Vec<(String, f64)>, _>>()
            .map_err(backend("read parameter"))?;
        Ok(parameters)
    }
}

fn joined_from_row(row: &Row<'_>) -> Result<SiteScoreRow, StoreError> {
    let (site, created_at, updated_at) = stored_site_from_row(row)?;
    let score = score_from_row(row, site.site_id)?;
    Ok(SiteScoreRow {
        site,
        created_at,
        updated_at,
        score,
    })
}

/// Rows with a malformed field are logged and left out of the result.
impl SiteScoreSource for SqliteSiteStore {
    fn site_score_rows(&self) -> Result<Vec<SiteScoreRow>, StoreError> {
        let mut statement = self
            .connection
            .prepare(&format!(
                "SELECT {SITE_COLUMNS}, {SCORE_COLUMNS} FROM sites_with_scores ORDER BY site_id"
            ))
            .map_err(backend("prepare joined listing"))?;
        let mut rows = statement.query([]).map_err(backend("query joined view"))?;
        let mut joined = Vec::new();
        while let Some(row) = rows.next().map_err(backend("read joined row"))? {
            match joined_from_row(row) {
                Ok(entry) => joined.push(entry),
                Err(StoreError::MalformedField {
                    site_id,
                    field,
                    reason,
                }) => {
                    log::warn!("skipping site {site_id}: malformed {field} ({reason})");
                }
                Err(other) => return Err(other),
            }
        }
        Ok(joined)
    }
}
