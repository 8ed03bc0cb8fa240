//! Database query functions for noise samples.
//!
//! Radius queries use `ST_DWithin` on the `geography` column with
//! `use_spheroid = false`, so distances are great-circle distances on the
//! mean-radius sphere and the `GIST` index on `location` serves the probe.
//! History queries are served by the `(owner_id, recorded_at DESC)` index.

use std::fmt::Write as _;

use moosicbox_json_utils::database::ToValue as _;
use noise_map_database_models::{
    AreaStatistics, HistoryQuery, NearbyQuery, NewNoiseSample, NoiseSample,
};
use noise_map_noise_models::{GeoPoint, NoiseSource};
use switchy_database::{Database, DatabaseValue, Row};

use crate::DbError;

/// Columns selected by every sample-returning query, in the shape
/// [`row_to_sample`] expects.
const SAMPLE_COLUMNS: &str = "id, owner_id, level, source, recorded_at, device_info,
                              metadata::text AS metadata,
                              ST_X(location::geometry) AS longitude,
                              ST_Y(location::geometry) AS latitude";

/// Inserts a noise sample and returns its generated id.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails (including check-constraint
/// violations) or the id cannot be read back.
pub async fn insert_sample(db: &dyn Database, sample: &NewNoiseSample) -> Result<i64, DbError> {
    let metadata = serde_json::to_string(&sample.metadata).map_err(|e| DbError::Conversion {
        message: format!("Failed to serialize metadata: {e}"),
    })?;

    let rows = db
        .query_raw_params(
            "INSERT INTO noise_samples (
                owner_id, level, location, source, recorded_at, device_info, metadata
            ) VALUES (
                $1, $2,
                ST_SetSRID(ST_MakePoint($3, $4), 4326)::geography,
                $5, $6, $7, $8::jsonb
            )
            RETURNING id",
            &[
                DatabaseValue::String(sample.owner_id.clone()),
                DatabaseValue::Real64(sample.level),
                DatabaseValue::Real64(sample.location.longitude()),
                DatabaseValue::Real64(sample.location.latitude()),
                DatabaseValue::String(sample.source.as_ref().to_string()),
                DatabaseValue::DateTime(sample.timestamp.naive_utc()),
                sample
                    .device_info
                    .as_ref()
                    .map_or(DatabaseValue::Null, |d| DatabaseValue::String(d.clone())),
                DatabaseValue::String(metadata),
            ],
        )
        .await?;

    let row = rows.first().ok_or_else(|| DbError::Conversion {
        message: "Failed to get sample id from insert".to_string(),
    })?;

    row.to_value("id").map_err(|e| decode_error("id", &e))
}

/// Returns samples within a great-circle radius, newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be decoded.
pub async fn query_nearby(
    db: &dyn Database,
    query: &NearbyQuery,
) -> Result<Vec<NoiseSample>, DbError> {
    let sql = format!(
        "SELECT {SAMPLE_COLUMNS}
         FROM noise_samples
         WHERE ST_DWithin(
             location,
             ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
             $3,
             false
         )
         ORDER BY recorded_at DESC, id DESC
         LIMIT $4"
    );

    let rows = db
        .query_raw_params(
            &sql,
            &[
                DatabaseValue::Real64(query.center.longitude()),
                DatabaseValue::Real64(query.center.latitude()),
                DatabaseValue::Real64(query.radius_meters),
                DatabaseValue::Int64(i64::from(query.limit)),
            ],
        )
        .await?;

    rows.iter().map(row_to_sample).collect()
}

/// Returns an owner's samples inside an optional inclusive time range,
/// newest first.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a row cannot be decoded.
pub async fn query_history(
    db: &dyn Database,
    query: &HistoryQuery,
) -> Result<Vec<NoiseSample>, DbError> {
    let mut sql = format!("SELECT {SAMPLE_COLUMNS} FROM noise_samples WHERE owner_id = $1");
    let mut params = vec![DatabaseValue::String(query.owner_id.clone())];
    let mut param_idx = 2u32;

    if let Some(from) = &query.from {
        write!(sql, " AND recorded_at >= ${param_idx}").unwrap();
        params.push(DatabaseValue::DateTime(from.naive_utc()));
        param_idx += 1;
    }

    if let Some(to) = &query.to {
        write!(sql, " AND recorded_at <= ${param_idx}").unwrap();
        params.push(DatabaseValue::DateTime(to.naive_utc()));
        param_idx += 1;
    }

    sql.push_str(" ORDER BY recorded_at DESC, id DESC");

    write!(sql, " LIMIT ${param_idx}").unwrap();
    params.push(DatabaseValue::Int64(i64::from(query.limit)));

    let rows = db.query_raw_params(&sql, &params).await?;

    rows.iter().map(row_to_sample).collect()
}

/// Computes count, mean, min, and max level over every sample within a
/// great-circle radius.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn aggregate_nearby(
    db: &dyn Database,
    center: &GeoPoint,
    radius_meters: f64,
) -> Result<AreaStatistics, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT COUNT(*) AS sample_count,
                    AVG(level) AS average_level,
                    MIN(level) AS min_level,
                    MAX(level) AS max_level
             FROM noise_samples
             WHERE ST_DWithin(
                 location,
                 ST_SetSRID(ST_MakePoint($1, $2), 4326)::geography,
                 $3,
                 false
             )",
            &[
                DatabaseValue::Real64(center.longitude()),
                DatabaseValue::Real64(center.latitude()),
                DatabaseValue::Real64(radius_meters),
            ],
        )
        .await?;

    let Some(row) = rows.first() else {
        return Ok(AreaStatistics::empty());
    };

    let count: i64 = row
        .to_value("sample_count")
        .map_err(|e| decode_error("sample_count", &e))?;
    if count == 0 {
        return Ok(AreaStatistics::empty());
    }

    let levels = (
        row.to_value("average_level")
            .map_err(|e| decode_error("average_level", &e))?,
        row.to_value("min_level")
            .map_err(|e| decode_error("min_level", &e))?,
        row.to_value("max_level")
            .map_err(|e| decode_error("max_level", &e))?,
    );

    statistics_from_aggregate(count, levels)
}

/// Builds [`AreaStatistics`] from `COUNT` and `(AVG, MIN, MAX)`.
fn statistics_from_aggregate(
    count: i64,
    (average_level, min_level, max_level): (f64, f64, f64),
) -> Result<AreaStatistics, DbError> {
    let count = u64::try_from(count).map_err(|e| decode_error("sample_count", &e))?;
    if count == 0 {
        return Ok(AreaStatistics::empty());
    }
    if !average_level.is_finite()
        || !min_level.is_finite()
        || !max_level.is_finite()
        || min_level > max_level
    {
        return Err(DbError::Conversion {
            message: format!(
                "Inconsistent aggregate: avg={average_level} min={min_level} max={max_level}"
            ),
        });
    }

    Ok(AreaStatistics {
        count,
        // AVG can drift past MIN/MAX by an ulp.
        average_level: average_level.clamp(min_level, max_level),
        min_level,
        max_level,
    })
}

fn decode_error(column: &str, e: &impl std::fmt::Display) -> DbError {
    DbError::Conversion {
        message: format!("Failed to decode column '{column}': {e}"),
    }
}

/// Decodes a row selected with [`SAMPLE_COLUMNS`].
fn row_to_sample(row: &Row) -> Result<NoiseSample, DbError> {
    let id: i64 = row.to_value("id").map_err(|e| decode_error("id", &e))?;
    let sample_error = |column: &str, e: &dyn std::fmt::Display| DbError::Conversion {
        message: format!("Failed to decode '{column}' on sample {id}: {e}"),
    };

    let owner_id: String = row
        .to_value("owner_id")
        .map_err(|e| sample_error("owner_id", &e))?;
    let level: f64 = row.to_value("level").map_err(|e| sample_error("level", &e))?;

    let source_name: String = row
        .to_value("source")
        .map_err(|e| sample_error("source", &e))?;
    let source = source_name
        .parse::<NoiseSource>()
        .map_err(|e| sample_error("source", &format!("unknown noise source '{source_name}': {e}")))?;

    let longitude: f64 = row
        .to_value("longitude")
        .map_err(|e| sample_error("longitude", &e))?;
    let latitude: f64 = row
        .to_value("latitude")
        .map_err(|e| sample_error("latitude", &e))?;
    let location =
        GeoPoint::new(longitude, latitude).map_err(|e| sample_error("location", &e))?;

    let recorded_at: chrono::NaiveDateTime = row
        .to_value("recorded_at")
        .map_err(|e| sample_error("recorded_at", &e))?;

    let device_info: Option<String> = row
        .to_value("device_info")
        .map_err(|e| sample_error("device_info", &e))?;

    let metadata_text: Option<String> = row
        .to_value("metadata")
        .map_err(|e| sample_error("metadata", &e))?;
    let metadata = match metadata_text {
        Some(text) => serde_json::from_str(&text).map_err(|e| sample_error("metadata", &e))?,
        None => serde_json::json!({}),
    };

    Ok(NoiseSample {
        id,
        owner_id,
        level,
        location,
        source,
        timestamp: chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(
            recorded_at,
            chrono::Utc,
        ),
        device_info,
        metadata,
    })
}
