//! [`NoiseSampleStore`] adapter over a `PostGIS` connection.

use std::sync::Arc;

use async_trait::async_trait;
use noise_map_database_models::{
    AreaStatistics, HistoryQuery, NearbyQuery, NewNoiseSample, NoiseSample,
};
use noise_map_noise_models::GeoPoint;
use noise_map_store::{NoiseSampleStore, StoreError};
use switchy_database::Database;

use crate::{DbError, queries};

/// Postgres error text fragments that mean the row itself was rejected.
const CONSTRAINT_VIOLATIONS: &[&str] = &[
    "violates check constraint",
    "violates not-null constraint",
    "invalid input syntax",
];

/// `PostGIS`-backed sample store.
///
/// Relies on the schema from the embedded migrations: a `GIST` index on
/// `noise_samples.location` and a B-tree index on
/// `(owner_id, recorded_at DESC)`.
pub struct PostgisStore {
    db: Arc<dyn Database>,
}

impl PostgisStore {
    /// Wraps an open database connection.
    #[must_use]
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }
}

/// Whether a Postgres error message reports a rejected row.
fn is_constraint_violation(message: &str) -> bool {
    CONSTRAINT_VIOLATIONS
        .iter()
        .any(|fragment| message.contains(fragment))
}

/// Maps a database failure onto the store error taxonomy.
fn to_store_error(e: DbError) -> StoreError {
    let message = e.to_string();
    match e {
        DbError::Database(_) if is_constraint_violation(&message) => StoreError::invalid(message),
        _ => {
            log::error!("PostGIS store failure: {message}");
            StoreError::unavailable(message)
        }
    }
}

#[async_trait]
impl NoiseSampleStore for PostgisStore {
    async fn insert(&self, sample: NewNoiseSample) -> Result<i64, StoreError> {
        sample
            .validate()
            .map_err(|e| StoreError::invalid(e.to_string()))?;
        queries::insert_sample(self.db.as_ref(), &sample)
            .await
            .map_err(to_store_error)
    }

    async fn query_near(&self, query: &NearbyQuery) -> Result<Vec<NoiseSample>, StoreError> {
        queries::query_nearby(self.db.as_ref(), query)
            .await
            .map_err(to_store_error)
    }

    async fn query_range(&self, query: &HistoryQuery) -> Result<Vec<NoiseSample>, StoreError> {
        queries::query_history(self.db.as_ref(), query)
            .await
            .map_err(to_store_error)
    }

    async fn aggregate_near(
        &self,
        center: &GeoPoint,
        radius_meters: f64,
    ) -> Result<AreaStatistics, StoreError> {
        queries::aggregate_nearby(self.db.as_ref(), center, radius_meters)
            .await
            .map_err(to_store_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_errors_are_unavailable() {
        let err = to_store_error(DbError::Conversion {
            message: "Unknown noise source 'party'".to_string(),
        });
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn rejected_rows_are_recognized() {
        assert!(is_constraint_violation(
            "Database error: new row for relation \"noise_samples\" violates check constraint \"noise_samples_level_check\""
        ));
        assert!(is_constraint_violation(
            "Database error: null value in column \"owner_id\" of relation \"noise_samples\" violates not-null constraint"
        ));
        assert!(is_constraint_violation(
            "Database error: invalid input syntax for type json"
        ));
        assert!(!is_constraint_violation(
            "Database error: connection refused"
        ));
        assert!(!is_constraint_violation(
            "Database error: canceling statement due to statement timeout"
        ));
    }
}
