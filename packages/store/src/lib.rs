#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Noise sample store boundary.
//!
//! [`NoiseSampleStore`] is the only dependency of the query service: four
//! operations covering insert, spherical radius search, owner history, and
//! radius aggregation. Adapters translate them to a concrete store:
//!
//! - [`memory::MemoryStore`] keeps samples in process behind an R-tree over
//!   unit-sphere coordinates.
//! - `noise_map_database::PostgisStore` issues `PostGIS` SQL.
//!
//! Adapters must hold the indexing contract: a spherical index over sample
//! locations and an `(owner, timestamp desc)` index for history lookups.

pub mod memory;
pub mod sphere;

use async_trait::async_trait;
use noise_map_database_models::{
    AreaStatistics, HistoryQuery, NearbyQuery, NewNoiseSample, NoiseSample,
};
use noise_map_noise_models::GeoPoint;
use thiserror::Error;

/// Errors surfaced by a store adapter.
///
/// Adapters translate every backend-specific failure into one of these two
/// kinds.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store rejected the input (constraint violation, bad value).
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of what was rejected.
        message: String,
    },

    /// The store could not be reached or failed to answer.
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Shorthand for [`StoreError::InvalidArgument`].
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand for [`StoreError::Unavailable`].
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

/// Persistence boundary for noise samples.
#[async_trait]
pub trait NoiseSampleStore: Send + Sync {
    /// Persists a sample and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidArgument`] if the sample violates a
    /// schema constraint, or [`StoreError::Unavailable`] on backend failure.
    async fn insert(&self, sample: NewNoiseSample) -> Result<i64, StoreError>;

    /// Returns up to `query.limit` samples within `query.radius_meters`
    /// great-circle distance of `query.center`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn query_near(&self, query: &NearbyQuery) -> Result<Vec<NoiseSample>, StoreError>;

    /// Returns up to `query.limit` samples owned by `query.owner_id` with a
    /// timestamp inside the inclusive range, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn query_range(&self, query: &HistoryQuery) -> Result<Vec<NoiseSample>, StoreError>;

    /// Aggregates every sample within `radius_meters` of `center`.
    ///
    /// No result cap applies. An empty match yields
    /// [`AreaStatistics::empty`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] on backend failure.
    async fn aggregate_near(
        &self,
        center: &GeoPoint,
        radius_meters: f64,
    ) -> Result<AreaStatistics, StoreError>;
}
