#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Noise sample records, store query parameters, and aggregate statistics.
//!
//! These types describe data as it crosses the store boundary. They are
//! distinct from the API response types in `noise_map_server_models`, which
//! shape the same data for the HTTP contract.

use chrono::{DateTime, Utc};
use noise_map_noise_models::{GeoPoint, InvalidLevelError, NoiseSource, validate_level};
use serde::{Deserialize, Serialize};

/// A persisted noise sample.
///
/// Samples are append-only: once stored, `owner_id`, `location`, and
/// `timestamp` never change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseSample {
    /// Store-assigned identifier.
    pub id: i64,
    /// The reporting user.
    pub owner_id: String,
    /// Sound level in decibels.
    pub level: f64,
    /// Where the sample was taken.
    pub location: GeoPoint,
    /// What produced the noise.
    pub source: NoiseSource,
    /// When the sample was recorded.
    pub timestamp: DateTime<Utc>,
    /// Free-text description of the reporting device.
    pub device_info: Option<String>,
    /// Opaque client payload, returned verbatim.
    pub metadata: serde_json::Value,
}

/// A sample that has been accepted for insertion but not yet assigned an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNoiseSample {
    /// The reporting user.
    pub owner_id: String,
    /// Sound level in decibels.
    pub level: f64,
    /// Where the sample was taken.
    pub location: GeoPoint,
    /// What produced the noise.
    pub source: NoiseSource,
    /// When the sample was recorded.
    pub timestamp: DateTime<Utc>,
    /// Free-text description of the reporting device.
    pub device_info: Option<String>,
    /// Opaque client payload.
    pub metadata: serde_json::Value,
}

impl NewNoiseSample {
    /// Checks the invariants the type system does not already enforce.
    ///
    /// `location` and `source` are valid by construction; this covers the
    /// decibel range and the owner reference.
    ///
    /// # Errors
    ///
    /// Returns [`SampleValidationError`] describing the first violation.
    pub fn validate(&self) -> Result<(), SampleValidationError> {
        if self.owner_id.trim().is_empty() {
            return Err(SampleValidationError::MissingOwner);
        }
        validate_level(self.level)?;
        Ok(())
    }

    /// Attaches a store-assigned id, producing the persisted form.
    #[must_use]
    pub fn with_id(self, id: i64) -> NoiseSample {
        NoiseSample {
            id,
            owner_id: self.owner_id,
            level: self.level,
            location: self.location,
            source: self.source,
            timestamp: self.timestamp,
            device_info: self.device_info,
            metadata: self.metadata,
        }
    }
}

/// Error returned when a [`NewNoiseSample`] breaks a data-model invariant.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValidationError {
    /// The owner id is empty.
    MissingOwner,
    /// The decibel level is out of range.
    Level(InvalidLevelError),
}

impl std::fmt::Display for SampleValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingOwner => f.write_str("owner id is required"),
            Self::Level(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for SampleValidationError {}

impl From<InvalidLevelError> for SampleValidationError {
    fn from(value: InvalidLevelError) -> Self {
        Self::Level(value)
    }
}

/// Parameters for a spherical radius query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearbyQuery {
    /// Search center.
    pub center: GeoPoint,
    /// Great-circle search radius in meters.
    pub radius_meters: f64,
    /// Maximum number of samples to return.
    pub limit: u32,
}

/// Parameters for an owner history lookup.
///
/// Both bounds are inclusive; `None` leaves that side open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery {
    /// Owner whose samples to return.
    pub owner_id: String,
    /// Earliest timestamp to include.
    pub from: Option<DateTime<Utc>>,
    /// Latest timestamp to include.
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of samples to return.
    pub limit: u32,
}

/// Aggregate levels over every sample inside a radius.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AreaStatistics {
    /// Number of matching samples.
    pub count: u64,
    /// Unweighted arithmetic mean of `level`.
    pub average_level: f64,
    /// Lowest matching level.
    pub min_level: f64,
    /// Highest matching level.
    pub max_level: f64,
}

impl AreaStatistics {
    /// The record returned when nothing matches: every field zero.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            count: 0,
            average_level: 0.0,
            min_level: 0.0,
            max_level: 0.0,
        }
    }

    /// Folds a set of levels into a statistics record.
    ///
    /// Returns [`AreaStatistics::empty`] for an empty iterator.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_levels(levels: impl IntoIterator<Item = f64>) -> Self {
        let mut count = 0u64;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for level in levels {
            count += 1;
            sum += level;
            min = min.min(level);
            max = max.max(level);
        }

        if count == 0 {
            return Self::empty();
        }

        Self {
            count,
            // The mean of in-range values can drift past min/max by an ulp.
            average_level: (sum / count as f64).clamp(min, max),
            min_level: min,
            max_level: max,
        }
    }
}
