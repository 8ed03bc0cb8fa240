#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Noise source taxonomy, decibel bounds, and geographic point types.
//!
//! This crate defines the value types every other noise-map crate agrees
//! on: the fixed set of [`NoiseSource`] categories, the accepted decibel
//! range, and [`GeoPoint`], a WGS84 position that can only be constructed
//! with finite, in-range coordinates.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Lowest accepted sound level, in decibels.
pub const MIN_LEVEL_DB: f64 = 0.0;

/// Highest accepted sound level, in decibels.
pub const MAX_LEVEL_DB: f64 = 150.0;

/// Category of the thing that produced a noise sample.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NoiseSource {
    /// Road, rail, and air traffic
    Traffic,
    /// Building sites and road works
    Construction,
    /// Background noise with no single identifiable source
    Ambient,
    /// Restaurants, bars, and terraces
    Restaurant,
    /// Anything not covered above
    Other,
}

impl NoiseSource {
    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Traffic,
            Self::Construction,
            Self::Ambient,
            Self::Restaurant,
            Self::Other,
        ]
    }
}

/// Error returned when a decibel value falls outside
/// [`MIN_LEVEL_DB`]..=[`MAX_LEVEL_DB`] or is not a finite number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InvalidLevelError {
    /// The rejected level.
    pub value: f64,
}

impl std::fmt::Display for InvalidLevelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid noise level {}: expected {MIN_LEVEL_DB}-{MAX_LEVEL_DB} dB",
            self.value
        )
    }
}

impl std::error::Error for InvalidLevelError {}

/// Checks that `level` is a finite decibel value within the accepted range.
///
/// Both bounds are inclusive.
///
/// # Errors
///
/// Returns [`InvalidLevelError`] if the level is NaN, infinite, or outside
/// [`MIN_LEVEL_DB`]..=[`MAX_LEVEL_DB`].
pub fn validate_level(level: f64) -> Result<f64, InvalidLevelError> {
    if level.is_finite() && (MIN_LEVEL_DB..=MAX_LEVEL_DB).contains(&level) {
        Ok(level)
    } else {
        Err(InvalidLevelError { value: level })
    }
}

/// Why a coordinate pair was rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidPointError {
    /// Longitude is NaN, infinite, or outside `[-180, 180]`.
    Longitude(f64),
    /// Latitude is NaN, infinite, or outside `[-90, 90]`.
    Latitude(f64),
    /// The coordinate list did not contain exactly two numbers.
    Arity(usize),
}

impl std::fmt::Display for InvalidPointError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Longitude(v) => write!(f, "invalid longitude {v}: expected -180 to 180"),
            Self::Latitude(v) => write!(f, "invalid latitude {v}: expected -90 to 90"),
            Self::Arity(n) => {
                write!(f, "expected coordinates [lng, lat], got {n} values")
            }
        }
    }
}

impl std::error::Error for InvalidPointError {}

/// A WGS84 position.
///
/// Serialized as the ordered pair `[longitude, latitude]`, the same order
/// `GeoJSON` uses. Deserialization runs the same range checks as
/// [`GeoPoint::new`], so a `GeoPoint` value is always valid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 2]", into = "[f64; 2]")]
pub struct GeoPoint {
    longitude: f64,
    latitude: f64,
}

impl GeoPoint {
    /// Creates a point from a longitude and latitude in degrees.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPointError`] if either coordinate is not finite or
    /// is out of geographic range.
    pub fn new(longitude: f64, latitude: f64) -> Result<Self, InvalidPointError> {
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(InvalidPointError::Longitude(longitude));
        }
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(InvalidPointError::Latitude(latitude));
        }
        Ok(Self {
            longitude,
            latitude,
        })
    }

    /// Creates a point from a `[lng, lat]` slice.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidPointError::Arity`] unless the slice has exactly two
    /// elements, or the range errors of [`GeoPoint::new`].
    pub fn from_coordinates(coordinates: &[f64]) -> Result<Self, InvalidPointError> {
        match coordinates {
            [lng, lat] => Self::new(*lng, *lat),
            other => Err(InvalidPointError::Arity(other.len())),
        }
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Returns the `[lng, lat]` pair.
    #[must_use]
    pub const fn coordinates(&self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

impl TryFrom<[f64; 2]> for GeoPoint {
    type Error = InvalidPointError;

    fn try_from([lng, lat]: [f64; 2]) -> Result<Self, Self::Error> {
        Self::new(lng, lat)
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(point: GeoPoint) -> Self {
        point.coordinates()
    }
}
