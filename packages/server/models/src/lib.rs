#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the noise map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the store record types to allow independent evolution of the API
//! contract.

use chrono::{DateTime, Utc};
use noise_map_database_models::{AreaStatistics, NoiseSample};
use noise_map_noise_models::NoiseSource;
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the server is healthy.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Error body returned for every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable description.
    pub message: String,
}

impl ApiError {
    /// Creates an error body.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A `GeoJSON` point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiPoint {
    /// Always `"Point"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// `[longitude, latitude]`.
    pub coordinates: [f64; 2],
}

/// A noise sample as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiNoiseSample {
    /// Sample id.
    pub id: i64,
    /// Reporting user.
    pub owner_id: String,
    /// Sound level in decibels.
    pub level: f64,
    /// Sample location.
    pub location: ApiPoint,
    /// Noise source category.
    pub source: NoiseSource,
    /// When the sample was recorded (ISO 8601).
    pub timestamp: DateTime<Utc>,
    /// Device descriptor, if one was reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_info: Option<String>,
    /// Client payload, verbatim.
    pub metadata: serde_json::Value,
}

impl From<NoiseSample> for ApiNoiseSample {
    fn from(sample: NoiseSample) -> Self {
        Self {
            id: sample.id,
            owner_id: sample.owner_id,
            level: sample.level,
            location: ApiPoint {
                kind: "Point".to_string(),
                coordinates: sample.location.coordinates(),
            },
            source: sample.source,
            timestamp: sample.timestamp,
            device_info: sample.device_info,
            metadata: sample.metadata,
        }
    }
}

/// Aggregate statistics for an area.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAreaStatistics {
    /// Number of samples in the area.
    pub count: u64,
    /// Mean level in decibels.
    pub average_level: f64,
    /// Lowest level in decibels.
    pub min_level: f64,
    /// Highest level in decibels.
    pub max_level: f64,
}

impl From<AreaStatistics> for ApiAreaStatistics {
    fn from(stats: AreaStatistics) -> Self {
        Self {
            count: stats.count,
            average_level: stats.average_level,
            min_level: stats.min_level,
            max_level: stats.max_level,
        }
    }
}

/// Body of `POST /api/noise/record`.
///
/// Fields stay loosely typed so the query service can report every
/// validation failure with the same error shape.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordNoiseRequest {
    /// Sound level in decibels.
    pub level: f64,
    /// `[longitude, latitude]`.
    pub location: Vec<f64>,
    /// Source category name.
    pub source: String,
    /// Device descriptor.
    #[serde(default)]
    pub device_info: Option<String>,
    /// Opaque key/value payload.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Query parameters for the area and statistics endpoints.
///
/// Kept as raw strings so malformed numbers can be rejected with a
/// descriptive message instead of a generic deserialization error.
#[derive(Debug, Clone, Deserialize)]
pub struct AreaQueryParams {
    /// Center latitude.
    pub lat: Option<String>,
    /// Center longitude.
    pub lng: Option<String>,
    /// Radius in meters.
    pub radius: Option<String>,
}

/// Query parameters for the history endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQueryParams {
    /// Inclusive start (RFC 3339 or `YYYY-MM-DD`).
    pub start_date: Option<String>,
    /// Inclusive end (RFC 3339 or `YYYY-MM-DD`).
    pub end_date: Option<String>,
}

#[cfg(test)]
mod tests {
    use noise_map_noise_models::GeoPoint;

    use super::*;

    #[test]
    fn sample_serializes_as_geojson_point() {
        let sample = NoiseSample {
            id: 3,
            owner_id: "u1".to_string(),
            level: 72.5,
            location: GeoPoint::new(-73.98, 40.75).unwrap(),
            source: NoiseSource::Traffic,
            timestamp: DateTime::parse_from_rfc3339("2024-01-05T10:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            device_info: None,
            metadata: serde_json::json!({"app": "web"}),
        };

        let json = serde_json::to_value(ApiNoiseSample::from(sample)).unwrap();
        assert_eq!(json["ownerId"], "u1");
        assert_eq!(json["source"], "traffic");
        assert_eq!(json["location"]["type"], "Point");
        assert_eq!(json["location"]["coordinates"][0], -73.98);
        assert_eq!(json["metadata"]["app"], "web");
        assert!(json.get("deviceInfo").is_none());
    }

    #[test]
    fn record_request_optional_fields() {
        let req: RecordNoiseRequest = serde_json::from_str(
            r#"{"level": 65, "location": [2.35, 48.85], "source": "construction"}"#,
        )
        .unwrap();
        assert!((req.level - 65.0).abs() < f64::EPSILON);
        assert_eq!(req.location, vec![2.35, 48.85]);
        assert!(req.device_info.is_none());
        assert!(req.metadata.is_none());
    }

    #[test]
    fn statistics_field_names() {
        let json = serde_json::to_value(ApiAreaStatistics::from(AreaStatistics::empty())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"count": 0, "averageLevel": 0.0, "minLevel": 0.0, "maxLevel": 0.0})
        );
    }
}
