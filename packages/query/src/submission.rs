//! Raw sample submissions from the report form.

use chrono::{DateTime, Utc};
use noise_map_database_models::NewNoiseSample;
use noise_map_noise_models::{GeoPoint, NoiseSource, validate_level};

use crate::QueryError;

/// A sample as submitted by a client, before validation.
///
/// The owner and timestamp are not part of the submission: the owner comes
/// from the authentication boundary and the timestamp is the time of
/// acceptance.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSubmission {
    /// Sound level in decibels.
    pub level: f64,
    /// `[lng, lat]`.
    pub location: Vec<f64>,
    /// Source category name, e.g. `"traffic"`.
    pub source: String,
    /// Free-text device descriptor.
    pub device_info: Option<String>,
    /// Opaque key/value payload.
    pub metadata: Option<serde_json::Value>,
}

impl SampleSubmission {
    /// Validates the submission and attaches the owner and timestamp.
    ///
    /// Missing or `null` metadata becomes an empty object.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidArgument`] for an empty owner, a level
    /// outside 0-150 dB, malformed coordinates, a source outside the fixed
    /// enumeration, or metadata that is not a JSON object.
    pub fn into_new_sample(
        self,
        owner_id: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<NewNoiseSample, QueryError> {
        if owner_id.trim().is_empty() {
            return Err(QueryError::invalid("owner id is required"));
        }

        let level = validate_level(self.level).map_err(|e| QueryError::invalid(e.to_string()))?;

        let location = GeoPoint::from_coordinates(&self.location)
            .map_err(|e| QueryError::invalid(e.to_string()))?;

        let source = self.source.parse::<NoiseSource>().map_err(|_| {
            QueryError::invalid(format!(
                "unknown noise source '{}': expected one of {}",
                self.source,
                NoiseSource::all()
                    .iter()
                    .map(AsRef::as_ref)
                    .collect::<Vec<&str>>()
                    .join(", ")
            ))
        })?;

        let metadata = match self.metadata {
            None | Some(serde_json::Value::Null) => serde_json::json!({}),
            Some(value @ serde_json::Value::Object(_)) => value,
            Some(_) => return Err(QueryError::invalid("metadata must be a JSON object")),
        };

        Ok(NewNoiseSample {
            owner_id: owner_id.to_string(),
            level,
            location,
            source,
            timestamp,
            device_info: self.device_info,
            metadata,
        })
    }
}
