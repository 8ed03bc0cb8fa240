#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Geospatial noise query service.
//!
//! [`service::NoiseQueryService`] answers "what is the noise climate near
//! point P within radius R" on top of any
//! [`noise_map_store::NoiseSampleStore`]: bounded radius searches, owner
//! history lookups, and unweighted area statistics. It also owns the write
//! path, which validates a submission, inserts it, and announces it on the
//! [`broadcast::SampleBroadcaster`].
//!
//! Input validation happens before any store round-trip. Store failures
//! are never swallowed; they surface as [`QueryError::Unavailable`].

pub mod broadcast;
pub mod params;
pub mod service;
pub mod submission;

pub use service::NoiseQueryService;

use noise_map_store::StoreError;
use thiserror::Error;

/// Maximum number of samples any list query returns.
pub const MAX_RESULTS: u32 = 100;

/// Search radius used when a request supplies none, or a non-positive one.
pub const DEFAULT_RADIUS_METERS: f64 = 1000.0;

/// Errors returned by the query service.
///
/// An empty result set is not an error.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed or out-of-range input. A client error; never retried.
    #[error("{message}")]
    InvalidArgument {
        /// Description of what was rejected.
        message: String,
    },

    /// The store was unreachable, failed, or timed out. Callers may retry.
    #[error("{message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

impl QueryError {
    /// Shorthand for [`QueryError::InvalidArgument`].
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand for [`QueryError::Unavailable`].
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }
}

impl From<StoreError> for QueryError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::InvalidArgument { message } => Self::InvalidArgument { message },
            StoreError::Unavailable { message } => Self::Unavailable { message },
        }
    }
}
