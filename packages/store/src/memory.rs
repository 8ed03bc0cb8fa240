//! In-process store backed by an R-tree spherical index.
//!
//! Sample locations are projected onto a sphere in 3-D Cartesian space and
//! bulk-indexed in an `rstar` R-tree. A great-circle radius query becomes a
//! chord-radius ball probe, which has no seams at the antimeridian or the
//! poles. Every candidate is then confirmed with the haversine distance.
//!
//! History lookups walk an ordered `(owner, timestamp, id)` set, the same
//! shape as the compound index the `PostGIS` schema declares.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use noise_map_database_models::{
    AreaStatistics, HistoryQuery, NearbyQuery, NewNoiseSample, NoiseSample,
};
use noise_map_noise_models::GeoPoint;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::sphere::{chord_length, great_circle_distance, to_cartesian};
use crate::{NoiseSampleStore, StoreError};

/// A sample id positioned on the sphere.
type IndexedPoint = GeomWithData<[f64; 3], i64>;

/// Relative slack on the squared chord probe so floating-point error never
/// drops a sample sitting exactly on the radius. The haversine check
/// decides the boundary.
const PROBE_SLACK: f64 = 1.0 + 1e-9;

#[derive(Default)]
struct Inner {
    next_id: i64,
    samples: BTreeMap<i64, NoiseSample>,
    spatial: RTree<IndexedPoint>,
    by_owner: BTreeSet<(String, DateTime<Utc>, i64)>,
}

impl Inner {
    /// Samples within `radius_meters` of `center`, in no particular order.
    fn within(&self, center: &GeoPoint, radius_meters: f64) -> Vec<&NoiseSample> {
        let chord = chord_length(radius_meters);
        let probe = to_cartesian(center);

        self.spatial
            .locate_within_distance(probe, chord * chord * PROBE_SLACK)
            .filter_map(|entry| self.samples.get(&entry.data))
            .filter(|sample| great_circle_distance(center, &sample.location) <= radius_meters)
            .collect()
    }
}

/// Thread-safe in-memory [`NoiseSampleStore`].
///
/// Suitable for tests and single-process deployments; contents are lost
/// when the process exits.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored samples.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store lock is poisoned.
    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.read()?.samples.len())
    }

    /// Whether the store holds no samples.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the store lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.read()?.samples.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::unavailable("memory store lock poisoned"))
    }
}

/// Newest first; ids break timestamp ties so insertion order is stable.
fn newest_first(a: &&NoiseSample, b: &&NoiseSample) -> std::cmp::Ordering {
    b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id))
}

#[async_trait]
impl NoiseSampleStore for MemoryStore {
    async fn insert(&self, sample: NewNoiseSample) -> Result<i64, StoreError> {
        sample
            .validate()
            .map_err(|e| StoreError::invalid(e.to_string()))?;

        let mut inner = self.write()?;
        inner.next_id += 1;
        let id = inner.next_id;

        inner
            .spatial
            .insert(GeomWithData::new(to_cartesian(&sample.location), id));
        inner
            .by_owner
            .insert((sample.owner_id.clone(), sample.timestamp, id));
        inner.samples.insert(id, sample.with_id(id));

        log::trace!("memory store: inserted sample {id}");
        Ok(id)
    }

    async fn query_near(&self, query: &NearbyQuery) -> Result<Vec<NoiseSample>, StoreError> {
        let inner = self.read()?;
        let mut hits = inner.within(&query.center, query.radius_meters);
        hits.sort_by(newest_first);

        Ok(hits
            .into_iter()
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn query_range(&self, query: &HistoryQuery) -> Result<Vec<NoiseSample>, StoreError> {
        let inner = self.read()?;
        let low = (
            query.owner_id.clone(),
            query.from.unwrap_or(DateTime::<Utc>::MIN_UTC),
            i64::MIN,
        );
        let high = (
            query.owner_id.clone(),
            query.to.unwrap_or(DateTime::<Utc>::MAX_UTC),
            i64::MAX,
        );

        if low > high {
            return Ok(Vec::new());
        }

        Ok(inner
            .by_owner
            .range(low..=high)
            .rev()
            .filter_map(|(_, _, id)| inner.samples.get(id))
            .take(query.limit as usize)
            .cloned()
            .collect())
    }

    async fn aggregate_near(
        &self,
        center: &GeoPoint,
        radius_meters: f64,
    ) -> Result<AreaStatistics, StoreError> {
        let inner = self.read()?;
        Ok(AreaStatistics::from_levels(
            inner
                .within(center, radius_meters)
                .into_iter()
                .map(|sample| sample.level),
        ))
    }
}
