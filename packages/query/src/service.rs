//! The noise query service.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use noise_map_database_models::{AreaStatistics, HistoryQuery, NearbyQuery, NoiseSample};
use noise_map_noise_models::GeoPoint;
use noise_map_store::{NoiseSampleStore, StoreError};
use tokio::sync::broadcast;

use crate::broadcast::{NoiseUpdate, SampleBroadcaster};
use crate::params::TimeRange;
use crate::submission::SampleSubmission;
use crate::{DEFAULT_RADIUS_METERS, MAX_RESULTS, QueryError};

/// Default upper bound on a single store round-trip.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

/// Stateless query front-end over a [`NoiseSampleStore`].
///
/// Holds no mutable state of its own, so one instance can serve any number
/// of concurrent requests. Cloning is cheap.
#[derive(Clone)]
pub struct NoiseQueryService {
    store: Arc<dyn NoiseSampleStore>,
    broadcaster: SampleBroadcaster,
    default_radius_meters: f64,
    store_timeout: Duration,
}

impl NoiseQueryService {
    /// Creates a service with the default radius, timeout, and a fresh
    /// broadcaster.
    #[must_use]
    pub fn new(store: Arc<dyn NoiseSampleStore>) -> Self {
        Self {
            store,
            broadcaster: SampleBroadcaster::default(),
            default_radius_meters: DEFAULT_RADIUS_METERS,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    /// Overrides the radius used when a request supplies none.
    ///
    /// Non-positive or non-finite values are ignored.
    #[must_use]
    pub fn with_default_radius(mut self, meters: f64) -> Self {
        if meters.is_finite() && meters > 0.0 {
            self.default_radius_meters = meters;
        }
        self
    }

    /// Overrides the per-round-trip store timeout.
    #[must_use]
    pub const fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Replaces the broadcaster new samples are published on.
    #[must_use]
    pub fn with_broadcaster(mut self, broadcaster: SampleBroadcaster) -> Self {
        self.broadcaster = broadcaster;
        self
    }

    /// Subscribes to samples recorded through this service.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NoiseUpdate> {
        self.broadcaster.subscribe()
    }

    /// The radius actually searched for a requested radius.
    #[must_use]
    pub fn resolve_radius(&self, requested: Option<f64>) -> f64 {
        requested
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or(self.default_radius_meters)
    }

    /// Returns up to [`MAX_RESULTS`] samples within the radius of `center`,
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Unavailable`] if the store fails or times out.
    pub async fn find_nearby(
        &self,
        center: GeoPoint,
        radius_meters: Option<f64>,
    ) -> Result<Vec<NoiseSample>, QueryError> {
        let query = NearbyQuery {
            center,
            radius_meters: self.resolve_radius(radius_meters),
            limit: MAX_RESULTS,
        };
        log::debug!(
            "find_nearby: center={:?} radius={}m",
            center.coordinates(),
            query.radius_meters
        );

        self.round_trip("query_near", self.store.query_near(&query))
            .await
    }

    /// Returns up to [`MAX_RESULTS`] of an owner's samples inside `range`,
    /// newest first.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidArgument`] for an empty owner id, and
    /// [`QueryError::Unavailable`] if the store fails or times out.
    pub async fn find_history(
        &self,
        owner_id: &str,
        range: &TimeRange,
    ) -> Result<Vec<NoiseSample>, QueryError> {
        if owner_id.trim().is_empty() {
            return Err(QueryError::invalid("owner id is required"));
        }

        let query = HistoryQuery {
            owner_id: owner_id.to_string(),
            from: range.start(),
            to: range.end(),
            limit: MAX_RESULTS,
        };
        log::debug!(
            "find_history: owner={owner_id} from={:?} to={:?}",
            query.from,
            query.to
        );

        self.round_trip("query_range", self.store.query_range(&query))
            .await
    }

    /// Aggregates every sample within the radius of `center`.
    ///
    /// An empty area yields [`AreaStatistics::empty`], not an error.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Unavailable`] if the store fails or times out.
    pub async fn area_statistics(
        &self,
        center: GeoPoint,
        radius_meters: Option<f64>,
    ) -> Result<AreaStatistics, QueryError> {
        let radius = self.resolve_radius(radius_meters);
        log::debug!(
            "area_statistics: center={:?} radius={radius}m",
            center.coordinates()
        );

        self.round_trip("aggregate_near", self.store.aggregate_near(&center, radius))
            .await
    }

    /// Validates and stores a submission, then publishes it to subscribers.
    ///
    /// The broadcast is fire-and-forget and never fails the write.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::InvalidArgument`] if the submission breaks a
    /// data-model invariant, and [`QueryError::Unavailable`] if the store
    /// fails or times out.
    pub async fn record_sample(
        &self,
        owner_id: &str,
        submission: SampleSubmission,
    ) -> Result<NoiseSample, QueryError> {
        let new_sample = submission.into_new_sample(owner_id, Utc::now())?;

        let id = self
            .round_trip("insert", self.store.insert(new_sample.clone()))
            .await?;
        let sample = new_sample.with_id(id);

        log::info!(
            "Recorded sample {id}: {} dB ({}) from {owner_id}",
            sample.level,
            sample.source
        );

        self.broadcaster.publish(&sample);

        Ok(sample)
    }

    /// Awaits one store call under the configured timeout.
    async fn round_trip<T>(
        &self,
        operation: &str,
        call: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, QueryError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(|e| {
                log::warn!("Store {operation} failed: {e}");
                QueryError::from(e)
            }),
            Err(_) => {
                log::warn!(
                    "Store {operation} timed out after {}ms",
                    self.store_timeout.as_millis()
                );
                Err(QueryError::unavailable(format!(
                    "store {operation} timed out after {}ms",
                    self.store_timeout.as_millis()
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone as _};
    use noise_map_database_models::NewNoiseSample;
    use noise_map_noise_models::NoiseSource;
    use noise_map_store::memory::MemoryStore;
    use noise_map_store::sphere::great_circle_distance;

    use super::*;
    use crate::params::parse_time_range;

    fn point(lng: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lng, lat).unwrap()
    }

    fn submit(lng: f64, lat: f64, level: f64) -> SampleSubmission {
        SampleSubmission {
            level,
            location: vec![lng, lat],
            source: "traffic".to_string(),
            device_info: None,
            metadata: None,
        }
    }

    fn stored(owner: &str, level: f64, ts: DateTime<Utc>) -> NewNoiseSample {
        NewNoiseSample {
            owner_id: owner.to_string(),
            level,
            location: point(2.35, 48.85),
            source: NoiseSource::Restaurant,
            timestamp: ts,
            device_info: None,
            metadata: serde_json::json!({}),
        }
    }

    fn service() -> (Arc<MemoryStore>, NoiseQueryService) {
        let store = Arc::new(MemoryStore::new());
        let service = NoiseQueryService::new(store.clone());
        (store, service)
    }

    /// A store whose every call fails as if the backend were down.
    struct DownStore;

    #[async_trait]
    impl NoiseSampleStore for DownStore {
        async fn insert(&self, _: NewNoiseSample) -> Result<i64, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }
        async fn query_near(&self, _: &NearbyQuery) -> Result<Vec<NoiseSample>, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }
        async fn query_range(&self, _: &HistoryQuery) -> Result<Vec<NoiseSample>, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }
        async fn aggregate_near(&self, _: &GeoPoint, _: f64) -> Result<AreaStatistics, StoreError> {
            Err(StoreError::unavailable("connection refused"))
        }
    }

    /// A store that never answers in time.
    struct StalledStore;

    #[async_trait]
    impl NoiseSampleStore for StalledStore {
        async fn insert(&self, _: NewNoiseSample) -> Result<i64, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(1)
        }
        async fn query_near(&self, _: &NearbyQuery) -> Result<Vec<NoiseSample>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
        async fn query_range(&self, _: &HistoryQuery) -> Result<Vec<NoiseSample>, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Vec::new())
        }
        async fn aggregate_near(&self, _: &GeoPoint, _: f64) -> Result<AreaStatistics, StoreError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(AreaStatistics::empty())
        }
    }

    #[tokio::test]
    async fn three_sample_scenario() {
        let (_, service) = service();
        service.record_sample("u1", submit(0.0, 0.0, 40.0)).await.unwrap();
        service.record_sample("u1", submit(0.0, 0.001, 60.0)).await.unwrap();
        service.record_sample("u1", submit(10.0, 10.0, 90.0)).await.unwrap();

        let nearby = service
            .find_nearby(point(0.0, 0.0), Some(1000.0))
            .await
            .unwrap();
        let levels: Vec<f64> = nearby.iter().map(|s| s.level).collect();
        assert_eq!(levels, vec![60.0, 40.0]);

        let stats = service
            .area_statistics(point(0.0, 0.0), Some(1000.0))
            .await
            .unwrap();
        assert_eq!(stats.count, 2);
        assert!((stats.average_level - 50.0).abs() < 1e-9);
        assert!((stats.min_level - 40.0).abs() < f64::EPSILON);
        assert!((stats.max_level - 60.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn missing_radius_uses_default() {
        let (_, service) = service();
        // ~890 m north of the center: inside 1000 m, outside 500 m.
        service.record_sample("u1", submit(0.0, 0.008, 70.0)).await.unwrap();

        assert_eq!(
            service.find_nearby(point(0.0, 0.0), None).await.unwrap().len(),
            1
        );
        assert_eq!(
            service
                .find_nearby(point(0.0, 0.0), Some(-5.0))
                .await
                .unwrap()
                .len(),
            1
        );
        assert!(
            service
                .find_nearby(point(0.0, 0.0), Some(500.0))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn nearby_results_are_within_radius_sorted_and_capped() {
        let (store, service) = service();
        let center = point(-73.98, 40.75);
        let base = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();

        let mut minute = 0i64;
        for dx in -12i32..=12 {
            for dy in -12i32..=12 {
                let location = point(
                    center.longitude() + f64::from(dx) * 0.001,
                    center.latitude() + f64::from(dy) * 0.001,
                );
                // Timestamps deliberately out of spatial order.
                minute = (minute * 37 + 11) % 10_007;
                let mut sample = stored("grid", 30.0 + f64::from((dx + dy).abs()), base);
                sample.location = location;
                sample.timestamp = base + chrono::Duration::minutes(minute);
                store.insert(sample).await.unwrap();
            }
        }

        let radius = 800.0;
        let hits = service.find_nearby(center, Some(radius)).await.unwrap();
        assert!(hits.len() <= MAX_RESULTS as usize);
        assert!(!hits.is_empty());

        for sample in &hits {
            assert!(great_circle_distance(&center, &sample.location) <= radius);
        }
        for pair in hits.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }

        let stats = service.area_statistics(center, Some(radius)).await.unwrap();
        assert!(stats.count > u64::from(MAX_RESULTS));
        assert_eq!(hits.len(), MAX_RESULTS as usize);
        assert!(stats.min_level <= stats.average_level);
        assert!(stats.average_level <= stats.max_level);
    }

    #[tokio::test]
    async fn statistics_count_matches_uncapped_matches() {
        let (_, service) = service();
        for i in 0..7 {
            service
                .record_sample("u1", submit(0.0, 0.0001 * f64::from(i), 50.0 + f64::from(i)))
                .await
                .unwrap();
        }
        let hits = service.find_nearby(point(0.0, 0.0), None).await.unwrap();
        let stats = service.area_statistics(point(0.0, 0.0), None).await.unwrap();
        assert_eq!(stats.count, hits.len() as u64);
        assert!((stats.average_level - 53.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn empty_area_statistics_is_zero_record() {
        let (_, service) = service();
        let stats = service
            .area_statistics(point(100.0, -45.0), Some(1000.0))
            .await
            .unwrap();
        assert_eq!(stats, AreaStatistics::empty());
    }

    #[tokio::test]
    async fn empty_nearby_is_not_an_error() {
        let (_, service) = service();
        assert!(
            service
                .find_nearby(point(100.0, -45.0), None)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn history_is_owner_scoped_inclusive_and_newest_first() {
        let (store, service) = service();
        let jan = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 1, d, h, 0, 0).unwrap();

        store.insert(stored("u1", 41.0, jan(1, 0))).await.unwrap();
        store.insert(stored("u1", 42.0, jan(15, 12))).await.unwrap();
        store.insert(stored("u1", 43.0, jan(31, 22))).await.unwrap();
        store
            .insert(stored(
                "u1",
                44.0,
                Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 1).unwrap(),
            ))
            .await
            .unwrap();
        store
            .insert(stored(
                "u1",
                45.0,
                Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap(),
            ))
            .await
            .unwrap();
        store.insert(stored("u2", 46.0, jan(10, 0))).await.unwrap();

        let range = parse_time_range(Some("2024-01-01"), Some("2024-01-31")).unwrap();
        let history = service.find_history("u1", &range).await.unwrap();

        let levels: Vec<f64> = history.iter().map(|s| s.level).collect();
        assert_eq!(levels, vec![43.0, 42.0, 41.0]);
        assert!(history.iter().all(|s| s.owner_id == "u1"));
    }

    #[tokio::test]
    async fn history_without_range_is_capped() {
        let (store, service) = service();
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for i in 0..120 {
            store
                .insert(stored("u1", 50.0, base + chrono::Duration::seconds(i)))
                .await
                .unwrap();
        }
        let history = service
            .find_history("u1", &TimeRange::unbounded())
            .await
            .unwrap();
        assert_eq!(history.len(), MAX_RESULTS as usize);
        assert_eq!(history[0].timestamp, base + chrono::Duration::seconds(119));
    }

    #[tokio::test]
    async fn history_requires_owner() {
        let (_, service) = service();
        assert!(matches!(
            service.find_history(" ", &TimeRange::unbounded()).await,
            Err(QueryError::InvalidArgument { .. })
        ));
    }

    #[tokio::test]
    async fn record_rejects_invalid_input_before_store() {
        let service = NoiseQueryService::new(Arc::new(DownStore));

        for submission in [
            submit(0.0, 0.0, -1.0),
            submit(0.0, 0.0, 151.0),
            SampleSubmission {
                source: "party".to_string(),
                ..submit(0.0, 0.0, 60.0)
            },
        ] {
            assert!(matches!(
                service.record_sample("u1", submission).await,
                Err(QueryError::InvalidArgument { .. })
            ));
        }
    }

    #[tokio::test]
    async fn record_accepts_boundary_levels() {
        let (store, service) = service();
        service.record_sample("u1", submit(0.0, 0.0, 0.0)).await.unwrap();
        service.record_sample("u1", submit(0.0, 0.0, 150.0)).await.unwrap();
        assert_eq!(store.len().unwrap(), 2);
    }

    #[tokio::test]
    async fn record_publishes_to_subscribers() {
        let (_, service) = service();
        let mut rx = service.subscribe();

        let sample = service
            .record_sample("u7", submit(4.9, 52.37, 88.0))
            .await
            .unwrap();

        let update = rx.recv().await.unwrap();
        assert_eq!(update.sample, sample);
        assert_eq!(update.sample.owner_id, "u7");
    }

    #[tokio::test]
    async fn services_sharing_a_broadcaster_reach_one_subscriber() {
        let broadcaster = SampleBroadcaster::new(8);
        let writer = NoiseQueryService::new(Arc::new(MemoryStore::new()))
            .with_broadcaster(broadcaster.clone());
        let reader = NoiseQueryService::new(Arc::new(MemoryStore::new()))
            .with_broadcaster(broadcaster.clone());
        assert_eq!(broadcaster.subscriber_count(), 0);

        let mut rx = reader.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);

        let sample = writer
            .record_sample("u3", submit(-0.12, 51.5, 64.0))
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap().sample, sample);

        drop(rx);
        assert_eq!(broadcaster.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn record_succeeds_without_subscribers() {
        let (_, service) = service();
        let sample = service
            .record_sample("u1", submit(4.9, 52.37, 88.0))
            .await
            .unwrap();
        assert!(sample.id > 0);
    }

    #[tokio::test]
    async fn store_failures_surface_as_unavailable() {
        let service = NoiseQueryService::new(Arc::new(DownStore));
        assert!(matches!(
            service.find_nearby(point(0.0, 0.0), None).await,
            Err(QueryError::Unavailable { .. })
        ));
        assert!(matches!(
            service.area_statistics(point(0.0, 0.0), None).await,
            Err(QueryError::Unavailable { .. })
        ));
        assert!(matches!(
            service.find_history("u1", &TimeRange::unbounded()).await,
            Err(QueryError::Unavailable { .. })
        ));
        assert!(matches!(
            service.record_sample("u1", submit(0.0, 0.0, 60.0)).await,
            Err(QueryError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn slow_store_times_out_as_unavailable() {
        let service = NoiseQueryService::new(Arc::new(StalledStore))
            .with_store_timeout(Duration::from_millis(20));

        let err = service
            .find_nearby(point(0.0, 0.0), None)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Unavailable { .. }));
        assert!(err.to_string().contains("timed out"));

        let mut rx = service.subscribe();
        assert!(
            service
                .record_sample("u1", submit(0.0, 0.0, 60.0))
                .await
                .is_err()
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn default_radius_override_ignores_bad_values() {
        let service = NoiseQueryService::new(Arc::new(MemoryStore::new()))
            .with_default_radius(-3.0)
            .with_default_radius(2500.0)
            .with_default_radius(f64::NAN);
        assert!((service.resolve_radius(None) - 2500.0).abs() < f64::EPSILON);
        assert!((service.resolve_radius(Some(10.0)) - 10.0).abs() < f64::EPSILON);
    }
}
