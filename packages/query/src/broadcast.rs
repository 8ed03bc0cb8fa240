//! Real-time fan-out of newly recorded samples.
//!
//! The write path publishes every stored sample here after a successful
//! insert. Downstream consumers (the SSE endpoint, tests) subscribe
//! independently. Publishing never fails the write: with no subscribers
//! the event is dropped.

use noise_map_database_models::NoiseSample;
use tokio::sync::broadcast;

/// Event name used on the wire for new samples.
pub const NOISE_UPDATE_EVENT: &str = "noise-update";

/// Default channel capacity. Slow subscribers that fall further behind
/// than this skip the oldest events.
pub const DEFAULT_CAPACITY: usize = 256;

/// A newly stored sample.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseUpdate {
    /// The sample as persisted, including its id.
    pub sample: NoiseSample,
}

/// Broadcast channel for [`NoiseUpdate`] events.
#[derive(Debug, Clone)]
pub struct SampleBroadcaster {
    tx: broadcast::Sender<NoiseUpdate>,
}

impl Default for SampleBroadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl SampleBroadcaster {
    /// Creates a broadcaster with the given buffer capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes a sample to all current subscribers.
    ///
    /// Returns the number of subscribers reached.
    pub fn publish(&self, sample: &NoiseSample) -> usize {
        match self.tx.send(NoiseUpdate {
            sample: sample.clone(),
        }) {
            Ok(reached) => {
                log::debug!("Broadcast sample {} to {reached} subscriber(s)", sample.id);
                reached
            }
            Err(_) => {
                log::trace!("No subscribers for sample {}", sample.id);
                0
            }
        }
    }

    /// Subscribes to future updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<NoiseUpdate> {
        self.tx.subscribe()
    }

    /// Number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
