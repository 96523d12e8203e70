use crate::rpc::SampleSource;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Number of performance samples requested per estimate.
pub const PERFORMANCE_SAMPLE_COUNT: usize = 100;

struct CachedEstimate {
    endpoint: String,
    seconds_per_slot: f64,
    computed_at: Instant,
}

/// Estimates the cluster's seconds-per-slot figure from recent performance
/// samples. Estimates are cached per endpoint inside a freshness window so
/// back-to-back hydrate runs do not hammer the RPC node; failures degrade to
/// the configured fallback and are never cached, so the next caller retries.
pub struct SlotDurationEstimator {
    fallback: f64,
    freshness: Duration,
    cache: Mutex<Option<CachedEstimate>>,
}

impl SlotDurationEstimator {
    pub fn new(fallback: f64, freshness: Duration) -> Self {
        Self {
            fallback,
            freshness,
            cache: Mutex::new(None),
        }
    }

    pub fn fallback(&self) -> f64 {
        self.fallback
    }

    /// Returns the estimated seconds per slot for the given endpoint.
    ///
    /// With no endpoint configured this returns the fallback without touching
    /// the network or the cache. This call never fails: telemetry errors and
    /// empty sample sets degrade silently to the fallback.
    pub async fn estimate(&self, source: Option<&dyn SampleSource>) -> f64 {
        let Some(source) = source else {
            return self.fallback;
        };

        let endpoint = source.endpoint();

        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.as_ref() {
                if cached.endpoint == endpoint && cached.computed_at.elapsed() < self.freshness {
                    return cached.seconds_per_slot;
                }
            }
        }

        let samples = match source.fetch_samples(PERFORMANCE_SAMPLE_COUNT).await {
            Ok(samples) => samples,
            Err(err) => {
                tracing::warn!(
                    endpoint,
                    error = %err,
                    fallback = self.fallback,
                    "performance sample fetch failed; using fallback slot duration"
                );
                return self.fallback;
            }
        };

        if samples.is_empty() {
            tracing::warn!(
                endpoint,
                fallback = self.fallback,
                "endpoint returned no performance samples; using fallback slot duration"
            );
            return self.fallback;
        }

        let total_slots: u64 = samples.iter().map(|sample| sample.num_slots).sum();
        let seconds_per_slot = total_slots as f64 / samples.len() as f64 / 60.0;

        tracing::debug!(
            endpoint,
            samples = samples.len(),
            seconds_per_slot,
            "slot duration estimated from performance samples"
        );

        let mut cache = self.cache.lock().await;
        *cache = Some(CachedEstimate {
            endpoint: endpoint.to_owned(),
            seconds_per_slot,
            computed_at: Instant::now(),
        });

        seconds_per_slot
    }
}
