/// cache.rs — TTL-bounded metrics cache
///
/// Keyed by (exchange, asset1, asset2, bar interval).  An entry lives for a
/// fixed TTL from its creation; reads never extend it.
///
/// Each entry owns a `OnceCell`, so concurrent callers for the same key
/// during one TTL period share a single provider round-trip and receive the
/// same `Arc`.  The map lock is only held to look up or replace a slot,
/// never across a fetch.
///
/// Failures are cached too: an `Unavailable` outcome is the result for that
/// key until the entry expires.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ahash::AHashMap;
use tokio::sync::OnceCell;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::data::{normalize_asset, Kline, PriceSeriesProvider};
use crate::error::{MetricsError, ProviderError};
use crate::metrics::{compute_snapshot, MetricsOutcome, MetricsSnapshot};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub exchange:     String,
    pub asset1:       String,
    pub asset2:       String,
    pub bar_interval: String,
}

impl CacheKey {
    pub fn new(exchange: &str, asset1: &str, asset2: &str, bar_interval: &str) -> Self {
        Self {
            exchange:     exchange.trim().to_lowercase(),
            asset1:       normalize_asset(asset1),
            asset2:       normalize_asset(asset2),
            bar_interval: bar_interval.trim().to_owned(),
        }
    }
}

struct Slot {
    created: Instant,
    cell:    OnceCell<Arc<MetricsOutcome>>,
}

impl Slot {
    fn new() -> Self {
        Self { created: Instant::now(), cell: OnceCell::new() }
    }
}

pub struct MetricsCache {
    provider:      Arc<dyn PriceSeriesProvider>,
    ttl:           Duration,
    fetch_timeout: Duration,
    min_samples:   usize,
    slots:         Mutex<AHashMap<CacheKey, Arc<Slot>>>,
}

impl MetricsCache {
    pub fn new(
        provider:      Arc<dyn PriceSeriesProvider>,
        ttl:           Duration,
        fetch_timeout: Duration,
        min_samples:   usize,
    ) -> Self {
        Self {
            provider,
            ttl,
            fetch_timeout,
            min_samples,
            slots: Mutex::new(AHashMap::new()),
        }
    }

    /// Cached metrics for a pair, computing them on miss or expiry.
    ///
    /// Never fails: provider and statistics errors come back as
    /// `MetricsOutcome::Unavailable`.
    pub async fn get_or_compute(
        &self,
        exchange:     &str,
        asset1:       &str,
        asset2:       &str,
        window_bars:  usize,
        bar_interval: &str,
    ) -> Arc<MetricsOutcome> {
        let key = CacheKey::new(exchange, asset1, asset2, bar_interval);
        let slot = self.slot_for(&key);
        let outcome = slot.cell.get_or_init(|| self.compute(&key, window_bars)).await;
        Arc::clone(outcome)
    }

    /// Drop every entry; the next request for any key recomputes.
    pub fn invalidate_all(&self) {
        let mut slots = self.lock_slots();
        debug!("Invalidating {} cached pair(s)", slots.len());
        slots.clear();
    }

    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_slots(&self) -> MutexGuard<'_, AHashMap<CacheKey, Arc<Slot>>> {
        // The map stays consistent even if a holder panicked.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn slot_for(&self, key: &CacheKey) -> Arc<Slot> {
        let mut slots = self.lock_slots();
        if let Some(slot) = slots.get(key) {
            if slot.created.elapsed() < self.ttl {
                return Arc::clone(slot);
            }
        }
        let ttl = self.ttl;
        slots.retain(|_, s| s.created.elapsed() < ttl);
        let slot = Arc::new(Slot::new());
        slots.insert(key.clone(), Arc::clone(&slot));
        slot
    }

    async fn compute(&self, key: &CacheKey, window_bars: usize) -> Arc<MetricsOutcome> {
        let outcome = match self.build(key, window_bars).await {
            Ok(snapshot) => {
                info!(
                    "{}/{} on {} {}: β={:.4} z={:.3} n={}",
                    key.asset1, key.asset2, key.exchange, key.bar_interval,
                    snapshot.hedge_ratio, snapshot.current_z, snapshot.samples
                );
                MetricsOutcome::Ready(snapshot)
            }
            Err(e) => {
                warn!("{}/{} on {} unavailable: {}", key.asset1, key.asset2, key.exchange, e);
                MetricsOutcome::Unavailable(e)
            }
        };
        Arc::new(outcome)
    }

    async fn build(
        &self,
        key:         &CacheKey,
        window_bars: usize,
    ) -> Result<MetricsSnapshot, MetricsError> {
        let series1 = self.fetch(key, &key.asset1, window_bars).await?;
        let series2 = self.fetch(key, &key.asset2, window_bars).await?;
        compute_snapshot(&series1, &series2, self.min_samples)
    }

    /// One provider call, bounded by the fetch timeout.
    async fn fetch(
        &self,
        key:         &CacheKey,
        asset:       &str,
        window_bars: usize,
    ) -> Result<Vec<Kline>, ProviderError> {
        let call = self
            .provider
            .fetch_series(&key.exchange, asset, &key.bar_interval, window_bars);
        match timeout(self.fetch_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.fetch_timeout.as_millis() as u64)),
        }
    }
}
