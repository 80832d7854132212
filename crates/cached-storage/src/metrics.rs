use std::sync::atomic::{AtomicU64, Ordering};

/// Observability hook for an embedding application. All methods default to
/// doing nothing, mirroring how `crates/core/src/db/db_metrics/mod.rs`
/// centralizes metric registration behind a single point applications can
/// opt into without the core crate depending on a specific exporter
/// (`prometheus`, `metrics`, ...). The engine itself always keeps the plain
/// [`Counters`] below up to date regardless of whether a [`StorageMetrics`]
/// implementation is wired in.
pub trait StorageMetrics: Send + Sync + 'static {
    fn on_cache_hit(&self) {}
    fn on_cache_miss(&self) {}
    fn on_evicted(&self, _bytes: u64) {}
    fn on_backpressure_stall(&self) {}
}

/// No-op default used when an embedder doesn't wire up a [`StorageMetrics`]
/// implementation.
#[derive(Default)]
pub struct NoopMetrics;

impl StorageMetrics for NoopMetrics {}

/// Plain, always-on counters, readable without going through a
/// [`StorageMetrics`] implementation — useful for tests and ad-hoc
/// introspection.
#[derive(Default)]
pub struct Counters {
    pub cache_hits: AtomicU64,
    pub cache_misses: AtomicU64,
    pub evicted_slots: AtomicU64,
    pub evicted_bytes: AtomicU64,
    pub backpressure_stalls: AtomicU64,
}

impl Counters {
    pub fn record_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self, bytes: u64) {
        self.evicted_slots.fetch_add(1, Ordering::Relaxed);
        self.evicted_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_backpressure_stall(&self) {
        self.backpressure_stalls.fetch_add(1, Ordering::Relaxed);
    }
}
