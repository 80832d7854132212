use std::time::Duration;

/// Tunables for [`crate::Engine`]. Every field is a plain integer or
/// [`Duration`] constructed in code — there is no CLI flag or environment
/// variable parsing in this crate; an embedding application is expected to
/// own that layer and call [`crate::Engine::set_max_capacity`] /
/// [`crate::Engine::set_max_forward_block`] itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Soft bound, in bytes, on resident cache footprint. `0` together with
    /// `max_forward_block == 0` disables the cache.
    pub max_capacity: u64,
    /// Maximum permitted distance between `commitNum` and `syncNum` before
    /// the commit pipeline blocks.
    pub max_forward_block: u64,
    /// How often the evictor wakes to drain the MRU mutation queue and
    /// sweep for evictable slots.
    pub evictor_interval: Duration,
    /// Maximum number of MRU mutation-queue items drained per evictor pass.
    pub max_pop_mru: usize,
    /// Number of times the backpressured committer yields the thread before
    /// it starts sleeping.
    pub backpressure_spins: u32,
    /// Initial sleep duration once spinning gives up.
    pub backpressure_initial_sleep: Duration,
    /// Upper bound the escalating sleep is capped at.
    pub backpressure_max_sleep: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_capacity: 32 * 1024 * 1024,
            max_forward_block: 10,
            evictor_interval: Duration::from_millis(50),
            max_pop_mru: 1024,
            backpressure_spins: 64,
            backpressure_initial_sleep: Duration::from_millis(1),
            backpressure_max_sleep: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    /// The degenerate "disabled cache" configuration: commits are flushed
    /// synchronously on the caller's thread and the cache is cleared after
    /// every successful commit.
    pub fn disabled() -> Self {
        Self {
            max_capacity: 0,
            max_forward_block: 0,
            ..Self::default()
        }
    }

    /// `true` when both bounds are zero, i.e. caching is disabled and every
    /// commit is synchronous.
    pub fn cache_disabled(&self) -> bool {
        self.max_capacity == 0 && self.max_forward_block == 0
    }
}
