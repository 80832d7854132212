//! The evictor: a single dedicated thread that owns the only mutable
//! [`MruList`] in the process, draining [`crate::mru::MruQueue`] touches
//! pushed by readers and committers and sweeping least-recently-used slots
//! once the cache exceeds its capacity bound.
//!
//! Not started at all when the engine is configured with caching disabled
//! — there is nothing to evict, and every producer skips pushing MRU
//! touches in that mode so the queue never grows unboundedly between
//! commits.

use std::sync::atomic::Ordering;
use std::sync::Weak;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::backend::BackendStorage;
use crate::engine::EngineState;
use crate::error::fatal;
use crate::mru::{MruList, MruTouch};

pub(crate) fn spawn<B: BackendStorage>(
    state: Weak<EngineState<B>>,
    interval: Duration,
    max_pop: usize,
) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("cached-storage-evictor".into())
        .spawn(move || run(state, interval, max_pop))
        .expect("failed to spawn evictor thread")
}

fn run<B: BackendStorage>(state: Weak<EngineState<B>>, interval: Duration, max_pop: usize) {
    let mut mru = MruList::new();
    loop {
        std::thread::sleep(interval);
        let Some(state) = state.upgrade() else { return };
        if !state.running.load(Ordering::SeqCst) {
            return;
        }
        let _span = tracing::trace_span!("cached_storage::evictor::sweep").entered();
        drain_touches(&state, &mut mru, max_pop);
        sweep(&state, &mut mru);
    }
}

fn drain_touches<B: BackendStorage>(state: &EngineState<B>, mru: &mut MruList, max_pop: usize) {
    let mut drained = 0;
    while drained < max_pop {
        let Some(MruTouch { key, delta }) = state.mru_queue.pop() else {
            break;
        };
        state.capacity.apply_delta(delta);
        mru.touch(key);
        drained += 1;
    }
    if drained == max_pop {
        tracing::trace!(max_pop, "evictor hit its per-sweep drain cap; touches remain queued");
    }
}

/// Walks the MRU list from its least-recently-used end, evicting slots
/// until the cache is back under its capacity bound, a slot too young to
/// evict stops the pass, or the list is exhausted.
///
/// A candidate slot is first optimistically unlinked from the
/// [`crate::index::CacheIndex`] (so no new reader can observe it mid-evict)
/// and only cleared once a write lock is actually acquired; on contention
/// it is re-linked via [`crate::index::CacheIndex::restore`] and the walk
/// moves past it to the next-oldest candidate rather than stopping the
/// whole pass or blocking on the busy row-group.
fn sweep<B: BackendStorage>(state: &EngineState<B>, mru: &mut MruList) {
    let max_capacity = state.max_capacity.load(Ordering::Relaxed);
    if max_capacity == 0 {
        return;
    }
    let sync_num = state.sync_num.load(Ordering::SeqCst);
    if sync_num == 0 {
        return;
    }
    for key in mru.keys_from_head() {
        if state.capacity.get() <= max_capacity {
            break;
        }
        let Some(slot) = state.index.get(&key) else {
            mru.remove(&key);
            continue;
        };
        if !state.index.erase_if(&key, &slot) {
            // Another thread already replaced or removed this slot.
            mru.remove(&key);
            continue;
        }
        match slot.try_write() {
            Some(mut guard) => {
                // The slot's own watermark, not its MRU position, is the
                // real eviction gate: one still newer than the flusher's
                // watermark must never be erased, so restore it and stop
                // the whole pass — everything from here on is at least as
                // recent, by construction of the MRU order.
                if guard.num > sync_num {
                    drop(guard);
                    if state.index.restore(slot).is_err() {
                        fatal("evictor lost race restoring a slot it had just claimed");
                    }
                    break;
                }
                let freed = guard.capacity();
                guard.entries.clear();
                guard.num = 0;
                guard.empty = true;
                drop(guard);
                mru.remove(&key);
                state.capacity.apply_delta(-(freed as i64));
                state.counters.record_eviction(freed);
                state.metrics.on_evicted(freed);
            }
            None => {
                // Lock contention: leave this slot linked at its current
                // position and move on to the next-oldest candidate.
                if state.index.restore(slot).is_err() {
                    fatal("evictor lost race restoring a slot it had just claimed");
                }
            }
        }
    }
}
