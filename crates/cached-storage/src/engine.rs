use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use crate::backend::{BackendStorage, TableData};
use crate::config::EngineConfig;
use crate::entry::{Condition, Entries, Entry, TableInfo};
use crate::error::{fatal, StorageError};
use crate::evictor;
use crate::flusher::{self, FlushTask};
use crate::id_alloc::GlobalIdAllocator;
use crate::index::CacheIndex;
use crate::metrics::{Counters, NoopMetrics, StorageMetrics};
use crate::mru::{CapacityAccountant, MruQueue, MruTouch};
use crate::slot::{CacheSlot, SlotKey};
use crate::sys;

fn backend_err<E: std::error::Error + Send + Sync + 'static>(e: E) -> StorageError {
    StorageError::Backend(Box::new(e))
}

/// Input to [`Engine::commit`] for one table: the table's descriptor plus
/// the dirty (already-persisted, `id != 0`) and new (`id == 0`) entries a
/// block wants to apply.
pub struct CommitTableData {
    pub info: Arc<TableInfo>,
    pub dirty: Vec<Entry>,
    pub new_entries: Vec<Entry>,
}

/// The engine's shared state. `Engine<B>` is a thin handle around
/// `Arc<EngineState<B>>`; background threads hold only a [`std::sync::Weak`]
/// to it, so a dropped engine is never kept alive by a scheduled eviction
/// or flush tick.
pub(crate) struct EngineState<B: BackendStorage> {
    pub(crate) backend: RwLock<Option<Arc<B>>>,
    pub(crate) index: CacheIndex,
    pub(crate) mru_queue: MruQueue,
    pub(crate) capacity: CapacityAccountant,
    pub(crate) id_alloc: GlobalIdAllocator,
    pub(crate) commit_num: AtomicU64,
    pub(crate) sync_num: AtomicU64,
    pub(crate) running: AtomicBool,
    pub(crate) max_capacity: AtomicU64,
    pub(crate) max_forward_block: AtomicU64,
    pub(crate) config: EngineConfig,
    pub(crate) counters: Counters,
    pub(crate) metrics: Box<dyn StorageMetrics>,
    pub(crate) flush_tx: Mutex<Option<crossbeam_channel::Sender<FlushTask>>>,
}

impl<B: BackendStorage> EngineState<B> {
    fn cache_disabled(&self) -> bool {
        self.max_capacity.load(Ordering::Relaxed) == 0 && self.max_forward_block.load(Ordering::Relaxed) == 0
    }

    /// Fills `slot` from the backend if it is still empty, then schedules
    /// the appropriate MRU touch. Shared by the read path and the
    /// commit-pipeline's dirty-entry prepare step.
    pub(crate) fn ensure_filled(
        &self,
        slot: &Arc<CacheSlot>,
        table_info: &TableInfo,
        key: &str,
    ) -> Result<(), StorageError> {
        let disabled = self.cache_disabled();
        {
            let guard = slot.read();
            if !guard.empty {
                drop(guard);
                if !disabled {
                    self.mru_queue.push(MruTouch {
                        key: slot.key.clone(),
                        delta: 0,
                    });
                }
                return Ok(());
            }
        }
        let mut guard = slot.write();
        if !guard.empty {
            drop(guard);
            if !disabled {
                self.mru_queue.push(MruTouch {
                    key: slot.key.clone(),
                    delta: 0,
                });
            }
            return Ok(());
        }
        let Some(backend) = self.backend.read().clone() else {
            drop(guard);
            if !disabled {
                self.mru_queue.push(MruTouch {
                    key: slot.key.clone(),
                    delta: 0,
                });
            }
            return Ok(());
        };
        let cond = Condition::eq(table_info.key_field.as_str(), key);
        let entries = backend
            .select(&[], 0, table_info, key, &cond)
            .map_err(backend_err)?;
        let cap: u64 = entries.iter().map(Entry::capacity).sum();
        guard.num = entries.iter().map(|e| e.num).max().unwrap_or(0);
        guard.entries = entries;
        guard.empty = false;
        #[cfg(debug_assertions)]
        guard.check_invariants();
        drop(guard);
        // The evictor may have erased this slot's index entry out from under
        // us while we held its write lock filling it (it only needs the
        // read lock we briefly released between the empty-check and taking
        // the write lock to do so). Re-insert it so our fill is reachable
        // through the index again; a different slot object now sitting at
        // this key means two live copies exist for the same row-group,
        // which is unrecoverable.
        if let Err(other) = self.index.restore(slot.clone()) {
            let _ = other;
            fatal(format!("slot identity mismatch restoring cache for {}", slot.key.table));
        }
        if !self.cache_disabled() {
            self.mru_queue.push(MruTouch {
                key: slot.key.clone(),
                delta: cap as i64,
            });
        }
        Ok(())
    }
}

/// A write-through, bounded-capacity caching storage engine.
///
/// Cheap to clone: every clone shares the same underlying state through an
/// `Arc`.
pub struct Engine<B: BackendStorage> {
    pub(crate) state: Arc<EngineState<B>>,
    flusher_handle: Mutex<Option<JoinHandle<()>>>,
    evictor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl<B: BackendStorage> Clone for Engine<B> {
    fn clone(&self) -> Self {
        // Background-thread handles are owned by the first `Engine` value
        // constructed via `Engine::new`; clones share state but do not
        // manage the threads' lifetimes. `stop`/`Drop` on any clone still
        // observes and flips the shared `running` flag.
        Self {
            state: self.state.clone(),
            flusher_handle: Mutex::new(None),
            evictor_handle: Mutex::new(None),
        }
    }
}

impl<B: BackendStorage> Engine<B> {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_metrics(config, Box::new(NoopMetrics))
    }

    pub fn with_metrics(config: EngineConfig, metrics: Box<dyn StorageMetrics>) -> Self {
        let state = Arc::new(EngineState {
            backend: RwLock::new(None),
            index: CacheIndex::new(),
            mru_queue: MruQueue::new(),
            capacity: CapacityAccountant::new(),
            id_alloc: GlobalIdAllocator::new(),
            commit_num: AtomicU64::new(0),
            sync_num: AtomicU64::new(0),
            running: AtomicBool::new(true),
            max_capacity: AtomicU64::new(config.max_capacity),
            max_forward_block: AtomicU64::new(config.max_forward_block),
            config,
            counters: Counters::default(),
            metrics,
            flush_tx: Mutex::new(None),
        });
        Self {
            state,
            flusher_handle: Mutex::new(None),
            evictor_handle: Mutex::new(None),
        }
    }

    /// Sets (or replaces) the durable backend. Must be called, and
    /// [`Engine::init`] must complete, before any commit is accepted.
    pub fn set_backend(&self, backend: Arc<B>) {
        *self.state.backend.write() = Some(backend);
    }

    /// Recovers the global monotonic id allocator from the backend's
    /// system row. Must be called exactly once, after `set_backend`,
    /// before `start`.
    pub fn init(&self) -> Result<(), StorageError> {
        let backend = self.state.backend.read().clone();
        if let Some(backend) = backend {
            self.state.id_alloc.recover(backend.as_ref()).map_err(backend_err)?;
        }
        Ok(())
    }

    /// Starts the flusher and, if caching is enabled, the evictor.
    /// Idempotent only in the sense that calling it twice spawns a second
    /// pair of workers — callers are expected to call it exactly once.
    pub fn start(&self) {
        self.state.running.store(true, Ordering::SeqCst);
        let (tx, rx) = crossbeam_channel::unbounded();
        *self.state.flush_tx.lock() = Some(tx);
        let flusher_weak = Arc::downgrade(&self.state);
        let flusher = flusher::spawn(flusher_weak, rx);
        *self.flusher_handle.lock() = Some(flusher);

        if !self.state.cache_disabled() {
            let evictor_weak = Arc::downgrade(&self.state);
            let interval = self.state.config.evictor_interval;
            let max_pop = self.state.config.max_pop_mru;
            let evictor_thread = evictor::spawn(evictor_weak, interval, max_pop);
            *self.evictor_handle.lock() = Some(evictor_thread);
        }
    }

    /// Orderly, idempotent shutdown: signals `running = false`, closes the
    /// flusher's queue so it drains whatever is already enqueued and then
    /// exits, and joins both worker threads (unless called from the
    /// evictor thread itself, in which case it detaches rather than
    /// deadlocking by joining itself).
    pub fn stop(&self) {
        self.state.running.store(false, Ordering::SeqCst);
        self.state.flush_tx.lock().take(); // drop the sender: closes the channel
        if let Some(handle) = self.flusher_handle.lock().take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
        if let Some(handle) = self.evictor_handle.lock().take() {
            if handle.thread().id() != std::thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    pub fn set_max_capacity(&self, bytes: u64) {
        self.state.max_capacity.store(bytes, Ordering::SeqCst);
    }

    pub fn set_max_forward_block(&self, blocks: u64) {
        self.state.max_forward_block.store(blocks, Ordering::SeqCst);
    }

    /// Highest block number the flusher has durably written.
    pub fn sync_num(&self) -> u64 {
        self.state.sync_num.load(Ordering::SeqCst)
    }

    /// Highest block number accepted by the commit pipeline.
    pub fn commit_num(&self) -> u64 {
        self.state.commit_num.load(Ordering::SeqCst)
    }

    /// Current value of the global monotonic id allocator.
    pub fn id(&self) -> u64 {
        self.state.id_alloc.current()
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    /// Current resident cache footprint, in bytes (subject to transient
    /// overshoot between MRU touches and the evictor draining them).
    pub fn capacity(&self) -> u64 {
        self.state.capacity.get()
    }

    pub fn counters(&self) -> &Counters {
        &self.state.counters
    }

    /// Read path. `condition` further filters the row-group's entries;
    /// pass `Condition::new()` (the trivially-true predicate) to fetch
    /// everything.
    pub fn select(
        &self,
        block_hash: &[u8],
        block_num: u64,
        table: &Arc<TableInfo>,
        key: &str,
        condition: &Condition,
    ) -> Result<Entries, StorageError> {
        let _span = tracing::debug_span!("cached_storage::select", table = %table.name, key).entered();
        let _ = block_hash;
        let _ = block_num;
        let slot_key = SlotKey::new(table.name.clone(), key);
        let (slot, created) = self.state.index.get_or_insert(slot_key, table);
        let was_empty_before = created || slot.read().empty;
        self.state.ensure_filled(&slot, table, key)?;
        if was_empty_before {
            self.state.counters.record_miss();
            self.state.metrics.on_cache_miss();
        } else {
            self.state.counters.record_hit();
            self.state.metrics.on_cache_hit();
        }
        let guard = slot.read();
        Ok(guard.entries.iter().filter(|e| condition.matches(e)).cloned().collect())
    }

    /// Commit pipeline. Returns the total number of dirty + new entries
    /// processed across all tables (not counting the synthesized system
    /// row).
    pub fn commit(
        &self,
        block_hash: &[u8],
        block_num: u64,
        table_datas: Vec<CommitTableData>,
    ) -> Result<usize, StorageError> {
        let _span = tracing::info_span!("cached_storage::commit", block_num).entered();
        if !self.state.running.load(Ordering::SeqCst) {
            return Err(StorageError::StorageDead);
        }

        let backend = self.state.backend.read().clone();
        let processed: usize = table_datas.iter().map(|t| t.dirty.len() + t.new_entries.len()).sum();

        // Phase A: parallel prepare.
        let only_dirty = backend.as_ref().map_or(true, |b| b.only_dirty());
        let mut payloads: Vec<(Arc<TableInfo>, Vec<Entry>)> = table_datas
            .par_iter()
            .map(|td| -> Result<_, StorageError> {
                let payload = self.prepare_table(&td.info, &td.dirty, only_dirty)?;
                Ok((td.info.clone(), payload))
            })
            .collect::<Result<Vec<_>, _>>()?;

        // Phase B: serial publish, in block order.
        for (table_data, (_, payload)) in table_datas.iter().zip(payloads.iter_mut()) {
            for new_entry in &table_data.new_entries {
                if new_entry.id != 0 {
                    fatal("new entry submitted to commit with non-zero id");
                }
                let mut entry = new_entry.clone();
                entry.id = self.state.id_alloc.next();
                entry.num = block_num;
                let key = entry
                    .get(table_data.info.key_field.as_str())
                    .unwrap_or_else(|| fatal("new entry missing its table's key field"))
                    .to_string();
                let slot_key = SlotKey::new(table_data.info.name.clone(), key.clone());
                let (slot, _created) = self.state.index.get_or_insert(slot_key, &table_data.info);
                if entry.force {
                    let mut guard = slot.write();
                    guard.entries.push(entry.clone());
                    guard.num = guard.num.max(block_num);
                    guard.empty = false;
                    #[cfg(debug_assertions)]
                    guard.check_invariants();
                    drop(guard);
                } else {
                    self.state.ensure_filled(&slot, &table_data.info, &key)?;
                    let mut guard = slot.write();
                    guard.entries.push(entry.clone());
                    guard.num = guard.num.max(block_num);
                    #[cfg(debug_assertions)]
                    guard.check_invariants();
                    drop(guard);
                }
                // Same index-reachability hazard as in `ensure_filled`: the
                // evictor can erase this slot between any two lock
                // acquisitions on it, so every caller that just wrote new
                // data into a slot re-asserts its place in the index.
                if let Err(other) = self.state.index.restore(slot.clone()) {
                    let _ = other;
                    fatal(format!("slot identity mismatch restoring cache for {}", slot.key.table));
                }
                if !self.state.cache_disabled() {
                    self.state.mru_queue.push(MruTouch {
                        key: slot.key.clone(),
                        delta: entry.capacity() as i64,
                    });
                }
                payload.push(entry);
            }
            sort_payload(payload, &table_data.info);
        }

        let mut table_payloads: Vec<TableData> = payloads
            .into_iter()
            .map(|(info, entries)| TableData { info: (*info).clone(), entries })
            .collect();

        // Synthesize the system row carrying the freshly allocated id. This
        // write bypasses the cache entirely: it is bookkeeping for
        // recovery, not application data.
        let sys_entry = sys::current_id_entry(self.state.id_alloc.current());
        match table_payloads.iter_mut().find(|t| t.info.name.as_ref() == sys::SYS_TABLE_NAME) {
            Some(t) => t.entries.push(sys_entry),
            None => table_payloads.push(TableData {
                info: sys::sys_table_info(),
                entries: vec![sys_entry],
            }),
        }

        self.state.commit_num.fetch_max(block_num, Ordering::SeqCst);

        if self.state.cache_disabled() {
            let Some(backend) = backend else {
                return Ok(processed);
            };
            match backend.commit(block_hash, block_num, &table_payloads) {
                Ok(()) => {
                    self.state.sync_num.store(block_num, Ordering::SeqCst);
                    self.state.index.clear();
                    Ok(processed)
                }
                Err(e) => {
                    tracing::error!(error = %e, "synchronous commit failed; engine is no longer running");
                    self.state.running.store(false, Ordering::SeqCst);
                    Err(StorageError::StorageDead)
                }
            }
        } else {
            let tx = self.state.flush_tx.lock().clone();
            if let Some(tx) = tx {
                let _ = tx.send(FlushTask {
                    block_hash: block_hash.to_vec(),
                    block_num,
                    payload: table_payloads,
                });
            }
            self.backpressure_wait(block_num);
            Ok(processed)
        }
    }

    fn prepare_table(
        &self,
        table_info: &Arc<TableInfo>,
        dirty: &[Entry],
        only_dirty: bool,
    ) -> Result<Vec<Entry>, StorageError> {
        let seen_full: Mutex<std::collections::HashSet<String>> = Mutex::new(Default::default());
        let results: Vec<Vec<Entry>> = dirty
            .par_iter()
            .map(|dirty_entry| -> Result<Vec<Entry>, StorageError> {
                if dirty_entry.id == 0 {
                    fatal("dirty entry submitted to commit with id = 0");
                }
                let key = dirty_entry
                    .get(table_info.key_field.as_str())
                    .unwrap_or_else(|| fatal("dirty entry missing its table's key field"))
                    .to_string();
                let slot_key = SlotKey::new(table_info.name.clone(), key.clone());
                let (slot, _created) = self.state.index.get_or_insert(slot_key, table_info);
                self.state.ensure_filled(&slot, table_info, &key)?;

                let mut guard = slot.write();
                let idx = match guard.entries.binary_search_by_key(&dirty_entry.id, |e| e.id) {
                    Ok(idx) => idx,
                    Err(_) => fatal(format!(
                        "dirty entry id {} not found in cache for {}/{key}",
                        dirty_entry.id, table_info.name
                    )),
                };
                let old_cap = guard.entries[idx].capacity();
                guard.entries[idx].overwrite_from(dirty_entry);
                guard.entries[idx].num = dirty_entry.num.max(guard.entries[idx].num);
                let new_cap = guard.entries[idx].capacity();
                guard.num = guard.num.max(guard.entries[idx].num);
                let updated = guard.entries[idx].clone();

                let mut extra = Vec::new();
                if !only_dirty {
                    let mut seen = seen_full.lock();
                    if seen.insert(key.clone()) {
                        extra = guard
                            .entries
                            .iter()
                            .enumerate()
                            .filter(|(i, _)| *i != idx)
                            .map(|(_, e)| e.clone())
                            .collect();
                    }
                }
                #[cfg(debug_assertions)]
                guard.check_invariants();
                drop(guard);

                if let Err(other) = self.state.index.restore(slot.clone()) {
                    let _ = other;
                    fatal(format!("slot identity mismatch restoring cache for {}/{key}", table_info.name));
                }

                if !self.state.cache_disabled() {
                    self.state.mru_queue.push(MruTouch {
                        key: slot.key.clone(),
                        delta: new_cap as i64 - old_cap as i64,
                    });
                }

                let mut out = vec![updated];
                out.extend(extra);
                Ok(out)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let mut payload: Vec<Entry> = results.into_iter().flatten().collect();
        sort_payload(&mut payload, table_info);
        Ok(payload)
    }

    /// Blocks the calling (producer) thread while `commitNum - syncNum`
    /// exceeds `maxForwardBlock`: a short run of thread-yields, then an
    /// escalating sleep capped at `backpressure_max_sleep`.
    fn backpressure_wait(&self, _just_committed: u64) {
        let max_forward = self.state.max_forward_block.load(Ordering::SeqCst);
        let mut spins = 0u32;
        let mut sleep = self.state.config.backpressure_initial_sleep;
        loop {
            if !self.state.running.load(Ordering::SeqCst) {
                return;
            }
            let commit_num = self.state.commit_num.load(Ordering::SeqCst);
            let sync_num = self.state.sync_num.load(Ordering::SeqCst);
            if commit_num.saturating_sub(sync_num) <= max_forward {
                return;
            }
            self.state.counters.record_backpressure_stall();
            self.state.metrics.on_backpressure_stall();
            if spins < self.state.config.backpressure_spins {
                spins += 1;
                std::thread::yield_now();
            } else {
                std::thread::sleep(sleep);
                sleep = (sleep * 2).min(self.state.config.backpressure_max_sleep);
            }
        }
    }
}

impl<B: BackendStorage> Drop for Engine<B> {
    fn drop(&mut self) {
        // Only the handle that owns the worker threads (the one `start`
        // was called on) does anything here; clones hold no handles.
        if self.flusher_handle.lock().is_some() || self.evictor_handle.lock().is_some() {
            self.stop();
        }
    }
}

fn sort_payload(payload: &mut [Entry], table_info: &TableInfo) {
    payload.sort_by(|a, b| {
        let ka = a.get(table_info.key_field.as_str()).unwrap_or_default();
        let kb = b.get(table_info.key_field.as_str()).unwrap_or_default();
        (ka, a.id).cmp(&(kb, b.id))
    });
}
