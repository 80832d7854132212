use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entry::TableInfo;
use crate::slot::{CacheSlot, SlotKey};

/// Concurrent mapping from `(table, key)` to a shared [`CacheSlot`].
///
/// The map itself is guarded by a single process-wide RW lock, held only
/// for the map insert/erase — a very short critical section — since slots
/// own their own locks for everything else.
#[derive(Default)]
pub struct CacheIndex {
    slots: RwLock<HashMap<SlotKey, Arc<CacheSlot>>>,
}

impl CacheIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing slot for `key`, or creates and inserts a fresh
    /// empty one. The second element of the tuple is `true` iff this call
    /// created the slot.
    pub fn get_or_insert(&self, key: SlotKey, table_info: &Arc<TableInfo>) -> (Arc<CacheSlot>, bool) {
        if let Some(slot) = self.slots.read().get(&key) {
            return (slot.clone(), false);
        }
        let mut slots = self.slots.write();
        if let Some(slot) = slots.get(&key) {
            return (slot.clone(), false);
        }
        let slot = CacheSlot::new_empty(key.clone(), table_info.clone());
        slots.insert(key, slot.clone());
        (slot, true)
    }

    pub fn get(&self, key: &SlotKey) -> Option<Arc<CacheSlot>> {
        self.slots.read().get(key).cloned()
    }

    /// Removes `key` from the index iff the currently-indexed slot is
    /// `expected` (identity comparison via `Arc::ptr_eq`). Returns `false`
    /// if the key is absent or a different slot object now occupies it —
    /// the latter would mean a committer raced ahead of the evictor and
    /// replaced the slot with a fresh one under the same key. The caller
    /// that wins such a race by inserting a *new* slot object must have
    /// found the old one absent, or it's a fatal consistency violation
    /// (see `evictor::sweep`).
    pub fn erase_if(&self, key: &SlotKey, expected: &Arc<CacheSlot>) -> bool {
        let mut slots = self.slots.write();
        match slots.get(key) {
            Some(current) if Arc::ptr_eq(current, expected) => {
                slots.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Re-inserts `slot` under its own key if the key is currently absent,
    /// undoing a concurrent erase. A no-op (`Ok`) if the key already maps to
    /// this same slot object — the common case, where nothing erased it in
    /// the first place. Returns `Err(existing)` only when a *different*
    /// slot object now occupies the key: two live slot objects for one
    /// (table, key) pair is a split-brain that callers must treat as fatal.
    pub fn restore(&self, slot: Arc<CacheSlot>) -> Result<(), Arc<CacheSlot>> {
        let mut slots = self.slots.write();
        match slots.get(&slot.key) {
            Some(existing) if Arc::ptr_eq(existing, &slot) => Ok(()),
            Some(existing) => Err(existing.clone()),
            None => {
                slots.insert(slot.key.clone(), slot);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every slot. Used when the cache-disabled configuration clears
    /// the cache after a successful synchronous commit.
    pub fn clear(&self) {
        self.slots.write().clear();
    }
}
