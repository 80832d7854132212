use std::sync::Arc;

use parking_lot::RwLock;

use crate::entry::{Entries, TableInfo};

/// Identifies a row-group: `(table name, key)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SlotKey {
    pub table: Arc<str>,
    pub key: Arc<str>,
}

impl SlotKey {
    pub fn new(table: impl Into<Arc<str>>, key: impl Into<Arc<str>>) -> Self {
        Self {
            table: table.into(),
            key: key.into(),
        }
    }
}

/// The mutable part of a [`CacheSlot`], guarded by the slot's own RW lock.
#[derive(Debug, Default)]
pub struct SlotInner {
    pub entries: Entries,
    /// Max `num` over `entries`, or `0` while `empty`.
    pub num: u64,
    /// `true` until the slot has been filled at least once, either from the
    /// backend or by a `force` new entry. While `true` the slot is a
    /// reservation under the cache-index lock with no data.
    pub empty: bool,
}

impl SlotInner {
    /// Sum of `entries`' capacities — what the capacity accountant charges
    /// this slot for while it is resident.
    pub fn capacity(&self) -> u64 {
        self.entries.iter().map(|e| e.capacity()).sum()
    }

    /// Invariant check: sorted by id, distinct non-zero ids, `num ==
    /// max(entry.num)`.
    #[cfg(debug_assertions)]
    pub fn check_invariants(&self) {
        if self.empty {
            return;
        }
        let mut prev: Option<u64> = None;
        let mut max_num = 0;
        for e in &self.entries {
            assert_ne!(e.id, 0, "cached entry with id = 0");
            if let Some(p) = prev {
                assert!(e.id > p, "cached entries not sorted / duplicate id");
            }
            prev = Some(e.id);
            max_num = max_num.max(e.num);
        }
        assert_eq!(self.num, max_num, "slot.num out of sync with entries");
    }
}

/// Row-group for one `(table, key)` pair: an ordered list of entry
/// versions plus its own RW lock and liveness flags.
///
/// `CacheSlot` knows its [`TableInfo`] (shared, immutable) and is owned by
/// the cache index; the MRU list references slots by [`SlotKey`], not by
/// pointer, so there is no ownership cycle between slot and index.
pub struct CacheSlot {
    pub key: SlotKey,
    pub table_info: Arc<TableInfo>,
    inner: RwLock<SlotInner>,
}

impl CacheSlot {
    pub fn new_empty(key: SlotKey, table_info: Arc<TableInfo>) -> Arc<Self> {
        Arc::new(Self {
            key,
            table_info,
            inner: RwLock::new(SlotInner {
                entries: Vec::new(),
                num: 0,
                empty: true,
            }),
        })
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, SlotInner> {
        self.inner.read()
    }

    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, SlotInner> {
        self.inner.write()
    }

    pub fn try_write(&self) -> Option<parking_lot::RwLockWriteGuard<'_, SlotInner>> {
        self.inner.try_write()
    }
}

impl std::fmt::Debug for CacheSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheSlot").field("key", &self.key).finish_non_exhaustive()
    }
}
