use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::BackendStorage;
use crate::entry::Condition;
use crate::sys;

/// Process-global monotonic record identifier allocator.
///
/// Advanced only inside the serial portion of the commit pipeline (Phase
/// B), so a plain `AtomicU64` with `Relaxed` ordering is sufficient: there
/// is never more than one writer, and every reader that cares about
/// ordering already holds the serializing lock the writer holds.
#[derive(Default)]
pub struct GlobalIdAllocator {
    value: AtomicU64,
}

impl GlobalIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores the allocator from the backend's system row on startup.
    /// Must complete before any commit is accepted.
    pub fn recover<B: BackendStorage>(&self, backend: &B) -> Result<(), B::Error> {
        let table = sys::sys_table_info();
        let cond = Condition::eq(sys::SYS_KEY_FIELD, sys::SYS_KEY_CURRENT_ID);
        let entries = backend.select(&[], 0, &table, sys::SYS_KEY_CURRENT_ID, &cond)?;
        let recovered = entries
            .iter()
            .filter_map(|e| e.get(sys::SYS_VALUE_FIELD))
            .filter_map(|v| v.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        self.value.store(recovered, Ordering::Relaxed);
        Ok(())
    }

    /// Allocates and returns the next id.
    pub fn next(&self) -> u64 {
        self.value.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn current(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}
