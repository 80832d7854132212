//! An in-memory [`BackendStorage`] test double. Not part of the production
//! public API — it exists so this crate's own unit tests, and downstream
//! integration tests, can exercise [`crate::Engine`] without a real
//! durable store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::backend::{BackendStorage, TableData};
use crate::entry::{Condition, Entries, TableInfo};
use crate::sys;

#[derive(Debug, thiserror::Error)]
pub enum MemBackendError {
    #[error("injected failure for testing")]
    Injected,
}

#[derive(Default)]
struct Table {
    rows: BTreeMap<String, Entries>,
}

/// A backend that keeps every committed row-group in memory, guarded by a
/// single mutex — there is no concurrency to speak of in a test double, so
/// unlike the engine itself this does not need per-row-group locking.
pub struct MemBackend {
    tables: Mutex<BTreeMap<String, Table>>,
    only_dirty: bool,
    fail_next_commit: std::sync::atomic::AtomicBool,
    last_commit_payload: Mutex<Option<Vec<TableData>>>,
}

impl Default for MemBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemBackend {
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(BTreeMap::new()),
            only_dirty: true,
            fail_next_commit: std::sync::atomic::AtomicBool::new(false),
            last_commit_payload: Mutex::new(None),
        }
    }

    pub fn with_only_dirty(only_dirty: bool) -> Self {
        Self {
            only_dirty,
            ..Self::new()
        }
    }

    /// Arranges for the next `commit` call to fail, simulating backend
    /// death.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn seed_current_id(&self, id: u64) {
        let mut tables = self.tables.lock().unwrap();
        let table = tables.entry(sys::SYS_TABLE_NAME.to_string()).or_default();
        table
            .rows
            .insert(sys::SYS_KEY_CURRENT_ID.to_string(), vec![sys::current_id_entry(id)]);
    }

    pub fn row_count(&self, table: &str, key: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .and_then(|t| t.rows.get(key))
            .map_or(0, |e| e.len())
    }

    /// The exact payload passed to the most recent successful `commit` call,
    /// for assertions on the invariant that a full row-group accompanies a
    /// dirty update whenever `only_dirty() == false`. `None` until the first
    /// commit.
    pub fn last_commit_payload(&self) -> Option<Vec<TableData>> {
        self.last_commit_payload.lock().unwrap().clone()
    }
}

impl BackendStorage for MemBackend {
    type Error = MemBackendError;

    fn select(
        &self,
        _block_hash: &[u8],
        _block_num: u64,
        table: &TableInfo,
        key: &str,
        condition: &Condition,
    ) -> Result<Entries, Self::Error> {
        let tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get(table.name.as_ref()).and_then(|t| t.rows.get(key)) else {
            return Ok(Vec::new());
        };
        Ok(rows.iter().filter(|e| condition.matches(e)).cloned().collect())
    }

    fn commit(&self, _block_hash: &[u8], _block_num: u64, payload: &[TableData]) -> Result<(), Self::Error> {
        if self.fail_next_commit.swap(false, std::sync::atomic::Ordering::SeqCst) {
            return Err(MemBackendError::Injected);
        }
        *self.last_commit_payload.lock().unwrap() = Some(payload.to_vec());
        let mut tables = self.tables.lock().unwrap();
        for table_data in payload {
            let table = tables.entry(table_data.info.name.to_string()).or_default();
            let key_field = table_data.info.key_field.as_str();
            let mut by_key: BTreeMap<String, Vec<crate::entry::Entry>> = BTreeMap::new();
            for entry in &table_data.entries {
                let Some(key) = entry.get(key_field) else { continue };
                by_key.entry(key.to_string()).or_default().push(entry.clone());
            }
            for (key, mut incoming) in by_key {
                let existing = table.rows.entry(key).or_default();
                for e in incoming.drain(..) {
                    match existing.iter_mut().find(|x| x.id == e.id) {
                        Some(slot) => *slot = e,
                        None => existing.push(e),
                    }
                }
                existing.sort_by_key(|e| e.id);
            }
        }
        Ok(())
    }

    fn only_dirty(&self) -> bool {
        self.only_dirty
    }
}
