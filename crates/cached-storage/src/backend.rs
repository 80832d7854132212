use std::error::Error as StdError;

use crate::entry::{Condition, Entries, TableInfo};

/// The durable key-value backend this engine writes through to.
///
/// Implementations must be linearizable for the sequence of commits the
/// engine accepts: the engine never retries a commit or reorders it
/// relative to others.
pub trait BackendStorage: Send + Sync + 'static {
    type Error: StdError + Send + Sync + 'static;

    /// Deterministic point read of every backend-resident version of
    /// `(table, key)` matching `condition`.
    fn select(
        &self,
        block_hash: &[u8],
        block_num: u64,
        table: &TableInfo,
        key: &str,
        condition: &Condition,
    ) -> Result<Entries, Self::Error>;

    /// Durably write `payload`. Either fully succeeds or returns an error;
    /// there is no partial-success outcome.
    fn commit(&self, block_hash: &[u8], block_num: u64, payload: &[TableData]) -> Result<(), Self::Error>;

    /// If `false`, [`BackendStorage::commit`] payloads for any touched key
    /// must include the full pre-commit row-group, not just the dirty
    /// entries.
    fn only_dirty(&self) -> bool {
        true
    }
}

/// One table's worth of entries bound for [`BackendStorage::commit`].
#[derive(Debug, Clone)]
pub struct TableData {
    pub info: TableInfo,
    pub entries: Entries,
}
