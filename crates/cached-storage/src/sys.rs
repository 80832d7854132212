//! System row format: a reserved table that carries the engine's own
//! bookkeeping rows through the same write-through path as ordinary
//! application rows, so the monotonic id allocator recovers for free from
//! whatever durability guarantee the backend already gives ordinary
//! commits.

use crate::entry::{Entry, FieldName, TableInfo};

pub const SYS_TABLE_NAME: &str = "_sys_current_state_";
pub const SYS_KEY_FIELD: &str = "_sys_key_";
pub const SYS_VALUE_FIELD: &str = "value";
pub const SYS_KEY_CURRENT_ID: &str = "current_id";

pub fn sys_table_info() -> TableInfo {
    TableInfo::new(
        SYS_TABLE_NAME,
        SYS_KEY_FIELD,
        vec![FieldName::new(SYS_KEY_FIELD), FieldName::new(SYS_VALUE_FIELD)],
    )
}

/// Builds the system entry that persists the current value of the global
/// monotonic id allocator, appended as an extra dirty entry to every commit
/// payload that allocates at least one new id.
pub fn current_id_entry(global_id: u64) -> Entry {
    let mut e = Entry::new(vec![
        (FieldName::new(SYS_KEY_FIELD), SYS_KEY_CURRENT_ID.to_string()),
        (FieldName::new(SYS_VALUE_FIELD), global_id.to_string()),
    ]);
    e.force = true;
    e
}
