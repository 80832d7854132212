//! # System Catalog
//!
//! The system catalog tracks the metadata for the database engine, such as information about tables, sequences, indexes, and internal bookkeeping information.
//!
//! System catalogs are regular tables. You can drop and recreate the tables, add columns, insert and update values, and **severely mess up your system that way**
//!
//! ## Internal structure
//!
//! The current design is being described at [Notion](https://www.notion.so/clockworklabs/0010-System-Catalog-669518af2e874f8da441bccf6e60ddab).
//!
use crate::db::index::IndexCatalog;

use crate::db::sequence::SequenceCatalog;
use crate::db::table::TableCatalog;
use crate::error::DBError;

pub const ST_SEQUENCE_SEQ: &str = "st_seq_sequences";
pub const ST_TABLE_SEQ: &str = "st_seq_tables";
pub const ST_INDEX_SEQ: &str = "st_index_sequences";

/// Fixed ID for internal sequence generator for [Sequence]
pub const ST_SEQUENCE_ID: i64 = 0;
/// Fixed ID for internal sequence generator for [spacetimedb_lib::type_def::TableDef]
pub const ST_TABLE_ID: i64 = 1;
/// Fixed ID for internal sequence generator for [crate::db::index::IndexDef]
pub const ST_INDEX_ID: i64 = 2;

#[derive(Debug, Clone, Copy)]
pub enum CatalogKind {
    Table,
    Column,
    Index,
    Sequence,
}

/// Manage the database metadata.
pub struct Catalog {
    pub(crate) sequences: SequenceCatalog,
    pub(crate) tables: TableCatalog,
    pub(crate) indexes: IndexCatalog,
}

impl Catalog {
    pub fn new() -> Result<Self, DBError> {
        Ok(Self {
            sequences: SequenceCatalog::new()?,
            tables: TableCatalog::new(),
            indexes: IndexCatalog::new(0),
        })
    }
}
