use std::sync::Arc;

/// Name of a table field. Interned behind an `Arc<str>` so cloning never
/// pays a `String` allocation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldName(Arc<str>);

impl FieldName {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FieldName {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Row status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Normal,
    Deleted,
}

/// One row version.
///
/// An `Entry` is logically immutable once its `id != 0` and a commit has
/// accepted it — fields may still be mutated by the owning writer before
/// that commit completes. The core never publishes a shared mutable alias
/// of a slot's entries: every value handed back across an API boundary (to
/// a reader, or into a commit payload) is produced by [`Entry::clone`],
/// which performs a full deep copy because `fields` owns its `String`s
/// rather than sharing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Field name/value pairs, in table-column order. Kept as a flat vector
    /// rather than a map: real row-groups rarely exceed a handful of
    /// columns, and a linear scan beats a hash lookup at that size while
    /// avoiding a hasher per entry.
    fields: Vec<(FieldName, String)>,
    /// Monotonic record id. `0` means "not yet persisted".
    pub id: u64,
    /// Block number at which this version was committed.
    pub num: u64,
    pub status: Status,
    /// If set, the backend must keep this row even if the cache believes it
    /// to be logically empty.
    pub force: bool,
}

impl Entry {
    pub fn new(fields: Vec<(FieldName, String)>) -> Self {
        Self {
            fields,
            id: 0,
            num: 0,
            status: Status::Normal,
            force: false,
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name.as_str() == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn set(&mut self, field: impl Into<FieldName>, value: impl Into<String>) {
        let field = field.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| *name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field, value)),
        }
    }

    pub fn fields(&self) -> &[(FieldName, String)] {
        &self.fields
    }

    /// Sum of key+value byte lengths, used as the unit the capacity
    /// accountant tracks.
    pub fn capacity(&self) -> u64 {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str().len() + value.len()) as u64)
            .sum()
    }

    /// Overwrite this entry's fields and status from `incoming`, keeping its
    /// own `id`. Used by Phase A of the commit pipeline to apply a dirty
    /// entry onto the cached copy in place.
    pub fn overwrite_from(&mut self, incoming: &Entry) {
        self.fields = incoming.fields.clone();
        self.status = incoming.status;
        self.force = incoming.force;
    }
}

/// An ordered sequence of [`Entry`], sorted ascending by `id` for any slot
/// that has been read from the backend. Duplicate ids are forbidden.
pub type Entries = Vec<Entry>;

/// Constant descriptor for a table.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub name: Arc<str>,
    pub key_field: FieldName,
    pub fields: Vec<FieldName>,
}

impl TableInfo {
    pub fn new(name: impl Into<Arc<str>>, key_field: impl Into<FieldName>, fields: Vec<FieldName>) -> Self {
        Self {
            name: name.into(),
            key_field: key_field.into(),
            fields,
        }
    }
}

/// Comparison operator for one leg of a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

/// One conjunctive clause: `field <op> value`, compared as a string —
/// fields are opaque strings, not typed columns.
#[derive(Debug, Clone)]
pub struct Clause {
    pub field: FieldName,
    pub op: CompareOp,
    pub value: String,
}

/// A conjunctive predicate over field values, used for filtering on read
/// and for targeting on update/remove.
#[derive(Debug, Clone, Default)]
pub struct Condition {
    clauses: Vec<Clause>,
}

impl Condition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(mut self, field: impl Into<FieldName>, op: CompareOp, value: impl Into<String>) -> Self {
        self.clauses.push(Clause {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    pub fn eq(field: impl Into<FieldName>, value: impl Into<String>) -> Self {
        Self::new().push(field, CompareOp::Eq, value)
    }

    /// `true` when `entry` satisfies every clause. An entry lacking one of
    /// the referenced fields never matches.
    pub fn matches(&self, entry: &Entry) -> bool {
        self.clauses.iter().all(|clause| {
            let Some(actual) = entry.get(clause.field.as_str()) else {
                return false;
            };
            match clause.op {
                CompareOp::Eq => actual == clause.value,
                CompareOp::Ne => actual != clause.value,
                CompareOp::Gt => actual > clause.value.as_str(),
                CompareOp::Ge => actual >= clause.value.as_str(),
                CompareOp::Lt => actual < clause.value.as_str(),
                CompareOp::Le => actual <= clause.value.as_str(),
            }
        })
    }
}
