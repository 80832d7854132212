pub mod expr;
pub mod join;
pub mod table;

pub use expr::*;
pub use join::*;
pub use table::*;

pub struct Query {
    pub(crate) sql: String,
}

impl Query {
    pub fn sql(&self) -> &str {
        &self.sql
    }
}
