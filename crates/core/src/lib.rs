extern crate core;

pub mod energy;
pub mod json;
pub mod sql;

pub mod auth;
pub mod db;
pub mod messages;
pub use spacetimedb_lib::Identity;
pub mod error;
pub use spacetimedb_lib::identity;
pub use spacetimedb_sats::hash;
pub mod callgrind_flag;
pub mod client;
pub mod config;
pub mod database_logger;
pub mod estimation;
pub mod execution_context;
pub mod host;
pub mod module_host_context;
pub mod replica_context;
pub mod startup;
pub mod subscription;
pub mod util;
pub mod vm;
pub mod worker_metrics;
