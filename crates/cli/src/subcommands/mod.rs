pub mod build;
pub mod call;
pub mod delete;
pub mod describe;
pub mod energy;
pub mod generate;
pub mod identity;
pub mod init;
pub mod list;
pub mod local;
pub mod logs;
pub mod publish;
pub mod repl;
pub mod server;
pub mod sql;
pub mod subscribe;
pub mod upgrade;
pub mod version;
