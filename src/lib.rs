//! Flash-partition SQLite demo.
//!
//! Mounts an emulated flash partition, opens two SQLite databases on it, runs a
//! fixed create/insert/select script against each and tears everything down.
//! Run the executor benchmark with `cargo bench` to inspect reports under
//! `target/criterion`.

pub mod cli;
pub mod config;
pub mod database;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod mount;
pub mod report;
pub mod sequencer;
pub mod sql;

pub use crate::config::{DatabaseSpec, DemoConfig, DemoScript, MountConfig};
pub use crate::database::Database;
pub use crate::engine::{Row, SqlEngine, SqliteEngine};
pub use crate::errors::{EngineError, FlashSqlError, MountError, RunError};
pub use crate::exec::{ExecOutcome, execute};
pub use crate::mount::{MountedPartition, PartitionTable, Usage};
pub use crate::report::{ConsoleRowReporter, RowVisitor};
pub use crate::sequencer::{RunReport, Sequencer, Stage};
