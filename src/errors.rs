use std::{io, path::PathBuf};

use thiserror::Error;

use crate::sequencer::Stage;

/// Failures surfaced by the flash partition collaborator.
#[derive(Debug, Error)]
pub enum MountError {
    #[error("failed to mount or format partition: {0}")]
    Failed(String),
    #[error("partition not found: {0}")]
    PartitionNotFound(String),
    #[error("failed to initialize partition: {0}")]
    Init(String),
    #[error("path {0} is outside the mount root")]
    OutsideMount(PathBuf),
    #[error("too many open files (limit {0})")]
    TooManyOpenFiles(usize),
    #[error("partition io error: {0}")]
    Io(#[from] io::Error),
}

impl MountError {
    pub fn failed<T: Into<String>>(msg: T) -> Self {
        MountError::Failed(msg.into())
    }

    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        MountError::PartitionNotFound(msg.into())
    }

    pub fn init<T: Into<String>>(msg: T) -> Self {
        MountError::Init(msg.into())
    }
}

/// Status code plus message reported by the SQL engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} (code {code})")]
pub struct EngineError {
    pub code: i32,
    pub message: String,
}

impl EngineError {
    pub fn new<T: Into<String>>(code: i32, message: T) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        let code = match &err {
            rusqlite::Error::SqliteFailure(inner, _) => inner.extended_code & 0xff,
            _ => rusqlite::ffi::SQLITE_ERROR,
        };
        let message = match &err {
            rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.clone(),
            other => other.to_string(),
        };
        EngineError { code, message }
    }
}

#[derive(Debug, Error)]
pub enum FlashSqlError {
    #[error("mount error: {0}")]
    Mount(#[from] MountError),
    #[error("can't open database {path}: {source}")]
    Open { path: String, source: EngineError },
    #[error("statement `{sql}` failed: {source}")]
    Statement { sql: String, source: EngineError },
    #[error("can't close database {path}: {source}")]
    Close { path: String, source: EngineError },
    #[error("configuration error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl FlashSqlError {
    pub fn config<T: Into<String>>(msg: T) -> Self {
        FlashSqlError::Config(msg.into())
    }

    pub fn open<T: Into<String>>(path: T, source: EngineError) -> Self {
        FlashSqlError::Open {
            path: path.into(),
            source,
        }
    }

    pub fn statement<T: Into<String>>(sql: T, source: EngineError) -> Self {
        FlashSqlError::Statement {
            sql: sql.into(),
            source,
        }
    }

    pub fn close<T: Into<String>>(path: T, source: EngineError) -> Self {
        FlashSqlError::Close {
            path: path.into(),
            source,
        }
    }

    /// Engine status code, when the failure came from the SQL engine.
    pub fn engine_code(&self) -> Option<i32> {
        match self {
            FlashSqlError::Open { source, .. }
            | FlashSqlError::Statement { source, .. }
            | FlashSqlError::Close { source, .. } => Some(source.code),
            _ => None,
        }
    }
}

/// A run that stopped before reaching its final stage.
#[derive(Debug, Error)]
#[error("run aborted after {stage}: {source}")]
pub struct RunError {
    /// Last stage that completed before the failure.
    pub stage: Stage,
    #[source]
    pub source: FlashSqlError,
}
