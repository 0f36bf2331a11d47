use std::{
    io::Write,
    marker::PhantomData,
    ops::ControlFlow,
    path::{Path, PathBuf},
};

use tracing::{debug, error, warn};

use crate::{
    engine::{Row, SqlEngine},
    errors::{EngineError, FlashSqlError},
    mount::{FileSlot, MountedPartition},
};

/// An open database file on a mounted partition.
///
/// The engine handle is closed exactly once: either by [`Database::close`] or,
/// on any early exit, when the value is dropped. The open-file slot leased
/// from the partition is held for the same lifetime.
///
/// The guard borrows the partition it lives on, so the partition cannot be
/// unmounted while a database under it is still open:
///
/// ```compile_fail
/// use std::path::Path;
/// use flashsql::{Database, MountConfig, PartitionTable, SqliteEngine};
///
/// let table = PartitionTable::new("/tmp/flashsql-parts");
/// let partition = table.mount(&MountConfig::default()).unwrap();
/// let engine = SqliteEngine::new();
/// let db = Database::open(&engine, &partition, Path::new("/spiffs/a.db"), &mut Vec::new())
///     .unwrap();
/// partition.unmount();
/// db.close().unwrap();
/// ```
pub struct Database<'p, 'e, E: SqlEngine> {
    engine: &'e E,
    handle: Option<E::Handle>,
    path: PathBuf,
    _slot: FileSlot,
    _partition: PhantomData<&'p MountedPartition>,
}

impl<'p, 'e, E: SqlEngine> Database<'p, 'e, E> {
    /// Opens `path`, which must lie under the partition's mount root, and
    /// writes the open status line to `out`.
    pub fn open<W: Write>(
        engine: &'e E,
        partition: &'p MountedPartition,
        path: &Path,
        out: &mut W,
    ) -> Result<Self, FlashSqlError> {
        let host_path = partition.resolve(path)?;
        let slot = partition.acquire_file()?;
        match engine.open(&host_path) {
            Ok(handle) => {
                writeln!(out, "Opened database successfully")?;
                debug!(path = %path.display(), host = %host_path.display(), "database opened");
                Ok(Self {
                    engine,
                    handle: Some(handle),
                    path: path.to_path_buf(),
                    _slot: slot,
                    _partition: PhantomData,
                })
            }
            Err(err) => {
                writeln!(out, "Can't open database: {}", err.message)?;
                error!(path = %path.display(), code = err.code, "open failed");
                Err(FlashSqlError::open(path.display().to_string(), err))
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn exec_raw(
        &mut self,
        sql: &str,
        on_row: &mut dyn FnMut(Row<'_>) -> ControlFlow<()>,
    ) -> Result<(), EngineError> {
        match self.handle.as_mut() {
            Some(handle) => self.engine.exec(handle, sql, on_row),
            None => Err(EngineError::new(
                crate::engine::codes::ERROR,
                "database is closed",
            )),
        }
    }

    pub fn close(mut self) -> Result<(), FlashSqlError> {
        self.close_inner()
            .map_err(|err| FlashSqlError::close(self.path.display().to_string(), err))
    }

    fn close_inner(&mut self) -> Result<(), EngineError> {
        match self.handle.take() {
            Some(handle) => {
                let result = self.engine.close(handle);
                debug!(path = %self.path.display(), ok = result.is_ok(), "database closed");
                result
            }
            None => Ok(()),
        }
    }
}

impl<E: SqlEngine> Drop for Database<'_, '_, E> {
    fn drop(&mut self) {
        if let Err(err) = self.close_inner() {
            warn!(path = %self.path.display(), %err, "close during cleanup failed");
        }
    }
}
