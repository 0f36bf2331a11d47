#![allow(dead_code)]

use std::{
    cell::RefCell,
    ops::ControlFlow,
    path::{Path, PathBuf},
};

use flashsql::{
    EngineError, Row, RowVisitor, SqlEngine,
    engine::codes,
    mount::PartitionTable,
};
use tempfile::TempDir;

/// Engine double that records every open, statement and close.
#[derive(Default)]
pub struct FakeEngine {
    pub fail_open_on: Option<String>,
    pub fail_exec_on: Option<String>,
    /// Rows produced by every `SELECT`.
    pub select_rows: Vec<Vec<(String, Option<String>)>>,
    log: RefCell<FakeLog>,
}

#[derive(Default, Debug, Clone)]
pub struct FakeLog {
    pub opened: Vec<usize>,
    pub closed: Vec<usize>,
    pub statements: Vec<String>,
}

pub struct FakeHandle {
    id: usize,
    path: PathBuf,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_exec(pattern: &str) -> Self {
        Self {
            fail_exec_on: Some(pattern.to_string()),
            ..Self::default()
        }
    }

    pub fn failing_open(pattern: &str) -> Self {
        Self {
            fail_open_on: Some(pattern.to_string()),
            ..Self::default()
        }
    }

    pub fn log(&self) -> FakeLog {
        self.log.borrow().clone()
    }
}

impl SqlEngine for FakeEngine {
    type Handle = FakeHandle;

    fn open(&self, path: &Path) -> Result<FakeHandle, EngineError> {
        if let Some(pattern) = &self.fail_open_on {
            if path.to_string_lossy().contains(pattern.as_str()) {
                return Err(EngineError::new(codes::CANTOPEN, "unable to open database file"));
            }
        }
        let mut log = self.log.borrow_mut();
        let id = log.opened.len() + 1;
        log.opened.push(id);
        Ok(FakeHandle {
            id,
            path: path.to_path_buf(),
        })
    }

    fn exec(
        &self,
        handle: &mut FakeHandle,
        sql: &str,
        on_row: &mut dyn FnMut(Row<'_>) -> ControlFlow<()>,
    ) -> Result<(), EngineError> {
        assert!(
            !self.log.borrow().closed.contains(&handle.id),
            "statement on closed handle {}",
            handle.path.display()
        );
        self.log.borrow_mut().statements.push(sql.to_string());
        if let Some(pattern) = &self.fail_exec_on {
            if sql.contains(pattern.as_str()) {
                return Err(EngineError::new(codes::ERROR, "forced failure"));
            }
        }
        if sql.starts_with("SELECT") {
            for row in &self.select_rows {
                let names: Vec<String> = row.iter().map(|(name, _)| name.clone()).collect();
                let values: Vec<Option<String>> = row.iter().map(|(_, v)| v.clone()).collect();
                if on_row(Row::new(&names, &values)).is_break() {
                    return Err(EngineError::new(codes::ABORT, "query aborted"));
                }
            }
        }
        Ok(())
    }

    fn close(&self, handle: FakeHandle) -> Result<(), EngineError> {
        self.log.borrow_mut().closed.push(handle.id);
        Ok(())
    }
}

/// Visitor that keeps every reported row as (label, columns).
#[derive(Default)]
pub struct RecordingVisitor {
    pub rows: Vec<(String, Vec<(String, Option<String>)>)>,
}

impl RowVisitor for RecordingVisitor {
    fn visit(&mut self, label: &str, row: Row<'_>) -> ControlFlow<()> {
        let columns = row
            .columns()
            .map(|(name, value)| (name.to_string(), value.map(str::to_string)))
            .collect();
        self.rows.push((label.to_string(), columns));
        ControlFlow::Continue(())
    }
}

/// Temp partition table holding one empty partition named `storage`.
pub fn partition_table() -> (TempDir, PartitionTable) {
    let dir = tempfile::tempdir().expect("tempdir");
    let table = PartitionTable::new(dir.path());
    table.create_partition("storage").expect("partition");
    (dir, table)
}

pub fn columns(pairs: &[(&str, Option<&str>)]) -> Vec<(String, Option<String>)> {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.map(str::to_string)))
        .collect()
}
