//! Fixed demo script: mount, open two databases, create, insert, select, close,
//! unmount. The first failure ends the run; cleanup still closes every open
//! database exactly once and unmounts the partition.

use std::{fmt, io::Write};

use tracing::{error, info, warn};

use crate::{
    config::{DatabaseSpec, DemoConfig},
    database::Database,
    engine::SqlEngine,
    errors::{FlashSqlError, MountError, RunError},
    exec::execute,
    mount::{MountedPartition, PartitionTable, Usage},
    report::RowVisitor,
    sql,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Unmounted,
    Mounted,
    FirstOpen,
    SecondOpen,
    TablesCreated,
    RowsInserted,
    RowsSelected,
    HandlesClosed,
    Finished,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Unmounted => "unmounted",
            Stage::Mounted => "mounted",
            Stage::FirstOpen => "first database open",
            Stage::SecondOpen => "second database open",
            Stage::TablesCreated => "tables created",
            Stage::RowsInserted => "rows inserted",
            Stage::RowsSelected => "rows selected",
            Stage::HandlesClosed => "databases closed",
            Stage::Finished => "finished",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub stage: Stage,
    pub statements: usize,
    pub rows_reported: usize,
    /// `None` when the usage query failed.
    pub usage: Option<Usage>,
}

/// Progress and counters a run carries between steps.
struct RunContext {
    stage: Stage,
    statements: usize,
    rows_reported: usize,
    usage: Option<Usage>,
}

impl RunContext {
    fn new() -> Self {
        Self {
            stage: Stage::Unmounted,
            statements: 0,
            rows_reported: 0,
            usage: None,
        }
    }

    /// A failed usage query is logged and the run goes on without it.
    fn record_usage(&mut self, usage: Result<Usage, MountError>) {
        match usage {
            Ok(usage) => {
                info!(
                    "Partition size: total: {}, used: {}",
                    usage.total_bytes, usage.used_bytes
                );
                self.usage = Some(usage);
            }
            Err(err) => error!("Failed to get partition information ({err})"),
        }
    }

    fn abort(&self, source: FlashSqlError) -> RunError {
        let stage = self.stage;
        error!(%stage, %source, "run aborted");
        RunError { stage, source }
    }

    fn report(&self) -> RunReport {
        RunReport {
            stage: self.stage,
            statements: self.statements,
            rows_reported: self.rows_reported,
            usage: self.usage,
        }
    }
}

pub struct Sequencer<'e, E: SqlEngine> {
    engine: &'e E,
    table: PartitionTable,
    config: DemoConfig,
}

impl<'e, E: SqlEngine> Sequencer<'e, E> {
    pub fn new(engine: &'e E, table: PartitionTable, config: DemoConfig) -> Self {
        Self {
            engine,
            table,
            config,
        }
    }

    /// Runs the whole script. Console lines go to `out`, rows to `visitor`.
    pub fn run<W, V>(&self, out: &mut W, visitor: &mut V) -> Result<RunReport, RunError>
    where
        W: Write,
        V: RowVisitor + ?Sized,
    {
        let mut ctx = RunContext::new();
        let partition = match self.mount(out) {
            Ok(partition) => partition,
            Err(source) => return Err(ctx.abort(source)),
        };
        let usage = partition.usage();
        self.run_mounted(&mut ctx, partition, usage, out, visitor)
    }

    /// Everything after a successful mount. The partition is unmounted here
    /// on every path, after all databases under it are closed.
    fn run_mounted<W, V>(
        &self,
        ctx: &mut RunContext,
        partition: MountedPartition,
        usage: Result<Usage, MountError>,
        out: &mut W,
        visitor: &mut V,
    ) -> Result<RunReport, RunError>
    where
        W: Write,
        V: RowVisitor + ?Sized,
    {
        ctx.record_usage(usage);
        ctx.stage = Stage::Mounted;
        let result = self.run_script(ctx, &partition, out, visitor);
        partition.unmount();
        let notice = writeln!(out, "Partition unmounted");
        match result {
            Ok(()) => {
                notice.map_err(|err| ctx.abort(err.into()))?;
                ctx.stage = Stage::Finished;
                Ok(ctx.report())
            }
            Err(source) => {
                if let Err(err) = notice {
                    warn!(%err, "unmount notice failed");
                }
                Err(ctx.abort(source))
            }
        }
    }

    fn mount<W: Write>(&self, out: &mut W) -> Result<MountedPartition, FlashSqlError> {
        self.config.validate()?;
        info!("Initializing partition");
        let partition = match self.table.mount(&self.config.mount) {
            Ok(partition) => partition,
            Err(err) => {
                match &err {
                    MountError::Failed(_) => error!("Failed to mount or format filesystem"),
                    MountError::PartitionNotFound(_) => error!("Failed to find partition"),
                    other => error!("Failed to initialize partition ({other})"),
                }
                return Err(err.into());
            }
        };
        writeln!(out, "Partition mounted at {}", partition.base_path().display())?;
        Ok(partition)
    }

    /// Opens both databases, runs the statements and closes what was opened,
    /// each handle exactly once.
    fn run_script<'p, W, V>(
        &self,
        ctx: &mut RunContext,
        partition: &'p MountedPartition,
        out: &mut W,
        visitor: &mut V,
    ) -> Result<(), FlashSqlError>
    where
        W: Write,
        V: RowVisitor + ?Sized,
    {
        let script = &self.config.script;
        if !script.keep_existing {
            for spec in script.databases() {
                partition.remove_file(partition.virtual_path(&spec.file_name))?;
            }
        }

        let mut databases = Vec::with_capacity(2);
        match self.open_and_execute(ctx, partition, &mut databases, out, visitor) {
            Ok(()) => {
                for db in databases.drain(..) {
                    db.close()?;
                }
                ctx.stage = Stage::HandlesClosed;
                Ok(())
            }
            Err(err) => {
                for db in databases {
                    if let Err(close_err) = db.close() {
                        warn!(err = %close_err, "close during abort failed");
                    }
                }
                Err(err)
            }
        }
    }

    fn open_and_execute<'p, W, V>(
        &self,
        ctx: &mut RunContext,
        partition: &'p MountedPartition,
        databases: &mut Vec<Database<'p, 'e, E>>,
        out: &mut W,
        visitor: &mut V,
    ) -> Result<(), FlashSqlError>
    where
        W: Write,
        V: RowVisitor + ?Sized,
    {
        for (idx, spec) in self.config.script.databases().into_iter().enumerate() {
            let path = partition.virtual_path(&spec.file_name);
            info!("Opening database {}", path.display());
            databases.push(Database::open(self.engine, partition, &path, out)?);
            ctx.stage = if idx == 0 {
                Stage::FirstOpen
            } else {
                Stage::SecondOpen
            };
        }

        self.each_database(ctx, databases, out, visitor, "Creating table", |spec| {
            sql::create_table(&spec.table)
        })?;
        ctx.stage = Stage::TablesCreated;
        info!("Tables created successfully");

        self.each_database(ctx, databases, out, visitor, "Inserting data in table", |spec| {
            sql::insert_row(&spec.table, spec.id, &spec.content)
        })?;
        ctx.stage = Stage::RowsInserted;

        self.each_database(ctx, databases, out, visitor, "Selecting data from", |spec| {
            sql::select_all(&spec.table)
        })?;
        ctx.stage = Stage::RowsSelected;
        Ok(())
    }

    /// Runs one statement per database in script order, stopping at the
    /// first failure.
    fn each_database<W, V, F>(
        &self,
        ctx: &mut RunContext,
        databases: &mut [Database<'_, 'e, E>],
        out: &mut W,
        visitor: &mut V,
        announce: &str,
        statement: F,
    ) -> Result<(), FlashSqlError>
    where
        W: Write,
        V: RowVisitor + ?Sized,
        F: Fn(&DatabaseSpec) -> String,
    {
        let script = &self.config.script;
        for (db, spec) in databases.iter_mut().zip(script.databases()) {
            info!("{announce} {}", spec.table);
            let sql = statement(spec);
            let outcome = execute(db, &sql, &script.row_label, out, visitor)?;
            ctx.statements += 1;
            ctx.rows_reported += outcome.rows;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::SqliteEngine, mount::is_mounted, report::ConsoleRowReporter};

    #[test]
    fn test_usage_failure_is_logged_and_run_continues() {
        let dir = tempfile::tempdir().unwrap();
        let table = PartitionTable::new(dir.path());
        table.create_partition("storage").unwrap();
        let mut config = DemoConfig::default();
        config.mount.base_path = "/unit_usage_failure".to_string();
        let partition = table.mount(&config.mount).unwrap();
        let engine = SqliteEngine::new();
        let sequencer = Sequencer::new(&engine, table, config);

        let mut ctx = RunContext::new();
        let mut out = Vec::new();
        let mut rows = ConsoleRowReporter::new(Vec::new());
        let report = sequencer
            .run_mounted(
                &mut ctx,
                partition,
                Err(MountError::failed("partition info unavailable")),
                &mut out,
                &mut rows,
            )
            .unwrap();
        assert_eq!(report.stage, Stage::Finished);
        assert_eq!(report.usage, None);
        assert_eq!(report.statements, 6);
        assert_eq!(report.rows_reported, 2);
        assert!(!is_mounted("/unit_usage_failure"));
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("Partition unmounted\n"));
    }

    #[test]
    fn test_record_usage_keeps_successful_query() {
        let mut ctx = RunContext::new();
        let usage = Usage {
            total_bytes: 1024,
            used_bytes: 10,
        };
        ctx.record_usage(Ok(usage));
        assert_eq!(ctx.report().usage, Some(usage));
        ctx.record_usage(Err(MountError::failed("gone")));
        assert_eq!(ctx.report().usage, Some(usage));
    }
}
