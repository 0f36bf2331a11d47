use std::{
    io::Write,
    time::{Duration, Instant},
};

use tracing::{debug, error};

use crate::{
    database::Database, engine::SqlEngine, errors::FlashSqlError, report::RowVisitor,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows: usize,
    pub elapsed: Duration,
}

/// Runs `sql` against `db`, timing it and handing every result row to
/// `visitor` under `label`.
///
/// Writes the statement text, the success or `SQL error:` line and the
/// elapsed microseconds to `out`, whatever the outcome. A failure is returned
/// as is; nothing is retried.
pub fn execute<E, W, V>(
    db: &mut Database<'_, '_, E>,
    sql: &str,
    label: &str,
    out: &mut W,
    visitor: &mut V,
) -> Result<ExecOutcome, FlashSqlError>
where
    E: SqlEngine,
    W: Write,
    V: RowVisitor + ?Sized,
{
    writeln!(out, "{sql}")?;
    let start = Instant::now();
    let mut rows = 0;
    let result = db.exec_raw(sql, &mut |row| {
        rows += 1;
        visitor.visit(label, row)
    });
    let elapsed = start.elapsed();
    match &result {
        Ok(()) => writeln!(out, "Operation done successfully")?,
        Err(err) => writeln!(out, "SQL error: {}", err.message)?,
    }
    writeln!(out, "Time taken: {} us", elapsed.as_micros())?;
    match result {
        Ok(()) => {
            debug!(sql, rows, elapsed_us = elapsed.as_micros() as u64, "statement done");
            Ok(ExecOutcome { rows, elapsed })
        }
        Err(err) => {
            error!(sql, code = err.code, "statement failed");
            Err(FlashSqlError::statement(sql, err))
        }
    }
}
