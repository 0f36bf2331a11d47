use std::{io::Write, ops::ControlFlow};

use tracing::warn;

use crate::engine::{NULL_MARKER, Row};

/// Receives result rows one at a time, in engine order.
pub trait RowVisitor {
    fn visit(&mut self, label: &str, row: Row<'_>) -> ControlFlow<()>;
}

impl<V: RowVisitor + ?Sized> RowVisitor for &mut V {
    fn visit(&mut self, label: &str, row: Row<'_>) -> ControlFlow<()> {
        (**self).visit(label, row)
    }
}

/// Prints each row as `label:` followed by `name = value` lines and a blank
/// separator line.
pub struct ConsoleRowReporter<W: Write> {
    out: W,
}

impl<W: Write> ConsoleRowReporter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> RowVisitor for ConsoleRowReporter<W> {
    fn visit(&mut self, label: &str, row: Row<'_>) -> ControlFlow<()> {
        match write_row(&mut self.out, label, row) {
            Ok(()) => ControlFlow::Continue(()),
            Err(err) => {
                warn!(%err, "row output failed, aborting query");
                ControlFlow::Break(())
            }
        }
    }
}

pub fn write_row<W: Write>(out: &mut W, label: &str, row: Row<'_>) -> std::io::Result<()> {
    writeln!(out, "{label}: ")?;
    for (name, value) in row.columns() {
        writeln!(out, "{name} = {}", value.unwrap_or(NULL_MARKER))?;
    }
    writeln!(out)?;
    Ok(())
}
