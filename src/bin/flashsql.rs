use std::{io, process};

use clap::Parser;
use flashsql::{ConsoleRowReporter, PartitionTable, Sequencer, SqliteEngine, cli::Cli};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.log_filter());

    let config = match cli.demo_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("error: {err}");
            process::exit(2);
        }
    };

    let engine = SqliteEngine::new();
    let sequencer = Sequencer::new(&engine, PartitionTable::new(&cli.partition_table), config);
    let mut out = io::stdout();
    let mut rows = ConsoleRowReporter::new(io::stdout());
    match sequencer.run(&mut out, &mut rows) {
        Ok(report) => {
            tracing::info!(
                statements = report.statements,
                rows = report.rows_reported,
                "run complete"
            );
        }
        Err(err) => {
            eprintln!("run failed: {err}");
            process::exit(1);
        }
    }
}

fn init_tracing(default_filter: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}
