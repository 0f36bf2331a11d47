use std::path::PathBuf;

use clap::{ArgAction, Parser};

use crate::{config::DemoConfig, errors::FlashSqlError};

#[derive(Debug, Clone, Parser)]
#[command(
    name = "flashsql",
    version,
    about = "Mount a flash partition, run a two-database SQLite script on it, unmount"
)]
pub struct Cli {
    /// Directory whose subdirectories stand in for flash partitions.
    #[arg(long, value_name = "DIR")]
    pub partition_table: PathBuf,
    /// JSON file with mount options and the database script.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Virtual mount point for the partition.
    #[arg(long)]
    pub base_path: Option<String>,
    /// Partition to mount; defaults to the first one in the table.
    #[arg(long)]
    pub label: Option<String>,
    #[arg(long)]
    pub max_files: Option<usize>,
    /// Capacity in bytes recorded when the partition gets formatted.
    #[arg(long)]
    pub capacity: Option<u64>,
    /// Fail instead of formatting a partition that does not mount.
    #[arg(long)]
    pub no_format: bool,
    /// Keep database files left over from an earlier run.
    #[arg(long)]
    pub keep_existing: bool,
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Loads the config file, if any, and applies command-line overrides.
    pub fn demo_config(&self) -> Result<DemoConfig, FlashSqlError> {
        let mut config = match &self.config {
            Some(path) => DemoConfig::load(path)?,
            None => DemoConfig::default(),
        };
        if let Some(base_path) = &self.base_path {
            config.mount.base_path = base_path.clone();
        }
        if let Some(label) = &self.label {
            config.mount.partition_label = Some(label.clone());
        }
        if let Some(max_files) = self.max_files {
            config.mount.max_files = max_files;
        }
        if let Some(capacity) = self.capacity {
            config.mount.capacity_bytes = capacity;
        }
        if self.no_format {
            config.mount.format_if_mount_failed = false;
        }
        if self.keep_existing {
            config.script.keep_existing = true;
        }
        config.validate()?;
        Ok(config)
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}
