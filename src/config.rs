use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{errors::FlashSqlError, mount::METADATA_FILE};

pub const DEFAULT_BASE_PATH: &str = "/spiffs";
pub const DEFAULT_MAX_FILES: usize = 5;
pub const DEFAULT_CAPACITY_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_ROW_LABEL: &str = "Callback function called";

/// Options handed to the partition collaborator at mount time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    pub base_path: String,
    /// `None` selects the first partition in the table.
    pub partition_label: Option<String>,
    pub max_files: usize,
    pub format_if_mount_failed: bool,
    /// Capacity written into the partition metadata when formatting.
    pub capacity_bytes: u64,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_string(),
            partition_label: None,
            max_files: DEFAULT_MAX_FILES,
            format_if_mount_failed: true,
            capacity_bytes: DEFAULT_CAPACITY_BYTES,
        }
    }
}

/// One database file, its table and the single row written into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSpec {
    pub file_name: String,
    pub table: String,
    pub id: i64,
    pub content: String,
}

impl DatabaseSpec {
    pub fn new(file_name: &str, table: &str, id: i64, content: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            table: table.to_string(),
            id,
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoScript {
    pub first: DatabaseSpec,
    pub second: DatabaseSpec,
    /// Printed once ahead of every reported row.
    pub row_label: String,
    /// Skip removing the database files before the run.
    pub keep_existing: bool,
}

impl Default for DemoScript {
    fn default() -> Self {
        Self {
            first: DatabaseSpec::new("test1.db", "test1", 1, "Hello, World from test1"),
            second: DatabaseSpec::new("test2.db", "test2", 1, "Hello, World from test2"),
            row_label: DEFAULT_ROW_LABEL.to_string(),
            keep_existing: false,
        }
    }
}

impl DemoScript {
    pub fn databases(&self) -> [&DatabaseSpec; 2] {
        [&self.first, &self.second]
    }

    pub fn validate(&self) -> Result<(), FlashSqlError> {
        for spec in self.databases() {
            validate_identifier(&spec.table)?;
            validate_file_name(&spec.file_name)?;
        }
        if self.first.file_name == self.second.file_name {
            return Err(FlashSqlError::config(
                "the two databases must use different files",
            ));
        }
        Ok(())
    }
}

/// Everything one run needs, as read from an optional JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub mount: MountConfig,
    pub script: DemoScript,
}

impl DemoConfig {
    pub fn from_json(text: &str) -> Result<Self, FlashSqlError> {
        serde_json::from_str(text).map_err(|e| FlashSqlError::config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, FlashSqlError> {
        let text = fs::read_to_string(path).map_err(|e| {
            FlashSqlError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), FlashSqlError> {
        if self.mount.max_files == 0 {
            return Err(FlashSqlError::config("max_files must be at least 1"));
        }
        if !self.mount.base_path.starts_with('/') {
            return Err(FlashSqlError::config("base_path must be absolute"));
        }
        self.script.validate()
    }
}

pub fn validate_identifier(name: &str) -> Result<(), FlashSqlError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(FlashSqlError::config(format!(
            "table name {name:?} is not a valid identifier"
        )))
    }
}

fn validate_file_name(name: &str) -> Result<(), FlashSqlError> {
    if name.is_empty() || name.contains('/') || name == "." || name == ".." {
        return Err(FlashSqlError::config(format!(
            "database file name {name:?} must be a plain file name"
        )));
    }
    // Partition metadata lives next to the databases.
    if name == METADATA_FILE || name.starts_with(".partition") {
        return Err(FlashSqlError::config(format!(
            "database file name {name:?} is reserved by the partition"
        )));
    }
    Ok(())
}
