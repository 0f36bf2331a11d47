//! Host emulation of a flash partition mounted under a virtual path.
//!
//! A partition table is a host directory; each subdirectory stands in for one
//! flash partition. A partition counts as formatted once it carries a
//! [`METADATA_FILE`]. Mounting registers the virtual base path in a
//! process-wide registry so the same mount point cannot be registered twice.

use std::{
    collections::BTreeSet,
    fs, io,
    path::{Component, Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use parking_lot::{Mutex, const_mutex};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{config::MountConfig, errors::MountError};

pub const METADATA_FILE: &str = ".partition.json";

static ACTIVE_MOUNTS: Mutex<BTreeSet<String>> = const_mutex(BTreeSet::new());

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PartitionMeta {
    label: String,
    capacity_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub total_bytes: u64,
    pub used_bytes: u64,
}

/// Table of emulated partitions rooted at a host directory.
#[derive(Debug, Clone)]
pub struct PartitionTable {
    root: PathBuf,
}

impl PartitionTable {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    /// Creates an empty (unformatted) partition directory.
    pub fn create_partition(&self, label: &str) -> Result<PathBuf, MountError> {
        let dir = self.root.join(label);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn mount(&self, config: &MountConfig) -> Result<MountedPartition, MountError> {
        if config.max_files == 0 {
            return Err(MountError::init("max_files must be at least 1"));
        }
        let (label, dir) = self.find_partition(config.partition_label.as_deref())?;
        let meta = match read_meta(&dir) {
            Some(meta) => meta,
            None if config.format_if_mount_failed => {
                warn!(partition = %label, "mount failed, formatting partition");
                format_partition(&dir, &label, config.capacity_bytes)
                    .map_err(|e| MountError::failed(format!("format of {label} failed: {e}")))?
            }
            None => {
                return Err(MountError::failed(format!(
                    "partition {label} is not formatted"
                )));
            }
        };
        register(&config.base_path)?;
        info!(partition = %label, base_path = %config.base_path, "partition mounted");
        Ok(MountedPartition {
            base_path: PathBuf::from(&config.base_path),
            dir,
            label,
            capacity_bytes: meta.capacity_bytes,
            max_files: config.max_files,
            open_files: Arc::new(AtomicUsize::new(0)),
            registered: true,
        })
    }

    fn find_partition(&self, label: Option<&str>) -> Result<(String, PathBuf), MountError> {
        match label {
            Some(label) => {
                let dir = self.root.join(label);
                if dir.is_dir() {
                    Ok((label.to_string(), dir))
                } else {
                    Err(MountError::not_found(format!("no partition labelled {label}")))
                }
            }
            None => {
                let entries = fs::read_dir(&self.root).map_err(|e| {
                    MountError::not_found(format!("{}: {e}", self.root.display()))
                })?;
                let mut names = Vec::new();
                for entry in entries {
                    let entry = entry?;
                    if entry.file_type()?.is_dir() {
                        names.push(entry.file_name().to_string_lossy().into_owned());
                    }
                }
                names.sort();
                let first = names
                    .into_iter()
                    .next()
                    .ok_or_else(|| MountError::not_found("partition table is empty"))?;
                let dir = self.root.join(&first);
                Ok((first, dir))
            }
        }
    }
}

/// Handle for a mounted partition. Unregisters the mount point when dropped.
#[derive(Debug)]
pub struct MountedPartition {
    base_path: PathBuf,
    dir: PathBuf,
    label: String,
    capacity_bytes: u64,
    max_files: usize,
    open_files: Arc<AtomicUsize>,
    registered: bool,
}

impl MountedPartition {
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn usage(&self) -> Result<Usage, MountError> {
        let mut used_bytes = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_name() == METADATA_FILE {
                continue;
            }
            let meta = entry.metadata()?;
            if meta.is_file() {
                used_bytes += meta.len();
            }
        }
        Ok(Usage {
            total_bytes: self.capacity_bytes,
            used_bytes,
        })
    }

    /// Maps a path under the mount root onto the backing host file.
    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf, MountError> {
        let path = path.as_ref();
        let relative = path
            .strip_prefix(&self.base_path)
            .map_err(|_| MountError::OutsideMount(path.to_path_buf()))?;
        let mut host = self.dir.clone();
        let mut depth = 0;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    host.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                _ => return Err(MountError::OutsideMount(path.to_path_buf())),
            }
        }
        if depth == 0 {
            return Err(MountError::OutsideMount(path.to_path_buf()));
        }
        Ok(host)
    }

    /// Joins a file name onto the mount root.
    pub fn virtual_path(&self, file_name: &str) -> PathBuf {
        self.base_path.join(file_name)
    }

    /// Removes a file from the partition; a missing file is not an error.
    pub fn remove_file<P: AsRef<Path>>(&self, path: P) -> Result<bool, MountError> {
        let host = self.resolve(path)?;
        match fs::remove_file(&host) {
            Ok(()) => {
                debug!(path = %host.display(), "removed stale file");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Leases one open-file slot. The slot frees itself on drop.
    pub fn acquire_file(&self) -> Result<FileSlot, MountError> {
        let claimed = self
            .open_files
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |open| {
                (open < self.max_files).then_some(open + 1)
            });
        match claimed {
            Ok(_) => Ok(FileSlot {
                open_files: Arc::clone(&self.open_files),
            }),
            Err(_) => Err(MountError::TooManyOpenFiles(self.max_files)),
        }
    }

    pub fn open_files(&self) -> usize {
        self.open_files.load(Ordering::Acquire)
    }

    pub fn unmount(mut self) {
        self.release();
        info!(partition = %self.label, "partition unmounted");
    }

    fn release(&mut self) {
        if self.registered {
            unregister(&self.base_path.to_string_lossy());
            self.registered = false;
        }
    }
}

impl Drop for MountedPartition {
    fn drop(&mut self) {
        self.release();
    }
}

/// One leased open-file slot of a mounted partition.
#[derive(Debug)]
pub struct FileSlot {
    open_files: Arc<AtomicUsize>,
}

impl Drop for FileSlot {
    fn drop(&mut self) {
        self.open_files.fetch_sub(1, Ordering::AcqRel);
    }
}

pub fn is_mounted(base_path: &str) -> bool {
    ACTIVE_MOUNTS.lock().contains(base_path)
}

fn register(base_path: &str) -> Result<(), MountError> {
    let mut active = ACTIVE_MOUNTS.lock();
    if !active.insert(base_path.to_string()) {
        return Err(MountError::init(format!("{base_path} is already mounted")));
    }
    Ok(())
}

fn unregister(base_path: &str) {
    ACTIVE_MOUNTS.lock().remove(base_path);
}

fn read_meta(dir: &Path) -> Option<PartitionMeta> {
    let text = fs::read_to_string(dir.join(METADATA_FILE)).ok()?;
    serde_json::from_str(&text).ok()
}

fn format_partition(dir: &Path, label: &str, capacity_bytes: u64) -> io::Result<PartitionMeta> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
    }
    let meta = PartitionMeta {
        label: label.to_string(),
        capacity_bytes,
    };
    let text = serde_json::to_string(&meta).map_err(io::Error::other)?;
    fs::write(dir.join(METADATA_FILE), text)?;
    Ok(meta)
}
