//! Atomic JSON persistence and change-suppressed registry stores.
//!
//! Writes go through a temp file in the target directory:
//! 1. Serialize pretty and write to a uniquely named temp file
//! 2. Sync to disk
//! 3. Optionally copy the previous file to a `.bak` backup
//! 4. Atomic rename onto the target path
//!
//! [`RegistryStore`] layers dirty tracking on top: it remembers the value it
//! last read or wrote, and `flush_if_changed` only touches the disk when the
//! current value differs structurally from that snapshot.

use crate::error::{OutpostError, Result};
use crate::registry::RegistryCollection;
use serde::{de::DeserializeOwned, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, warn};

/// Read and parse a JSON file.
///
/// Returns `None` if the file doesn't exist, or an error if parsing fails.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }

    let mut file = File::open(path).map_err(|e| OutpostError::Storage {
        message: format!("failed to open {}", path.display()),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| OutpostError::Storage {
            message: format!("failed to read {}", path.display()),
            path: Some(path.to_path_buf()),
            source: Some(e),
        })?;

    let data: T = serde_json::from_str(&contents).map_err(|e| OutpostError::Parse {
        message: e.to_string(),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    Ok(Some(data))
}

/// Write data to a JSON file atomically, optionally keeping a `.bak` copy of
/// the previous contents.
pub fn write_json_atomic<T: Serialize>(path: &Path, data: &T, keep_backup: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| OutpostError::Storage {
                message: format!("failed to create directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }
    }

    let temp_path = path.with_extension(format!("json.{}.tmp", process::id()));

    let serialized = serde_json::to_string_pretty(data).map_err(|e| OutpostError::Parse {
        message: format!("failed to serialize data: {}", e),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .map_err(|e| OutpostError::Storage {
                message: format!("failed to create temp file {}", temp_path.display()),
                path: Some(temp_path.clone()),
                source: Some(e),
            })?;

        file.write_all(serialized.as_bytes())
            .map_err(|e| OutpostError::Storage {
                message: format!("failed to write temp file {}", temp_path.display()),
                path: Some(temp_path.clone()),
                source: Some(e),
            })?;

        file.sync_all().map_err(|e| OutpostError::Storage {
            message: format!("failed to sync temp file {}", temp_path.display()),
            path: Some(temp_path.clone()),
            source: Some(e),
        })?;
    }

    if keep_backup && path.exists() {
        let backup_path = path.with_extension("json.bak");
        if let Err(e) = fs::copy(path, &backup_path) {
            // Backup failure is not fatal
            warn!("failed to create backup {}: {}", backup_path.display(), e);
        } else {
            debug!("created backup: {}", backup_path.display());
        }
    }

    fs::rename(&temp_path, path).map_err(|e| OutpostError::Storage {
        message: format!(
            "failed to rename {} to {}",
            temp_path.display(),
            path.display()
        ),
        path: Some(path.to_path_buf()),
        source: Some(e),
    })?;

    debug!("atomically wrote {}", path.display());
    Ok(())
}

/// Loads one registry file and flushes it back only when its content has
/// changed since the last load or write.
#[derive(Debug)]
pub struct RegistryStore {
    path: PathBuf,
    required: bool,
    keep_backup: bool,
    dry_run: bool,
    /// The value last read from or written to disk.
    original: Option<RegistryCollection>,
}

impl RegistryStore {
    pub fn new(path: impl Into<PathBuf>, required: bool) -> Self {
        Self {
            path: path.into(),
            required,
            keep_backup: false,
            dry_run: false,
            original: None,
        }
    }

    /// Keep a `.bak` copy when rewriting the file.
    pub fn with_backup(mut self) -> Self {
        self.keep_backup = true;
        self
    }

    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parse the registry file. A missing file is fatal for a required
    /// store and yields an empty default collection otherwise. The parsed
    /// value becomes the change-detection snapshot.
    pub fn load(&mut self) -> Result<RegistryCollection> {
        debug!("loading registry from {}", self.path.display());
        let collection = match read_json::<RegistryCollection>(&self.path)? {
            Some(collection) => collection,
            None if self.required => {
                return Err(OutpostError::Parse {
                    message: "registry file is missing".to_string(),
                    path: Some(self.path.clone()),
                    source: None,
                });
            }
            None => RegistryCollection::default(),
        };
        self.original = Some(collection.clone());
        Ok(collection)
    }

    /// Serialize `current` to disk only when it differs structurally from
    /// the last-persisted snapshot. Returns whether a write happened.
    pub fn flush_if_changed(&mut self, current: &RegistryCollection) -> Result<bool> {
        if self.original.as_ref() == Some(current) {
            return Ok(false);
        }
        if self.dry_run {
            debug!("dry run, not writing {}", self.path.display());
            return Ok(false);
        }
        write_json_atomic(&self.path, current, self.keep_backup)?;
        self.original = Some(current.clone());
        debug!("flushed registry to {}", self.path.display());
        Ok(true)
    }
}
