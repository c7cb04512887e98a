//! Archive device boundary: external object storage for build artifacts.
//!
//! An [`ArchiveDevice`] is a flat namespace of named objects backed by
//! something S3-like or filesystem-like. Two switches gate the mutating
//! operations: dry-run turns them into logged no-ops, and writes-disabled
//! simulates them with an artificial delay instead of performing I/O.

use crate::error::{OutpostError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// One object in an archive listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub size: u64,
}

/// External storage for named objects.
pub trait ArchiveDevice {
    fn set_dry_run(&mut self, dry_run: bool);

    /// Disable writes, simulating mutating operations with a delay.
    fn set_writes_disabled(&mut self, disabled: bool);

    /// Determine if an object exists in the archive.
    fn exists(&self, name: &str) -> Result<bool>;

    /// Push a local file to the archive. An empty `name` uses the source
    /// file name.
    fn push(&self, source: &Path, name: &str) -> Result<()>;

    /// Pull an object to the local machine. If `destination` is a
    /// directory, pulls to a file named `name` within it.
    fn pull(&self, name: &str, destination: &Path) -> Result<()>;

    /// List objects, optionally restricted to a name prefix.
    fn list(&self, prefix: Option<&str>) -> Result<Vec<ArchiveEntry>>;
}

/// Archive rooted in a local directory.
#[derive(Debug)]
pub struct FileArchive {
    root: PathBuf,
    dry_run: bool,
    writes_disabled: bool,
    simulated_write_delay: Duration,
}

impl FileArchive {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| OutpostError::Storage {
            message: format!("failed to create archive root {}", root.display()),
            path: Some(root.clone()),
            source: Some(e),
        })?;
        Ok(Self {
            root,
            dry_run: false,
            writes_disabled: false,
            simulated_write_delay: Duration::from_secs(15),
        })
    }

    /// Shorten the writes-disabled simulation delay (for tests).
    pub fn with_simulated_write_delay(mut self, delay: Duration) -> Self {
        self.simulated_write_delay = delay;
        self
    }

    fn object_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn copy_file(source: &Path, target: &Path) -> Result<()> {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| OutpostError::Storage {
                message: format!("failed to create directory {}", parent.display()),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }
        fs::copy(source, target).map_err(|e| OutpostError::Storage {
            message: format!(
                "failed to copy {} to {}",
                source.display(),
                target.display()
            ),
            path: Some(target.to_path_buf()),
            source: Some(e),
        })?;
        Ok(())
    }
}

impl ArchiveDevice for FileArchive {
    fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    fn set_writes_disabled(&mut self, disabled: bool) {
        self.writes_disabled = disabled;
    }

    fn exists(&self, name: &str) -> Result<bool> {
        let exists = self.object_path(name).is_file();
        debug!(name = %name, exists, "archive exists check");
        Ok(exists)
    }

    fn push(&self, source: &Path, name: &str) -> Result<()> {
        let name = if name.is_empty() {
            source
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| OutpostError::Validation {
                    field: "name".to_string(),
                    message: format!("cannot derive object name from {}", source.display()),
                })?
                .to_string()
        } else {
            name.to_string()
        };
        debug!(source = %source.display(), name = %name, "archive push");

        if self.dry_run {
            return Ok(());
        }
        if self.writes_disabled {
            warn!("archive writes disabled, simulating push");
            thread::sleep(self.simulated_write_delay);
            return Ok(());
        }
        Self::copy_file(source, &self.object_path(&name))
    }

    fn pull(&self, name: &str, destination: &Path) -> Result<()> {
        debug!(name = %name, destination = %destination.display(), "archive pull");
        if self.dry_run {
            return Ok(());
        }
        let destination = if destination.is_dir() {
            destination.join(name)
        } else {
            destination.to_path_buf()
        };
        Self::copy_file(&self.object_path(name), &destination)
    }

    fn list(&self, prefix: Option<&str>) -> Result<Vec<ArchiveEntry>> {
        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|e| OutpostError::Storage {
                message: format!("failed to walk archive root {}", self.root.display()),
                path: Some(self.root.clone()),
                source: e.into_io_error(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .into_owned();
            if let Some(prefix) = prefix {
                if !name.starts_with(prefix) {
                    continue;
                }
            }
            let size = entry
                .metadata()
                .map_err(|e| OutpostError::Storage {
                    message: format!("failed to stat {}", entry.path().display()),
                    path: Some(entry.path().to_path_buf()),
                    source: e.into_io_error(),
                })?
                .len();
            entries.push(ArchiveEntry { name, size });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn archive_with_source() -> (FileArchive, TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let archive = FileArchive::new(temp_dir.path().join("archive")).unwrap();
        let source = temp_dir.path().join("artifact.tar");
        fs::write(&source, b"artifact bytes").unwrap();
        (archive, temp_dir, source)
    }

    #[test]
    fn test_push_pull_round_trip() {
        let (archive, temp_dir, source) = archive_with_source();

        assert!(!archive.exists("builds/artifact.tar").unwrap());
        archive.push(&source, "builds/artifact.tar").unwrap();
        assert!(archive.exists("builds/artifact.tar").unwrap());

        let restored = temp_dir.path().join("restored.tar");
        archive.pull("builds/artifact.tar", &restored).unwrap();
        assert_eq!(fs::read(&restored).unwrap(), b"artifact bytes");
    }

    #[test]
    fn test_push_with_empty_name_uses_source_name() {
        let (archive, _temp_dir, source) = archive_with_source();
        archive.push(&source, "").unwrap();
        assert!(archive.exists("artifact.tar").unwrap());
    }

    #[test]
    fn test_pull_into_directory() {
        let (archive, temp_dir, source) = archive_with_source();
        archive.push(&source, "artifact.tar").unwrap();

        let dest_dir = temp_dir.path().join("out");
        fs::create_dir_all(&dest_dir).unwrap();
        archive.pull("artifact.tar", &dest_dir).unwrap();
        assert!(dest_dir.join("artifact.tar").is_file());
    }

    #[test]
    fn test_list_with_prefix() {
        let (archive, _temp_dir, source) = archive_with_source();
        archive.push(&source, "builds/a.tar").unwrap();
        archive.push(&source, "builds/b.tar").unwrap();
        archive.push(&source, "logs/run.txt").unwrap();

        let all = archive.list(None).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|e| e.size == 14));

        let builds = archive.list(Some("builds/")).unwrap();
        let names: Vec<_> = builds.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["builds/a.tar", "builds/b.tar"]);
    }

    #[test]
    fn test_dry_run_suppresses_writes() {
        let (mut archive, _temp_dir, source) = archive_with_source();
        archive.set_dry_run(true);
        archive.push(&source, "artifact.tar").unwrap();
        assert!(!archive.exists("artifact.tar").unwrap());
    }

    #[test]
    fn test_writes_disabled_simulates_push() {
        let temp_dir = TempDir::new().unwrap();
        let mut archive = FileArchive::new(temp_dir.path().join("archive"))
            .unwrap()
            .with_simulated_write_delay(Duration::from_millis(1));
        let source = temp_dir.path().join("artifact.tar");
        fs::write(&source, b"artifact bytes").unwrap();

        archive.set_writes_disabled(true);
        archive.push(&source, "artifact.tar").unwrap();
        assert!(!archive.exists("artifact.tar").unwrap());
    }

    #[test]
    fn test_pull_missing_object_fails() {
        let (archive, temp_dir, _source) = archive_with_source();
        let err = archive
            .pull("absent.tar", &temp_dir.path().join("x"))
            .unwrap_err();
        assert!(matches!(err, OutpostError::Storage { .. }));
    }
}
