//! File adapter configuration
//!
//! Configured by the embedding application, immutable after construction.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::errors::{AdapterError, AdapterResult};

/// How a collection directory is scanned by `read_all`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// Iterate directory entries lazily, skipping hidden entries
    #[default]
    Directory,
    /// Match `*.db.json` with a compiled glob, sorted by file name
    Glob,
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Directory => write!(f, "directory"),
            ScanMode::Glob => write!(f, "glob"),
        }
    }
}

/// Configuration for [`FileAdapter`](super::FileAdapter) and
/// [`AtomicFileAdapter`](super::AtomicFileAdapter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAdapterConfig {
    /// Root directory; must exist
    pub root: PathBuf,

    /// Permission bits applied to document files
    #[serde(default = "default_file_permissions")]
    pub file_permissions: u32,

    /// Permission bits applied to collection directories
    #[serde(default = "default_directory_permissions")]
    pub directory_permissions: u32,

    /// Collection scan mode
    #[serde(default)]
    pub scan_mode: ScanMode,

    /// fsync temp files before rename (atomic adapter only)
    #[serde(default)]
    pub durable: bool,
}

fn default_file_permissions() -> u32 {
    0o644
}

fn default_directory_permissions() -> u32 {
    0o755
}

impl FileAdapterConfig {
    /// Configuration with defaults for the given root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            file_permissions: default_file_permissions(),
            directory_permissions: default_directory_permissions(),
            scan_mode: ScanMode::default(),
            durable: false,
        }
    }

    pub fn with_file_permissions(mut self, mode: u32) -> Self {
        self.file_permissions = mode;
        self
    }

    pub fn with_directory_permissions(mut self, mode: u32) -> Self {
        self.directory_permissions = mode;
        self
    }

    pub fn with_scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    pub fn with_durable(mut self, durable: bool) -> Self {
        self.durable = durable;
        self
    }

    /// Validate the configuration.
    ///
    /// - Permission bits must fit in 0o7777
    /// - Directories must be traversable by their owner
    pub fn validate(&self) -> AdapterResult<()> {
        if self.file_permissions > 0o7777 {
            return Err(AdapterError::init_failed(format!(
                "Invalid file permissions {:o}",
                self.file_permissions
            )));
        }
        if self.directory_permissions > 0o7777 {
            return Err(AdapterError::init_failed(format!(
                "Invalid directory permissions {:o}",
                self.directory_permissions
            )));
        }
        if self.directory_permissions & 0o300 != 0o300 {
            return Err(AdapterError::init_failed(format!(
                "Directory permissions {:o} must let the owner write and traverse",
                self.directory_permissions
            )));
        }
        Ok(())
    }
}
