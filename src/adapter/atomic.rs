//! Crash-safe filesystem adapter
//!
//! Same layout as [`FileAdapter`]; only the mutation protocol differs.
//!
//! Write:
//! 1. Encode the payload
//! 2. Create `<file>.__write__.<hex>` exclusively in the collection directory
//! 3. Write all bytes, flush, fsync when durable
//! 4. Rename onto the target (the atomicity boundary)
//!
//! Delete:
//! 1. Rename the target to `<file>.__del__.<hex>` (the visibility boundary)
//! 2. Unlink the tombstone, renaming it back if the unlink fails
//!
//! A failed step removes the temp file and leaves the target untouched.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use super::config::FileAdapterConfig;
use super::document::{Document, DocumentId};
use super::errors::{AdapterError, AdapterResult, FsFunctionFailed};
use super::file::FileAdapter;
use super::filter::DocumentFilter;
use super::{CollectionIter, DocumentIter, StorageAdapter};
use crate::observability::{log_event, Event};

const WRITE_MARKER: &str = ".__write__.";
const DELETE_MARKER: &str = ".__del__.";

/// [`FileAdapter`] with temp-file + rename writes and tombstone deletes.
#[derive(Debug)]
pub struct AtomicFileAdapter {
    files: FileAdapter,
}

impl AtomicFileAdapter {
    pub fn new(root: impl Into<PathBuf>) -> AdapterResult<Self> {
        Self::with_config(FileAdapterConfig::new(root))
    }

    /// `config.durable` enables fsync of temp files and the directory.
    pub fn with_config(config: FileAdapterConfig) -> AdapterResult<Self> {
        Ok(Self {
            files: FileAdapter::with_config(config)?,
        })
    }

    pub fn root(&self) -> &Path {
        self.files.root()
    }

    pub fn config(&self) -> &FileAdapterConfig {
        self.files.config()
    }

    pub fn document_path(&self, collection: &str, id: &DocumentId) -> AdapterResult<PathBuf> {
        self.files.document_path(collection, id)
    }

    fn write_atomic(&self, path: &Path, payload: &[u8]) -> Result<(), FsFunctionFailed> {
        self.files.ensure_collection_dir(path)?;

        let temp = sibling(path, WRITE_MARKER, 12);
        let result = self.write_temp(&temp, payload).and_then(|()| {
            fs::rename(&temp, path).map_err(|e| self.files.fs_failed("rename", path, e))
        });

        if let Err(failure) = result {
            cleanup_temp(&temp, &failure);
            return Err(failure);
        }

        if self.config().durable {
            sync_parent(path).map_err(|e| self.files.fs_failed("sync_all", path, e))?;
        }
        Ok(())
    }

    fn write_temp(&self, temp: &Path, payload: &[u8]) -> Result<(), FsFunctionFailed> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp)
            .map_err(|e| self.files.fs_failed("create", temp, e))?;

        file.write_all(payload)
            .map_err(|e| self.files.fs_failed("write", temp, e))?;
        file.flush().map_err(|e| self.files.fs_failed("flush", temp, e))?;
        if self.config().durable {
            file.sync_all()
                .map_err(|e| self.files.fs_failed("sync_all", temp, e))?;
        }
        drop(file);

        // Final bits are in place before the file becomes visible
        self.files.apply_file_permissions(temp)
    }

    fn unlink_atomic(&self, path: &Path) -> Result<(), FsFunctionFailed> {
        let tomb = sibling(path, DELETE_MARKER, 8);

        if fs::rename(path, &tomb).is_err() {
            return fs::remove_file(path).map_err(|e| self.files.fs_failed("remove_file", path, e));
        }

        if let Err(e) = fs::remove_file(&tomb) {
            let restored = fs::rename(&tomb, path).is_ok();
            log_event(
                Event::TombstoneRestored,
                &[
                    ("path", &path.display().to_string()),
                    ("restored", if restored { "true" } else { "false" }),
                ],
            );
            return Err(self.files.fs_failed("remove_file", &tomb, e));
        }
        Ok(())
    }
}

impl StorageAdapter for AtomicFileAdapter {
    fn write(&self, collection: &str, id: &DocumentId, data: &Document) -> AdapterResult<()> {
        let payload = self
            .files
            .codec()
            .encode(data)
            .map_err(|e| AdapterError::write_failed(collection, id).with_source(e))?;
        let path = self.files.document_path(collection, id)?;

        self.write_atomic(&path, &payload)
            .map_err(|e| AdapterError::write_failed(collection, id).with_source(e))?;

        log_event(Event::DocumentWritten, &[("collection", collection), ("id", id.as_str())]);
        Ok(())
    }

    fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
        self.files.read(collection, id)
    }

    fn has(&self, collection: &str, id: &DocumentId) -> AdapterResult<bool> {
        self.files.has(collection, id)
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()> {
        let path = self.files.document_path(collection, id)?;
        self.unlink_atomic(&path)
            .map_err(|e| AdapterError::delete_failed(collection, id).with_source(e))?;

        log_event(Event::DocumentDeleted, &[("collection", collection), ("id", id.as_str())]);
        Ok(())
    }

    fn read_all<'a>(
        &'a self,
        collection: &str,
        filter: &'a dyn DocumentFilter,
    ) -> AdapterResult<DocumentIter<'a>> {
        self.files.read_all(collection, filter)
    }

    fn list_collections(&self) -> AdapterResult<CollectionIter<'_>> {
        self.files.list_collections()
    }
}

/// `<path><marker><random hex>` in the same directory.
fn sibling(path: &Path, marker: &str, hex_len: usize) -> PathBuf {
    let hex = Uuid::new_v4().simple().to_string();
    let mut name = path.as_os_str().to_os_string();
    name.push(marker);
    name.push(&hex[..hex_len]);
    PathBuf::from(name)
}

fn cleanup_temp(temp: &Path, failure: &FsFunctionFailed) {
    if temp.exists() {
        let removed = fs::remove_file(temp).is_ok();
        log_event(
            Event::AtomicTempCleanup,
            &[
                ("path", &temp.display().to_string()),
                ("function", failure.function),
                ("removed", if removed { "true" } else { "false" }),
            ],
        );
    }
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(dir) => File::open(dir)?.sync_all(),
        None => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
