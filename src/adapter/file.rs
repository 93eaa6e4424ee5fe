//! Filesystem adapter
//!
//! Layout: `<root>/<normalize(collection)>/<normalize(id)>.db.json`, one
//! UTF-8 JSON document per file. Writes truncate and rewrite the target in
//! place; see [`AtomicFileAdapter`](super::AtomicFileAdapter) for the
//! crash-safe variant.

use std::fs::{self, DirBuilder, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};

use super::config::{FileAdapterConfig, ScanMode};
use super::document::{Document, DocumentId};
use super::errors::{AdapterError, AdapterResult, FsFunctionFailed};
use super::filter::DocumentFilter;
use super::{CollectionIter, DocumentIter, StorageAdapter};
use crate::normalizer::{is_path_segment, FileNameNormalizer, JsonCodec};
use crate::observability::{log_event, Event};

/// Suffix of every document file
pub const FILE_EXTENSION: &str = ".db.json";

/// Document-per-file adapter rooted at an existing directory.
#[derive(Debug)]
pub struct FileAdapter {
    config: FileAdapterConfig,
    names: FileNameNormalizer,
    codec: JsonCodec,
    matcher: GlobMatcher,
}

impl FileAdapter {
    /// Open an adapter with default permissions and directory scanning.
    pub fn new(root: impl Into<PathBuf>) -> AdapterResult<Self> {
        Self::with_config(FileAdapterConfig::new(root))
    }

    /// Open an adapter from a full configuration.
    ///
    /// The root must exist; it is canonicalized so diagnostics always carry
    /// an absolute path.
    pub fn with_config(mut config: FileAdapterConfig) -> AdapterResult<Self> {
        config.validate()?;

        let root = fs::canonicalize(&config.root).map_err(|e| {
            AdapterError::init_failed(format!("Given root path {:?} not found", config.root))
                .with_source(FsFunctionFailed {
                    function: "canonicalize",
                    path: config.root.clone(),
                    root: config.root.clone(),
                    file_permissions: config.file_permissions,
                    directory_permissions: config.directory_permissions,
                    scan_mode: config.scan_mode,
                    source: e,
                })
        })?;
        if !root.is_dir() {
            return Err(AdapterError::init_failed(format!(
                "Given root path {:?} is not a directory",
                root
            )));
        }
        config.root = root;

        let matcher = Glob::new(&format!("*{}", FILE_EXTENSION))
            .map_err(|e| AdapterError::init_failed(format!("Invalid scan pattern: {}", e)))?
            .compile_matcher();

        log_event(
            Event::AdapterInitialized,
            &[
                ("adapter", "file"),
                ("root", &config.root.display().to_string()),
                ("scan_mode", &config.scan_mode.to_string()),
            ],
        );

        Ok(Self {
            config,
            names: FileNameNormalizer::new(),
            codec: JsonCodec::new(),
            matcher,
        })
    }

    /// Canonical root directory
    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn config(&self) -> &FileAdapterConfig {
        &self.config
    }

    pub(crate) fn codec(&self) -> &JsonCodec {
        &self.codec
    }

    /// Directory holding a collection
    ///
    /// Fails with NormalizationFailed when the normalized name is empty,
    /// `.` or `..`, so no path outside the root is ever built.
    pub fn collection_path(&self, collection: &str) -> AdapterResult<PathBuf> {
        let segment = self.names.normalize(collection);
        if !is_path_segment(&segment) {
            return Err(AdapterError::unsafe_name(collection, None, &segment));
        }
        Ok(self.config.root.join(segment))
    }

    /// File holding a document
    ///
    /// Ids normalizing to a leading `.` are refused as well: the file would
    /// be hidden from listings.
    pub fn document_path(&self, collection: &str, id: &DocumentId) -> AdapterResult<PathBuf> {
        let segment = self.names.normalize(id.as_str());
        if !is_path_segment(&segment) || segment.starts_with('.') {
            return Err(AdapterError::unsafe_name(collection, Some(id), &segment));
        }
        let file = format!("{}{}", segment, FILE_EXTENSION);
        Ok(self.collection_path(collection)?.join(file))
    }

    /// Wrap a failed primitive with this adapter's configuration.
    pub(crate) fn fs_failed(&self, function: &'static str, path: &Path, source: io::Error) -> FsFunctionFailed {
        FsFunctionFailed {
            function,
            path: path.to_path_buf(),
            root: self.config.root.clone(),
            file_permissions: self.config.file_permissions,
            directory_permissions: self.config.directory_permissions,
            scan_mode: self.config.scan_mode,
            source,
        }
    }

    /// Create the collection directory holding `path` if it is missing.
    pub(crate) fn ensure_collection_dir(&self, path: &Path) -> Result<(), FsFunctionFailed> {
        let dir = match path.parent() {
            Some(dir) => dir,
            None => return Ok(()),
        };
        if dir.is_dir() {
            return Ok(());
        }

        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(self.config.directory_permissions);
        }
        builder
            .create(dir)
            .map_err(|e| self.fs_failed("create_dir", dir, e))?;

        // mode() is filtered by the umask
        set_mode(dir, self.config.directory_permissions).map_err(|e| self.fs_failed("chmod", dir, e))
    }

    /// Apply the configured file permission bits.
    pub(crate) fn apply_file_permissions(&self, path: &Path) -> Result<(), FsFunctionFailed> {
        set_mode(path, self.config.file_permissions).map_err(|e| self.fs_failed("chmod", path, e))
    }

    fn ensure_file(&self, path: &Path) -> Result<(), FsFunctionFailed> {
        if path.exists() {
            return Ok(());
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| self.fs_failed("touch", path, e))?;
        self.apply_file_permissions(path)
    }

    fn write_in_place(&self, path: &Path, payload: &[u8]) -> Result<(), FsFunctionFailed> {
        self.ensure_collection_dir(path)?;
        self.ensure_file(path)?;
        fs::write(path, payload).map_err(|e| self.fs_failed("write", path, e))
    }

    /// Read and decode one document file.
    pub(crate) fn read_path(&self, collection: &str, id: &DocumentId, path: &Path) -> AdapterResult<Document> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(AdapterError::not_found(collection, id).with_source(self.fs_failed("read", path, e)));
            }
            Err(e) => return Err(AdapterError::io(self.fs_failed("read", path, e))),
        };
        self.codec.decode(&bytes)
    }

    /// Document file names in a collection directory, in scan order.
    fn scan(&self, dir: PathBuf) -> AdapterResult<Box<dyn Iterator<Item = AdapterResult<PathBuf>> + '_>> {
        match self.config.scan_mode {
            ScanMode::Directory => {
                let entries = fs::read_dir(&dir).map_err(|e| AdapterError::io(self.fs_failed("read_dir", &dir, e)))?;
                Ok(Box::new(entries.filter_map(move |entry| match entry {
                    Ok(entry) => {
                        let path = entry.path();
                        if is_document_file(&path) && path.is_file() {
                            Some(Ok(path))
                        } else {
                            None
                        }
                    }
                    Err(e) => Some(Err(AdapterError::io(self.fs_failed("read_dir", &dir, e)))),
                })))
            }
            ScanMode::Glob => {
                let mut matches = Vec::new();
                let entries = fs::read_dir(&dir).map_err(|e| AdapterError::io(self.fs_failed("read_dir", &dir, e)))?;
                for entry in entries {
                    let entry = entry.map_err(|e| AdapterError::io(self.fs_failed("read_dir", &dir, e)))?;
                    let name = entry.file_name();
                    if self.matcher.is_match(&name) && !is_hidden(&entry.path()) {
                        matches.push(entry.path());
                    }
                }
                matches.sort();
                Ok(Box::new(matches.into_iter().map(Ok)))
            }
        }
    }
}

impl StorageAdapter for FileAdapter {
    fn write(&self, collection: &str, id: &DocumentId, data: &Document) -> AdapterResult<()> {
        let payload = self
            .codec
            .encode(data)
            .map_err(|e| AdapterError::write_failed(collection, id).with_source(e))?;
        let path = self.document_path(collection, id)?;

        self.write_in_place(&path, &payload)
            .map_err(|e| AdapterError::write_failed(collection, id).with_source(e))?;

        log_event(Event::DocumentWritten, &[("collection", collection), ("id", id.as_str())]);
        Ok(())
    }

    fn read(&self, collection: &str, id: &DocumentId) -> AdapterResult<Document> {
        self.read_path(collection, id, &self.document_path(collection, id)?)
    }

    fn has(&self, collection: &str, id: &DocumentId) -> AdapterResult<bool> {
        let path = self.document_path(collection, id)?;
        match fs::metadata(&path) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AdapterError::io(self.fs_failed("stat", &path, e))),
        }
    }

    fn delete(&self, collection: &str, id: &DocumentId) -> AdapterResult<()> {
        let path = self.document_path(collection, id)?;
        fs::remove_file(&path).map_err(|e| {
            AdapterError::delete_failed(collection, id).with_source(self.fs_failed("remove_file", &path, e))
        })?;

        log_event(Event::DocumentDeleted, &[("collection", collection), ("id", id.as_str())]);
        Ok(())
    }

    fn read_all<'a>(
        &'a self,
        collection: &str,
        filter: &'a dyn DocumentFilter,
    ) -> AdapterResult<DocumentIter<'a>> {
        let dir = self.collection_path(collection)?;
        if !dir.is_dir() {
            return Err(AdapterError::collection_not_found(collection));
        }

        let collection = collection.to_string();
        let files = self.scan(dir)?;
        Ok(Box::new(files.filter_map(move |path| {
            let path = match path {
                Ok(path) => path,
                Err(e) => return Some(Err(e)),
            };
            let id = document_id_of(&path)?;
            match self.read_path(&collection, &id, &path) {
                Ok(document) if filter.includes(&id, &document) => Some(Ok((id, document))),
                Ok(_) => None,
                // Removed between listing and reading
                Err(e) if e.is_not_found() => None,
                Err(e) => Some(Err(e)),
            }
        })))
    }

    fn list_collections(&self) -> AdapterResult<CollectionIter<'_>> {
        let root = &self.config.root;
        let entries = fs::read_dir(root).map_err(|e| AdapterError::io(self.fs_failed("read_dir", root, e)))?;
        Ok(Box::new(entries.filter_map(move |entry| match entry {
            Ok(entry) => {
                let path = entry.path();
                if !path.is_dir() {
                    return None;
                }
                entry.file_name().into_string().ok().map(Ok)
            }
            Err(e) => Some(Err(AdapterError::io(self.fs_failed("read_dir", root, e)))),
        })))
    }
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map_or(true, |name| name.starts_with('.'))
}

/// Visible `*.db.json` file; temp files and tombstones carry a longer suffix.
fn is_document_file(path: &Path) -> bool {
    !is_hidden(path)
        && path
            .file_name()
            .and_then(|name| name.to_str())
            .map_or(false, |name| name.ends_with(FILE_EXTENSION))
}

fn document_id_of(path: &Path) -> Option<DocumentId> {
    let name = path.file_name()?.to_str()?;
    name.strip_suffix(FILE_EXTENSION).map(DocumentId::from)
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::{AcceptAll, ErrorKind, FieldEquals};
    use serde_json::json;
    use tempfile::TempDir;

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_layout_uses_normalized_names() {
        let temp = TempDir::new().unwrap();
        let adapter = FileAdapter::new(temp.path()).unwrap();
        let path = adapter.document_path("My Users", &DocumentId::from("Ann Smith")).unwrap();
        assert!(path.ends_with("my_users/ann_smith.db.json"));
    }

    #[test]
    fn test_unsafe_names_are_refused_before_touching_disk() {
        let outer = TempDir::new().unwrap();
        let root = outer.path().join("root");
        fs::create_dir(&root).unwrap();
        let adapter = FileAdapter::new(&root).unwrap();

        for collection in ["..", ".", "", "!!!", " .. "] {
            let err = adapter.write(collection, &DocumentId::from("x"), &doc(json!({"v": 1}))).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NormalizationFailed);
            assert_eq!(err.collection(), Some(collection));
        }
        for id in ["!!!", "..", ".", ".hidden"] {
            let id = DocumentId::from(id);
            let err = adapter.write("c", &id, &doc(json!({"v": 1}))).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NormalizationFailed);
            assert_eq!(err.id(), Some(&id));
            assert_eq!(adapter.has("c", &id).unwrap_err().kind(), ErrorKind::NormalizationFailed);
        }

        assert!(!outer.path().join("x.db.json").exists());
        assert_eq!(fs::read_dir(outer.path()).unwrap().count(), 1);
        assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_root_fails_initialization() {
        let temp = TempDir::new().unwrap();
        let err = FileAdapter::new(temp.path().join("nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AdapterInitializationFailed);
        assert_eq!(err.fs_failure().map(|f| f.function), Some("canonicalize"));
    }

    #[test]
    fn test_write_creates_collection_directory() {
        let temp = TempDir::new().unwrap();
        let adapter = FileAdapter::new(temp.path()).unwrap();
        adapter.write("users", &DocumentId::from(1), &doc(json!({"a": 1}))).unwrap();
        assert!(temp.path().join("users").is_dir());
        assert!(temp.path().join("users/1.db.json").is_file());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_bits_applied() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let config = FileAdapterConfig::new(temp.path())
            .with_file_permissions(0o600)
            .with_directory_permissions(0o700);
        let adapter = FileAdapter::with_config(config).unwrap();
        adapter.write("c", &DocumentId::from("x"), &Document::new()).unwrap();

        let dir_mode = fs::metadata(temp.path().join("c")).unwrap().permissions().mode();
        let file_mode = fs::metadata(temp.path().join("c/x.db.json")).unwrap().permissions().mode();
        assert_eq!(dir_mode & 0o7777, 0o700);
        assert_eq!(file_mode & 0o7777, 0o600);
    }

    #[test]
    fn test_delete_missing_is_delete_failed_with_context() {
        let temp = TempDir::new().unwrap();
        let adapter = FileAdapter::new(temp.path()).unwrap();
        let err = adapter.delete("users", &DocumentId::from(9)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeleteFailed);
        let fs = err.fs_failure().unwrap();
        assert_eq!(fs.function, "remove_file");
        assert_eq!(fs.root, adapter.root());
    }

    #[test]
    fn test_read_all_skips_foreign_and_hidden_files() {
        let temp = TempDir::new().unwrap();
        let adapter = FileAdapter::new(temp.path()).unwrap();
        adapter.write("c", &DocumentId::from(1), &doc(json!({"v": 1}))).unwrap();
        fs::write(temp.path().join("c/.hidden.db.json"), b"{}").unwrap();
        fs::write(temp.path().join("c/notes.txt"), b"x").unwrap();
        fs::write(temp.path().join("c/1.db.json.__write__.abcdef"), b"{\"v\"").unwrap();

        let ids: Vec<DocumentId> = adapter
            .read_all("c", &AcceptAll)
            .unwrap()
            .map(|r| r.unwrap().0)
            .collect();
        assert_eq!(ids, vec![DocumentId::from(1)]);
    }

    #[test]
    fn test_read_all_applies_filter() {
        let temp = TempDir::new().unwrap();
        let config = FileAdapterConfig::new(temp.path()).with_scan_mode(ScanMode::Glob);
        let adapter = FileAdapter::with_config(config).unwrap();
        adapter.write("c", &DocumentId::from(1), &doc(json!({"type": "foo"}))).unwrap();
        adapter.write("c", &DocumentId::from(2), &doc(json!({"type": "bar"}))).unwrap();

        let filter = FieldEquals::new("type", "bar");
        let found: Vec<_> = adapter.read_all("c", &filter).unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, DocumentId::from(2));
    }

    #[test]
    fn test_read_all_unknown_collection_is_not_found() {
        let temp = TempDir::new().unwrap();
        let adapter = FileAdapter::new(temp.path()).unwrap();
        let err = adapter.read_all("ghost", &AcceptAll).err().unwrap();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_malformed_file_is_normalization_failure() {
        let temp = TempDir::new().unwrap();
        let adapter = FileAdapter::new(temp.path()).unwrap();
        fs::create_dir(temp.path().join("c")).unwrap();
        fs::write(temp.path().join("c/bad.db.json"), b"{\"a\":").unwrap();
        let err = adapter.read("c", &DocumentId::from("bad")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NormalizationFailed);
    }
}
