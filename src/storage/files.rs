// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Filesystem store for uploaded files and the audit log.
//!
//! Uploads live under `uploads/{bucket}/{name}`. Bucket and file names are
//! restricted to `[A-Za-z0-9._-]` (no leading dot) so a request can never
//! climb out of the uploads directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;

use super::StoragePaths;

/// Maximum accepted upload size.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("File too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },

    #[error("Storage not initialized")]
    NotInitialized,

    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),
}

impl From<io::Error> for StorageError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => StorageError::NotFound(e.to_string()),
            io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(e.to_string()),
            _ => StorageError::Io(e),
        }
    }
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A stored upload read back for serving.
#[derive(Debug)]
pub struct StoredFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

#[derive(Debug, Clone)]
pub struct FileStore {
    paths: StoragePaths,
    initialized: bool,
}

impl FileStore {
    /// Does NOT create the directory structure. Call `initialize()` first.
    pub fn new(paths: StoragePaths) -> Self {
        Self {
            paths,
            initialized: false,
        }
    }

    pub fn paths(&self) -> &StoragePaths {
        &self.paths
    }

    /// Create the data directories. Idempotent.
    pub fn initialize(&mut self) -> StorageResult<()> {
        for dir in [self.paths.uploads_dir(), self.paths.audit_dir()] {
            fs::create_dir_all(&dir)?;
        }
        self.initialized = true;
        Ok(())
    }

    /// Write-read-delete probe of the data directory.
    pub fn health_check(&self) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let test_file = self.paths.root().join(".health_check");
        let test_data = b"health_check_data";
        fs::write(&test_file, test_data)?;
        let read_data = fs::read(&test_file)?;
        fs::remove_file(&test_file)?;

        if read_data != test_data {
            return Err(StorageError::IntegrityViolation(
                "Health check data mismatch".to_string(),
            ));
        }
        Ok(())
    }

    /// Write raw bytes to a file that must not exist yet.
    ///
    /// The existence check and the create are one `O_EXCL` open, so two
    /// writers racing for the same path cannot both succeed. A write that
    /// fails after the create removes the partial file.
    pub fn write_new(&self, path: impl AsRef<Path>, data: &[u8]) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        if let Err(e) = file.write_all(data).and_then(|()| file.flush()) {
            drop(file);
            if let Err(cleanup) = fs::remove_file(path) {
                tracing::warn!(path = %path.display(), error = %cleanup, "Failed to remove partial upload");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Append one line (a trailing newline is added).
    pub fn append_line(&self, path: impl AsRef<Path>, line: &str) -> StorageResult<()> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    pub fn read_raw(&self, path: impl AsRef<Path>) -> StorageResult<Vec<u8>> {
        if !self.initialized {
            return Err(StorageError::NotInitialized);
        }

        let mut file = File::open(path.as_ref())?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(data)
    }

    // ========== Uploads ==========

    /// Store an upload under `bucket/name`. An existing file is never
    /// replaced: the call fails with [`StorageError::AlreadyExists`].
    pub fn save_upload(&self, bucket: &str, name: &str, data: &[u8]) -> StorageResult<()> {
        ensure_safe_segment(bucket)?;
        ensure_safe_segment(name)?;
        if data.len() > MAX_UPLOAD_BYTES {
            return Err(StorageError::TooLarge {
                size: data.len(),
                max: MAX_UPLOAD_BYTES,
            });
        }
        self.write_new(self.paths.upload_file(bucket, name), data)
    }

    pub fn read_upload(&self, bucket: &str, name: &str) -> StorageResult<StoredFile> {
        ensure_safe_segment(bucket)?;
        ensure_safe_segment(name)?;
        let bytes = self.read_raw(self.paths.upload_file(bucket, name))?;
        Ok(StoredFile {
            bytes,
            content_type: content_type_for(name),
        })
    }
}

/// Reject anything that is not a plain file or directory name.
pub fn ensure_safe_segment(segment: &str) -> StorageResult<()> {
    let valid = !segment.is_empty()
        && segment.len() <= 128
        && !segment.starts_with('.')
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(segment.to_string()))
    }
}

/// Content type derived from the file extension.
pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}

/// File extension for a content type (default `bin`).
pub fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "application/pdf" => "pdf",
        "text/plain" => "txt",
        _ => "bin",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, FileStore) {
        let temp = TempDir::new().unwrap();
        let mut store = FileStore::new(StoragePaths::new(temp.path()));
        store.initialize().unwrap();
        (temp, store)
    }

    #[test]
    fn initialize_creates_directories() {
        let (_temp, store) = test_store();
        assert!(store.paths().uploads_dir().exists());
        assert!(store.paths().audit_dir().exists());
        store.health_check().unwrap();
    }

    #[test]
    fn uninitialized_store_rejects_io() {
        let temp = TempDir::new().unwrap();
        let store = FileStore::new(StoragePaths::new(temp.path()));
        assert!(matches!(store.health_check(), Err(StorageError::NotInitialized)));
        assert!(matches!(
            store.write_new(temp.path().join("x"), b"x"),
            Err(StorageError::NotInitialized)
        ));
    }

    #[test]
    fn upload_round_trip_with_content_type() {
        let (_temp, store) = test_store();
        store.save_upload("uploads", "shot.png", b"\x89PNG").unwrap();
        let file = store.read_upload("uploads", "shot.png").unwrap();
        assert_eq!(file.bytes, b"\x89PNG");
        assert_eq!(file.content_type, "image/png");
    }

    #[test]
    fn existing_upload_is_never_replaced() {
        let (_temp, store) = test_store();
        store.save_upload("uploads", "shot.png", b"first").unwrap();
        assert!(matches!(
            store.save_upload("uploads", "shot.png", b"second"),
            Err(StorageError::AlreadyExists(_))
        ));
        assert_eq!(store.read_upload("uploads", "shot.png").unwrap().bytes, b"first");
    }

    #[test]
    fn unsafe_names_are_rejected() {
        let (_temp, store) = test_store();
        for name in ["../etc", ".hidden", "a/b", "", "x y"] {
            assert!(
                matches!(store.save_upload("b", name, b"x"), Err(StorageError::InvalidName(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn oversize_upload_is_rejected() {
        let (_temp, store) = test_store();
        let data = vec![0u8; MAX_UPLOAD_BYTES + 1];
        assert!(matches!(
            store.save_upload("b", "big.bin", &data),
            Err(StorageError::TooLarge { .. })
        ));
    }

    #[test]
    fn missing_upload_is_not_found() {
        let (_temp, store) = test_store();
        assert!(matches!(
            store.read_upload("b", "nope.jpg"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn append_line_accumulates() {
        let (_temp, store) = test_store();
        let path = store.paths().audit_events_file("2026-01-01");
        store.append_line(&path, "a").unwrap();
        store.append_line(&path, "b").unwrap();
        assert_eq!(store.read_raw(&path).unwrap(), b"a\nb\n");
    }
}
