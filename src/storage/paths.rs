// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Storage path layout under the data directory.
//!
//! ```text
//! {DATA_DIR}/
//!   market.redb                 # users, posts, ledger, invitations, ...
//!   uploads/{bucket}/{name}     # recharge screenshots and uploaded files
//!   audit/{date}/events.jsonl   # daily audit logs
//! ```

use std::path::{Path, PathBuf};

/// Default data root.
pub const DEFAULT_DATA_ROOT: &str = "./data";

#[derive(Debug, Clone)]
pub struct StoragePaths {
    root: PathBuf,
}

impl Default for StoragePaths {
    fn default() -> Self {
        Self::new(DEFAULT_DATA_ROOT)
    }
}

impl StoragePaths {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The embedded database file.
    pub fn database_file(&self) -> PathBuf {
        self.root.join("market.redb")
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn bucket_dir(&self, bucket: &str) -> PathBuf {
        self.uploads_dir().join(bucket)
    }

    /// Callers validate `bucket` and `name` before building the path.
    pub fn upload_file(&self, bucket: &str, name: &str) -> PathBuf {
        self.bucket_dir(bucket).join(name)
    }

    pub fn audit_dir(&self) -> PathBuf {
        self.root.join("audit")
    }

    /// Directory for a specific date's audit logs.
    pub fn audit_date_dir(&self, date: &str) -> PathBuf {
        self.audit_dir().join(date)
    }

    /// Path to a daily audit events file (JSONL format).
    pub fn audit_events_file(&self, date: &str) -> PathBuf {
        self.audit_date_dir(date).join("events.jsonl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths_use_data_root() {
        let paths = StoragePaths::default();
        assert_eq!(paths.root(), Path::new("./data"));
        assert_eq!(paths.database_file(), PathBuf::from("./data/market.redb"));
    }

    #[test]
    fn upload_paths_are_correct() {
        let paths = StoragePaths::new("/tmp/test-data");
        assert_eq!(paths.uploads_dir(), PathBuf::from("/tmp/test-data/uploads"));
        assert_eq!(
            paths.upload_file("recharge-screenshots", "a.png"),
            PathBuf::from("/tmp/test-data/uploads/recharge-screenshots/a.png")
        );
    }

    #[test]
    fn audit_paths_are_correct() {
        let paths = StoragePaths::new("/srv");
        assert_eq!(paths.audit_dir(), PathBuf::from("/srv/audit"));
        assert_eq!(
            paths.audit_events_file("2026-01-28"),
            PathBuf::from("/srv/audit/2026-01-28/events.jsonl")
        );
    }
}
