// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Uploads sent as base64 or data URLs.

use base64ct::{Base64, Encoding};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::{MarketError, MarketResult};
use crate::storage::files::{ensure_safe_segment, extension_for};
use crate::storage::{FileStore, StorageError, StoredFile};

/// Bucket holding recharge payment screenshots.
pub const SCREENSHOT_BUCKET: &str = "recharge-screenshots";

const DEFAULT_CONTENT_TYPE: &str = "image/jpeg";

#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// `data:<type>;base64,<payload>` or bare base64.
    pub file_data: String,
    pub file_name: Option<String>,
    pub bucket: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UploadedFile {
    pub url: String,
    pub file_name: String,
    pub bucket: String,
    pub content_type: String,
    pub size: usize,
}

/// Decoded upload payload.
#[derive(Debug, PartialEq)]
pub struct DecodedData {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Decode a data URL or bare base64 string. Bare payloads are assumed to
/// be JPEG.
pub fn decode_file_data(file_data: &str) -> MarketResult<DecodedData> {
    let trimmed = file_data.trim();
    let (content_type, payload) = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (meta, payload) = rest
                .split_once(',')
                .ok_or_else(|| MarketError::validation("Malformed data URL"))?;
            let content_type = meta
                .strip_suffix(";base64")
                .ok_or_else(|| MarketError::validation("Data URL must be base64 encoded"))?;
            let content_type = if content_type.is_empty() {
                DEFAULT_CONTENT_TYPE
            } else {
                content_type
            };
            (content_type.to_ascii_lowercase(), payload)
        }
        None => (DEFAULT_CONTENT_TYPE.to_string(), trimmed),
    };

    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if payload.is_empty() {
        return Err(MarketError::validation("File data is empty"));
    }
    let bytes = Base64::decode_vec(&payload)
        .map_err(|_| MarketError::validation("File data is not valid base64"))?;
    Ok(DecodedData {
        bytes,
        content_type,
    })
}

/// Store an upload and return its public URL.
///
/// Without a `file_name` one is generated as `{owner}_{millis}_{nonce}.{ext}`,
/// unique even for uploads from one owner in the same millisecond. An
/// explicit name that already exists is a conflict; stored files are never
/// overwritten.
pub fn upload_file(
    files: &FileStore,
    base_url: &str,
    owner_id: &str,
    request: UploadRequest,
    now: DateTime<Utc>,
) -> MarketResult<UploadedFile> {
    let bucket = request.bucket.trim().to_string();
    ensure_safe_segment(&bucket)?;
    let decoded = decode_file_data(&request.file_data)?;

    let file_name = match request.file_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => format!(
            "{owner_id}_{}_{}.{}",
            now.timestamp_millis(),
            uuid::Uuid::new_v4().simple(),
            extension_for(&decoded.content_type)
        ),
    };

    files
        .save_upload(&bucket, &file_name, &decoded.bytes)
        .map_err(|e| match e {
            StorageError::AlreadyExists(_) => {
                MarketError::conflict(format!("File {file_name} already exists"))
            }
            other => other.into(),
        })?;
    tracing::info!(
        owner_id = %owner_id,
        bucket = %bucket,
        file_name = %file_name,
        size = decoded.bytes.len(),
        "File uploaded"
    );

    Ok(UploadedFile {
        url: public_url(base_url, &bucket, &file_name),
        size: decoded.bytes.len(),
        content_type: decoded.content_type,
        file_name,
        bucket,
    })
}

pub fn get_file(files: &FileStore, bucket: &str, name: &str) -> MarketResult<StoredFile> {
    Ok(files.read_upload(bucket, name)?)
}

pub fn public_url(base_url: &str, bucket: &str, name: &str) -> String {
    format!("{}/files/{bucket}/{name}", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{StorageError, StoragePaths};
    use tempfile::TempDir;

    fn store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let mut files = FileStore::new(StoragePaths::new(dir.path()));
        files.initialize().unwrap();
        (dir, files)
    }

    fn request(data: &str, name: Option<&str>) -> UploadRequest {
        UploadRequest {
            file_data: data.to_string(),
            file_name: name.map(str::to_string),
            bucket: "avatars".to_string(),
        }
    }

    #[test]
    fn decodes_data_urls_and_bare_base64() {
        let png = decode_file_data("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(png.bytes, b"hello");
        assert_eq!(png.content_type, "image/png");

        let bare = decode_file_data("aGVs\nbG8=").unwrap();
        assert_eq!(bare.content_type, "image/jpeg");
        assert_eq!(bare.bytes, b"hello");

        assert!(decode_file_data("data:image/png,hello").is_err());
        assert!(decode_file_data("not base64!").is_err());
        assert!(decode_file_data("").is_err());
    }

    #[test]
    fn upload_generates_name_and_url() {
        let (_dir, files) = store();
        let now = Utc::now();
        let uploaded = upload_file(
            &files,
            "https://market.example/",
            "user-1",
            request("data:image/png;base64,aGVsbG8=", None),
            now,
        )
        .unwrap();

        let prefix = format!("user-1_{}_", now.timestamp_millis());
        assert!(uploaded.file_name.starts_with(&prefix));
        assert!(uploaded.file_name.ends_with(".png"));
        assert_eq!(
            uploaded.url,
            format!("https://market.example/files/avatars/{}", uploaded.file_name)
        );
        let stored = get_file(&files, "avatars", &uploaded.file_name).unwrap();
        assert_eq!(stored.bytes, b"hello");
        assert_eq!(stored.content_type, "image/png");
    }

    #[test]
    fn explicit_name_cannot_overwrite() {
        let (_dir, files) = store();
        upload_file(&files, "http://x", "u", request("aGVsbG8=", Some("a.jpg")), Utc::now()).unwrap();
        let err = upload_file(&files, "http://x", "u", request("aGVsbG8=", Some("a.jpg")), Utc::now())
            .unwrap_err();
        assert!(matches!(err, MarketError::Conflict(_)));
    }

    #[test]
    fn same_millisecond_uploads_keep_their_own_bytes() {
        let (_dir, files) = store();
        let now = Utc::now();
        let first = upload_file(&files, "http://x", "u", request("Zmlyc3Q=", None), now).unwrap();
        let second = upload_file(&files, "http://x", "u", request("c2Vjb25k", None), now).unwrap();

        assert_ne!(first.url, second.url);
        assert_eq!(get_file(&files, "avatars", &first.file_name).unwrap().bytes, b"first");
        assert_eq!(get_file(&files, "avatars", &second.file_name).unwrap().bytes, b"second");
    }

    #[test]
    fn unsafe_bucket_is_rejected() {
        let (_dir, files) = store();
        let mut bad = request("aGVsbG8=", None);
        bad.bucket = "../etc".to_string();
        let err = upload_file(&files, "http://x", "u", bad, Utc::now()).unwrap_err();
        assert!(matches!(err, MarketError::Storage(StorageError::InvalidName(_))));
    }
}
