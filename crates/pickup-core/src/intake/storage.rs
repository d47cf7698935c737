//! Storage key derivation and persistence of accepted uploads.
//!
//! Keys follow `{unixMillis}_{requesterId}_{sanitizedName}`. Consumers reading
//! the storage root rely on this layout, so it is part of the public contract.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{AcceptedFile, UploadCandidate};
use crate::error::IntakeError;

/// Requester label used when no identity is supplied.
///
/// Audit information only; nothing in the pipeline derives trust from it.
pub const ANONYMOUS: &str = "anonymous";

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Build a storage key for an upload received at `timestamp_millis`.
pub fn storage_key(
    timestamp_millis: i64,
    requester_id: Option<&str>,
    original_name: &str,
) -> String {
    let requester = match requester_id.map(str::trim) {
        Some(id) if !id.is_empty() => sanitize_name(id),
        _ => ANONYMOUS.to_string(),
    };
    format!("{}_{}_{}", timestamp_millis, requester, sanitize_name(original_name))
}

/// Names accepted uploads and writes them under the storage root.
#[derive(Debug, Clone)]
pub struct StorageNamer {
    root: PathBuf,
}

impl StorageNamer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the storage root if it does not exist yet.
    ///
    /// Safe to call repeatedly and from concurrent tasks.
    pub async fn ensure_root(&self) -> Result<(), IntakeError> {
        match fs::create_dir_all(&self.root).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists && self.root.is_dir() => Ok(()),
            Err(source) => Err(IntakeError::StorageRoot {
                path: self.root.display().to_string(),
                source,
            }),
        }
    }

    /// Assign a storage key to `candidate` and write its bytes.
    ///
    /// Never overwrites an existing file: a key collision surfaces as
    /// [`IntakeError::PersistenceFailed`]. No retries are attempted here.
    pub async fn name_and_persist(
        &self,
        candidate: &UploadCandidate,
        requester_id: Option<&str>,
    ) -> Result<AcceptedFile, IntakeError> {
        self.ensure_root().await?;

        let key = storage_key(
            Utc::now().timestamp_millis(),
            requester_id,
            &candidate.original_name,
        );
        let path = self.root.join(&key);

        debug!(key = %key, size = candidate.bytes.len(), "Persisting upload");

        if let Err(source) = write_new(&path, &candidate.bytes).await {
            warn!(key = %key, error = %source, "Failed to persist upload");
            return Err(IntakeError::PersistenceFailed { key, source });
        }

        Ok(AcceptedFile {
            key,
            path,
            mime_type: candidate.mime_type.clone(),
            original_name: candidate.original_name.clone(),
            size: candidate.size(),
        })
    }
}

async fn write_new(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let written = async {
        file.write_all(data).await?;
        file.sync_all().await
    }
    .await;

    if written.is_err() {
        drop(file);
        let _ = fs::remove_file(path).await;
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn key_is_clean(key: &str) -> bool {
        key.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("ordine 12.pdf"), "ordine_12.pdf");
        assert_eq!(sanitize_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_name("ritiro-è.pdf"), "ritiro-_.pdf");
    }

    #[test]
    fn test_storage_key_layout() {
        assert_eq!(
            storage_key(1_700_000_000_123, Some("user42"), "scan 1.pdf"),
            "1700000000123_user42_scan_1.pdf"
        );
        assert_eq!(
            storage_key(5, None, "a.pdf"),
            "5_anonymous_a.pdf"
        );
        assert_eq!(storage_key(5, Some("  "), "a.pdf"), "5_anonymous_a.pdf");
    }

    #[test]
    fn test_storage_key_sanitizes_requester() {
        let key = storage_key(1, Some("mario.rossi@example.com"), "x/y.pdf");
        assert_eq!(key, "1_mario.rossi_example.com_x_y.pdf");
        assert!(key_is_clean(&key));
    }

    #[tokio::test]
    async fn test_persist_writes_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let namer = StorageNamer::new(dir.path().join("uploads"));
        let candidate =
            UploadCandidate::new(b"%PDF-1.4".to_vec(), "application/pdf", "ordine 7.pdf");

        let accepted = namer.name_and_persist(&candidate, Some("op-1")).await.unwrap();

        assert!(accepted.key.ends_with("_op-1_ordine_7.pdf"));
        assert!(key_is_clean(&accepted.key));
        assert_eq!(accepted.size, 8);
        assert_eq!(std::fs::read(&accepted.path).unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_ensure_root_is_idempotent_under_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let namer = StorageNamer::new(dir.path().join("a").join("b"));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let namer = namer.clone();
                tokio::spawn(async move { namer.ensure_root().await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert!(namer.root().is_dir());
    }

    #[tokio::test]
    async fn test_persist_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let namer = StorageNamer::new(&blocker);
        let candidate = UploadCandidate::new(vec![1, 2, 3], "image/png", "p.png");

        let err = namer.name_and_persist(&candidate, None).await.unwrap_err();
        assert!(matches!(err, IntakeError::StorageRoot { .. }));
    }

    #[tokio::test]
    async fn test_existing_file_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("taken");
        std::fs::write(&path, b"original").unwrap();

        let err = write_new(&path, b"new").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read(&path).unwrap(), b"original");
    }
}
