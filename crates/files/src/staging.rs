//! Staging area implementation
//!
//! This module provides [`StagingService`], which owns the local directory where uploads are
//! buffered before the gateway copies them onto the remote share, and the [`StagingWriter`] /
//! [`StagedFile`] pair that represents one upload moving through it.
//!
//! # Lifecycle
//!
//! ```text
//! begin(filename) ──► StagingWriter ──write_chunk()*──► finish() ──► StagedFile ──► discard()
//!                          │
//!                          └──── abort() (request failed mid-stream)
//! ```
//!
//! # Security Model
//!
//! - The staging directory is canonicalised once at construction
//! - Staged paths are generated (`<uuid>.part`); client filenames never become paths here
//! - Client filenames are reduced to a single safe segment before they are recorded

use crate::constants::SNIFF_LEN;
use crate::{FilesError, STAGING_EXTENSION};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use share_types::NonEmptyText;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Metadata for a staged upload
///
/// Everything the gateway knows about an upload before it reaches the remote share. The
/// digest and media type are computed while the bytes stream in.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StagedFileMetadata {
    /// Hashing algorithm used (always "sha256" for current implementation)
    pub hash_algorithm: NonEmptyText,

    /// Hexadecimal digest of the file content
    pub hash: String,

    /// Size of the file in bytes
    pub size_bytes: u64,

    /// Detected media type (MIME type), if available
    ///
    /// This is a best-effort detection and should not be considered authoritative.
    pub media_type: Option<NonEmptyText>,

    /// Filename supplied by the client, reduced to its final segment
    pub original_filename: NonEmptyText,

    /// UTC timestamp when staging completed
    pub staged_at: DateTime<Utc>,
}

/// Service owning the staging directory
#[derive(Debug, Clone)]
pub struct StagingService {
    staging_dir: PathBuf,
}

impl StagingService {
    /// Creates a `StagingService`, creating the staging directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidStagingDirectory` if:
    /// - the directory cannot be created,
    /// - the path exists but is not a directory,
    /// - path canonicalisation fails.
    pub fn new(staging_dir: &Path) -> Result<Self, FilesError> {
        std::fs::create_dir_all(staging_dir).map_err(|e| {
            FilesError::InvalidStagingDirectory(format!(
                "Cannot create {}: {}",
                staging_dir.display(),
                e
            ))
        })?;

        if !staging_dir.is_dir() {
            return Err(FilesError::InvalidStagingDirectory(format!(
                "Path is not a directory: {}",
                staging_dir.display()
            )));
        }

        let staging_dir = staging_dir.canonicalize().map_err(|e| {
            FilesError::InvalidStagingDirectory(format!(
                "Cannot canonicalize path {}: {}",
                staging_dir.display(),
                e
            ))
        })?;

        Ok(Self { staging_dir })
    }

    /// Returns the canonicalised staging directory.
    #[must_use]
    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Opens a new staged file for an upload named `original_filename`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidFilename` if the filename is unusable, or `FilesError::Io` if
    /// the staged file cannot be created.
    pub async fn begin(&self, original_filename: &str) -> Result<StagingWriter, FilesError> {
        let original_filename = sanitise_filename(original_filename)?;
        let path = self.staging_dir.join(format!(
            "{}.{}",
            uuid::Uuid::new_v4().simple(),
            STAGING_EXTENSION
        ));

        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create staged file {}: {}", path.display(), e),
                ))
            })?;

        Ok(StagingWriter {
            file,
            path,
            hasher: Sha256::new(),
            size_bytes: 0,
            head: Vec::new(),
            original_filename,
        })
    }

    /// Removes staged files older than `max_age`.
    ///
    /// Leftovers come from requests that died mid-stream or from a crash between staging and
    /// discard. Returns the number of files removed.
    pub async fn purge_stale(&self, max_age: Duration) -> Result<usize, FilesError> {
        let now = SystemTime::now();
        let mut removed = 0;
        let mut entries = fs::read_dir(&self.staging_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(STAGING_EXTENSION) {
                continue;
            }

            let modified = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified,
                Err(_) => continue,
            };

            let age = now.duration_since(modified).unwrap_or_default();
            if age >= max_age {
                match fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) => tracing::warn!("failed to purge staged file {}: {}", path.display(), e),
                }
            }
        }

        Ok(removed)
    }
}

/// An upload being streamed into the staging area
#[derive(Debug)]
pub struct StagingWriter {
    file: fs::File,
    path: PathBuf,
    hasher: Sha256,
    size_bytes: u64,
    head: Vec<u8>,
    original_filename: NonEmptyText,
}

impl StagingWriter {
    /// Appends a chunk of the upload.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), FilesError> {
        self.file.write_all(chunk).await.map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write staged file {}: {}", self.path.display(), e),
            ))
        })?;

        self.hasher.update(chunk);
        self.size_bytes += chunk.len() as u64;

        if self.head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - self.head.len()).min(chunk.len());
            self.head.extend_from_slice(&chunk[..take]);
        }

        Ok(())
    }

    /// Flushes the staged file and returns it with its metadata.
    pub async fn finish(mut self) -> Result<StagedFile, FilesError> {
        if let Err(e) = self.file.flush().await {
            let _ = fs::remove_file(&self.path).await;
            return Err(FilesError::Io(e));
        }
        drop(self.file);

        let media_type = infer::get(&self.head)
            .and_then(|kind| NonEmptyText::new(kind.mime_type()).ok());

        Ok(StagedFile {
            path: self.path,
            metadata: StagedFileMetadata {
                hash_algorithm: NonEmptyText::new("sha256").expect("sha256 is non-empty"),
                hash: hex::encode(self.hasher.finalize()),
                size_bytes: self.size_bytes,
                media_type,
                original_filename: self.original_filename,
                staged_at: Utc::now(),
            },
        })
    }

    /// Abandons the upload and removes the partial staged file.
    pub async fn abort(self) {
        drop(self.file);
        if let Err(e) = fs::remove_file(&self.path).await {
            tracing::warn!("failed to remove aborted upload {}: {}", self.path.display(), e);
        }
    }
}

/// A completed upload waiting in the staging area
#[derive(Debug)]
pub struct StagedFile {
    path: PathBuf,
    metadata: StagedFileMetadata,
}

impl StagedFile {
    /// Path of the staged bytes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn metadata(&self) -> &StagedFileMetadata {
        &self.metadata
    }

    /// Deletes the staged bytes. A file that is already gone counts as discarded.
    pub async fn discard(self) -> Result<(), FilesError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to discard staged file {}: {}", self.path.display(), e),
            ))),
        }
    }
}

/// Reduces a client-supplied filename to a single safe path segment.
///
/// Browsers occasionally send a full client path (`C:\fakepath\report.pdf`); only the final
/// segment is kept. The result must be non-empty, must not be `.` or `..`, and must not
/// contain control characters.
pub fn sanitise_filename(input: &str) -> Result<NonEmptyText, FilesError> {
    let last = input.rsplit(['/', '\\']).next().unwrap_or("").trim();

    if last == "." || last == ".." {
        return Err(FilesError::InvalidFilename(format!(
            "'{}' is not a file name",
            input
        )));
    }

    if last.chars().any(char::is_control) {
        return Err(FilesError::InvalidFilename(
            "file name contains control characters".into(),
        ));
    }

    NonEmptyText::new(last)
        .map_err(|_| FilesError::InvalidFilename(format!("'{}' has no file name", input)))
}
