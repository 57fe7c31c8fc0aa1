//! Upload staging for the share gateway.
//!
//! Incoming uploads are never written straight onto the remote share. The HTTP layer streams
//! the request body into a local staging area first; the gateway then copies the staged file to
//! its destination and discards the staged copy whether or not the copy succeeded.
//!
//! ## Design Principles
//!
//! - Staged files live under a single staging directory owned by the process
//! - Each staged file gets a random name; the client-supplied filename is metadata only
//! - Content is hashed (SHA-256) and media-sniffed while it streams in
//! - Staged files are single-use: consuming them for an upload discards them
//!
//! ```text
//! <staging_dir>/
//! ├── 3f1c…e2.part      # upload in progress or awaiting copy
//! └── 9a07…41.part
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use share_files::StagingService;
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), share_files::FilesError> {
//! let staging = StagingService::new(Path::new("gateway_data/staging"))?;
//! let mut writer = staging.begin("manual.pdf").await?;
//! writer.write_chunk(b"%PDF-1.7").await?;
//! let staged = writer.finish().await?;
//! assert_eq!(staged.metadata().size_bytes, 8);
//! staged.discard().await?;
//! # Ok(())
//! # }
//! ```

mod constants;
mod staging;

pub use constants::STAGING_EXTENSION;
pub use staging::{sanitise_filename, StagedFile, StagedFileMetadata, StagingService, StagingWriter};

/// Errors that can occur during staging operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Staging directory does not exist and could not be created, or is not a directory
    #[error("Invalid staging directory: {0}")]
    InvalidStagingDirectory(String),

    /// Filename validation failed (empty, traversal, or otherwise unsafe)
    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
