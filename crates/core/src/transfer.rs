//! Writes to and reads from the share: folder creation, uploads, downloads.

use crate::audit::AuditAction;
use crate::paths::validate_entry_name;
use crate::{Cancellation, GatewayError, GatewayResult, GatewayService};
use share_files::StagedFile;
use std::io::{self, Read, Write};
use std::path::Path;

const COPY_CHUNK_BYTES: usize = 1024 * 1024;

/// An opened remote file ready to be streamed to a client.
#[derive(Debug)]
pub struct Download {
    pub file: tokio::fs::File,
    pub size: u64,
    pub filename: String,
}

impl GatewayService {
    /// Creates `name` inside `subpath` of the area.
    ///
    /// # Errors
    ///
    /// - `Conflict` if the folder already exists,
    /// - `NotFound` if the parent directory does not exist,
    /// - `InvalidInput` if `name` is not a single path segment.
    pub async fn create_folder(
        &self,
        area_id: &str,
        subpath: &str,
        name: &str,
        user: &str,
    ) -> GatewayResult<()> {
        let name = validate_entry_name(name)?;
        let parent = self.resolve_path(area_id, subpath).await?;
        let address = parent.child(&name);
        let path = address.to_fs_path(self.config().share());

        tracing::info!(area = area_id, address = %address, "creating folder");

        match self
            .remote_mutation(&address, move |_| std::fs::create_dir(&path))
            .await?
        {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(GatewayError::Conflict { address });
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(GatewayError::NotFound { address: parent });
            }
            Err(source) => return Err(GatewayError::Io { address, source }),
        }

        self.audit_log()
            .record(area_id, user, AuditAction::FolderCreate, name.as_str())
            .await?;
        Ok(())
    }

    /// Copies a staged upload into `subpath` of the area, creating missing directories.
    ///
    /// The staged file is discarded whatever the outcome. An existing file with the same name
    /// is overwritten.
    pub async fn upload(
        &self,
        area_id: &str,
        subpath: &str,
        staged: StagedFile,
        user: &str,
    ) -> GatewayResult<()> {
        let placed = self.place_staged(area_id, subpath, &staged).await;

        if let Err(e) = staged.discard().await {
            tracing::warn!("{}", e);
        }

        let filename = placed?;
        self.audit_log()
            .record(area_id, user, AuditAction::Upload, &filename)
            .await?;
        Ok(())
    }

    async fn place_staged(
        &self,
        area_id: &str,
        subpath: &str,
        staged: &StagedFile,
    ) -> GatewayResult<String> {
        let name = validate_entry_name(staged.metadata().original_filename.as_str())?;
        let dir_address = self.resolve_path(area_id, subpath).await?;
        let address = dir_address.child(&name);

        let share = self.config().share();
        let dir = dir_address.to_fs_path(share);
        let dest = address.to_fs_path(share);
        let src = staged.path().to_path_buf();
        let part = dir.join(part_name(&src));

        tracing::info!(
            area = area_id,
            address = %address,
            size_bytes = staged.metadata().size_bytes,
            sha256 = %staged.metadata().hash,
            "uploading"
        );

        match self
            .remote_mutation(&address, move |cancellation| {
                place_file(&dir, &src, &part, &dest, cancellation)
            })
            .await?
        {
            Ok(_) => Ok(name.into_string()),
            Err(source) => Err(GatewayError::Io { address, source }),
        }
    }

    /// Opens the file at `relative_path` of the area for streaming.
    ///
    /// Missing files, directories, and unreadable files are all `NotFound`.
    pub async fn download(&self, area_id: &str, relative_path: &str) -> GatewayResult<Download> {
        let address = self.resolve_path(area_id, relative_path).await?;
        let path = address.to_fs_path(self.config().share());

        tracing::info!(area = area_id, address = %address, "download");

        match self.remote(&address, || open_regular_file(&path)).await? {
            Ok((file, size)) => Ok(Download {
                file,
                size,
                filename: address.segments().last().cloned().unwrap_or_default(),
            }),
            Err(e) => {
                tracing::warn!(address = %address, "download unavailable: {}", e);
                Err(GatewayError::NotFound { address })
            }
        }
    }
}

/// Hidden while in flight: listings skip names starting with `~`.
fn part_name(staged: &Path) -> String {
    let stem = staged
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("~{}.part", stem)
}

/// Copies `src` next to `dest` under `part`, then renames it into place.
///
/// The part file is removed on any failure, so `dest` is either untouched or complete.
fn place_file(
    dir: &Path,
    src: &Path,
    part: &Path,
    dest: &Path,
    cancellation: &Cancellation,
) -> io::Result<u64> {
    std::fs::create_dir_all(dir)?;
    let placed = copy_to_part(src, part, cancellation).and_then(|copied| {
        cancellation.check()?;
        std::fs::rename(part, dest)?;
        Ok(copied)
    });
    if placed.is_err() {
        if let Err(e) = std::fs::remove_file(part) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(part = %part.display(), "failed to remove partial upload: {}", e);
            }
        }
    }
    placed
}

fn copy_to_part(src: &Path, part: &Path, cancellation: &Cancellation) -> io::Result<u64> {
    let mut reader = std::fs::File::open(src)?;
    let mut writer = std::fs::File::create(part)?;
    let mut buf = vec![0u8; COPY_CHUNK_BYTES];
    let mut copied = 0u64;
    loop {
        cancellation.check()?;
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(&buf[..n])?;
        copied += n as u64;
    }
    writer.sync_all()?;
    Ok(copied)
}

async fn open_regular_file(path: &Path) -> io::Result<(tokio::fs::File, u64)> {
    let file = tokio::fs::File::open(path).await?;
    let metadata = file.metadata().await?;
    if metadata.is_dir() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "is a directory"));
    }
    Ok((file, metadata.len()))
}
