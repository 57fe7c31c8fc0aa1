//! Directory listing.
//!
//! Children are stat'd one by one. Network shares often hold individually inaccessible entries
//! (locked files, denied ACLs); such an entry is still surfaced, as a folder with placeholder
//! date and size, so the browsed tree never looks incomplete.

use crate::constants::{FILE_TYPE, FOLDER_TYPE, NO_SIZE, UNKNOWN_DATE};
use crate::paths::relative_path;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Names created by the filesystem or the shell that are never shown.
const SYSTEM_VOLUME_INFORMATION: &str = "System Volume Information";
const THUMBNAIL_CACHES: &[&str] = &["thumbs.db", "ehthumbs.db", "ehthumbs_vista.db"];

/// One child of a listed directory.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub id: usize,
    pub name: String,
    pub date: String,
    pub size: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub relative_path: String,
}

impl FileEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == FOLDER_TYPE
    }
}

pub fn is_system_artifact(name: &str) -> bool {
    name.starts_with('$')
        || name.starts_with('~')
        || name.eq_ignore_ascii_case(SYSTEM_VOLUME_INFORMATION)
        || THUMBNAIL_CACHES
            .iter()
            .any(|cache| name.eq_ignore_ascii_case(cache))
}

/// `FOLDER` for directories, otherwise the uppercase extension, or `FILE` without one.
///
/// A leading dot does not start an extension (`.env` is a `FILE`).
pub fn classify(name: &str, is_dir: bool) -> String {
    if is_dir {
        return FOLDER_TYPE.to_owned();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_uppercase(),
        _ => FILE_TYPE.to_owned(),
    }
}

/// Size in mebibytes with two decimals, e.g. `2.50 MB`.
pub fn human_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

pub fn format_date(modified: SystemTime) -> String {
    DateTime::<Utc>::from(modified).format("%Y-%m-%d").to_string()
}

/// Folders first, then by name (byte-wise).
pub fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });
}

/// Names of the immediate children of `dir`.
pub(crate) async fn enumerate(dir: &Path) -> io::Result<Vec<String>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

/// Builds the sorted entries for `names` found in `dir`.
///
/// `subpath` is the normalised subpath of `dir` inside its area and prefixes every
/// `relativePath`. Each stat is bounded by `stat_timeout`; a timed-out stat counts as a
/// metadata failure.
pub(crate) async fn describe(
    dir: &Path,
    subpath: &[String],
    names: Vec<String>,
    stat_timeout: Duration,
) -> Vec<FileEntry> {
    let mut entries = Vec::with_capacity(names.len());

    for name in names.into_iter().filter(|n| !is_system_artifact(n)) {
        let path = dir.join(&name);
        let metadata = match tokio::time::timeout(stat_timeout, tokio::fs::metadata(&path)).await {
            Ok(Ok(metadata)) => Some(metadata),
            Ok(Err(e)) => {
                tracing::warn!(entry = %path.display(), "metadata unavailable: {}", e);
                None
            }
            Err(_) => {
                tracing::warn!(entry = %path.display(), "metadata read timed out");
                None
            }
        };

        let (date, size, kind) = match metadata {
            Some(md) if md.is_dir() => (
                md.modified().map(format_date).unwrap_or_else(|_| UNKNOWN_DATE.to_owned()),
                NO_SIZE.to_owned(),
                classify(&name, true),
            ),
            Some(md) => (
                md.modified().map(format_date).unwrap_or_else(|_| UNKNOWN_DATE.to_owned()),
                human_size(md.len()),
                classify(&name, false),
            ),
            None => (
                UNKNOWN_DATE.to_owned(),
                NO_SIZE.to_owned(),
                FOLDER_TYPE.to_owned(),
            ),
        };

        entries.push(FileEntry {
            id: 0,
            relative_path: relative_path(subpath, &name),
            name,
            date,
            size,
            kind,
        });
    }

    sort_entries(&mut entries);
    for (id, entry) in entries.iter_mut().enumerate() {
        entry.id = id;
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(name: &str, kind: &str) -> FileEntry {
        FileEntry {
            id: 0,
            name: name.into(),
            date: UNKNOWN_DATE.into(),
            size: NO_SIZE.into(),
            kind: kind.into(),
            relative_path: name.into(),
        }
    }

    #[test]
    fn filters_system_artifacts() {
        assert!(is_system_artifact("$RECYCLE.BIN"));
        assert!(is_system_artifact("~$informe.docx"));
        assert!(is_system_artifact("System Volume Information"));
        assert!(is_system_artifact("Thumbs.db"));
        assert!(is_system_artifact("THUMBS.DB"));
        assert!(is_system_artifact("ehthumbs_vista.db"));
        assert!(!is_system_artifact("informe.docx"));
        assert!(!is_system_artifact("thumbs.db.bak"));
    }

    #[test]
    fn classifies_by_extension() {
        assert_eq!(classify("reportes", true), "FOLDER");
        assert_eq!(classify("manual.pdf", false), "PDF");
        assert_eq!(classify("datos.tar.gz", false), "GZ");
        assert_eq!(classify("LEEME", false), "FILE");
        assert_eq!(classify(".env", false), "FILE");
        assert_eq!(classify("trailing.", false), "FILE");
    }

    #[test]
    fn formats_sizes_in_megabytes() {
        assert_eq!(human_size(0), "0.00 MB");
        assert_eq!(human_size(2_621_440), "2.50 MB");
        assert_eq!(human_size(1_048_576 * 1024), "1024.00 MB");
    }

    #[test]
    fn folders_sort_before_files() {
        let mut entries = vec![
            entry("b.txt", "TXT"),
            entry("zeta", "FOLDER"),
            entry("a.txt", "TXT"),
            entry("Alpha", "FOLDER"),
        ];
        sort_entries(&mut entries);

        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "zeta", "a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn describes_directory_contents() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("reportes")).unwrap();
        std::fs::write(dir.path().join("manual.pdf"), vec![0u8; 2_621_440]).unwrap();
        std::fs::write(dir.path().join("Thumbs.db"), b"x").unwrap();

        let names = enumerate(dir.path()).await.unwrap();
        let subpath = vec!["docs".to_owned()];
        let entries = describe(dir.path(), &subpath, names, Duration::from_secs(5)).await;

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, 0);
        assert_eq!(entries[0].name, "reportes");
        assert_eq!(entries[0].kind, "FOLDER");
        assert_eq!(entries[0].size, "-");
        assert_eq!(entries[0].relative_path, "docs\\reportes");
        assert_eq!(entries[1].id, 1);
        assert_eq!(entries[1].name, "manual.pdf");
        assert_eq!(entries[1].kind, "PDF");
        assert_eq!(entries[1].size, "2.50 MB");
        assert_eq!(entries[1].date.len(), "YYYY-MM-DD".len());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn unreadable_entry_falls_back_to_folder() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(dir.path().join("missing"), dir.path().join("locked.xlsx"))
            .unwrap();

        let names = enumerate(dir.path()).await.unwrap();
        let entries = describe(dir.path(), &[], names, Duration::from_secs(5)).await;

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "locked.xlsx");
        assert_eq!(entries[0].kind, "FOLDER");
        assert_eq!(entries[0].date, "---");
        assert_eq!(entries[0].size, "-");
    }

    #[test]
    fn serialises_with_client_field_names() {
        let json = serde_json::to_value(entry("manual.pdf", "PDF")).unwrap();
        assert_eq!(json["type"], "PDF");
        assert_eq!(json["relativePath"], "manual.pdf");
        assert!(json.get("kind").is_none());
    }
}
