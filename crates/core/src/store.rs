//! Whole-document JSON persistence for the registry and the audit log.
//!
//! Each document is a JSON array read fully into memory and written fully back. Writes go to a
//! sibling `.tmp` file first and are renamed over the target, so a crash mid-write never leaves
//! a truncated document behind. Callers serialise their read-modify-write cycles themselves.

use crate::{GatewayError, GatewayResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;

/// Reads a persisted list. Returns `Ok(None)` if the document does not exist yet.
pub(crate) async fn read_list<T: DeserializeOwned>(path: &Path) -> GatewayResult<Option<Vec<T>>> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(GatewayError::Storage {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| GatewayError::Deserialization {
            path: path.to_path_buf(),
            source,
        })
}

/// Atomically replaces the persisted list at `path`.
pub(crate) async fn write_list<T: Serialize>(path: &Path, items: &[T]) -> GatewayResult<()> {
    let storage_err = |source| GatewayError::Storage {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await.map_err(storage_err)?;
    }

    let json = serde_json::to_vec_pretty(items).map_err(GatewayError::Serialization)?;
    let temp_path = path.with_extension("json.tmp");

    fs::write(&temp_path, json).await.map_err(storage_err)?;
    fs::rename(&temp_path, path).await.map_err(storage_err)?;

    Ok(())
}
