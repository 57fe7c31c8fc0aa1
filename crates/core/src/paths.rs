//! Remote share address construction.
//!
//! Everything here is pure: addresses are built from configuration and client input without
//! touching the filesystem. An address has two renderings:
//!
//! - the UNC form `\\host\base\folder\sub\path`, used in logs and returned to clients when an
//!   operation fails, and
//! - the filesystem path actually opened, which is the UNC form itself or, when the share is
//!   mounted locally, the same segments joined below the mount root.

use crate::config::ShareTarget;
use crate::constants::{ABSENT_PATH_LITERALS, SHARE_SEPARATOR};
use crate::{GatewayError, GatewayResult};
use share_types::NonEmptyText;
use std::fmt;
use std::path::PathBuf;

/// A normalised address on the remote share.
///
/// Invariants: the UNC form starts with exactly two separators, contains no repeated
/// separators, and contains no `.` or `..` segments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RemoteShareAddress {
    unc: String,
    host: String,
    base: Vec<String>,
    segments: Vec<String>,
}

impl RemoteShareAddress {
    pub fn as_str(&self) -> &str {
        &self.unc
    }

    /// Segments below the base share (area folder followed by the subpath).
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The address of `name` inside this address. `name` must be a single validated segment.
    pub fn child(&self, name: &NonEmptyText) -> Self {
        let mut segments = self.segments.clone();
        segments.push(name.as_str().to_owned());
        Self::from_parts(self.host.clone(), self.base.clone(), segments)
    }

    /// The path handed to the filesystem for this address.
    pub fn to_fs_path(&self, share: &ShareTarget) -> PathBuf {
        match share.mount_root() {
            Some(root) => {
                let mut path = root.to_path_buf();
                path.extend(&self.segments);
                path
            }
            None => PathBuf::from(&self.unc),
        }
    }

    fn from_parts(host: String, base: Vec<String>, segments: Vec<String>) -> Self {
        let mut unc = String::from("\\\\");
        unc.push_str(&host);
        for seg in base.iter().chain(segments.iter()) {
            unc.push(SHARE_SEPARATOR);
            unc.push_str(seg);
        }

        Self {
            unc,
            host,
            base,
            segments,
        }
    }
}

impl fmt::Display for RemoteShareAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.unc)
    }
}

/// Splits a client-supplied path into clean segments.
///
/// Both `/` and `\` separate segments. Empty segments, `.` segments, and the literals
/// `undefined` / `null` (an absent value serialised by the client) are dropped.
///
/// # Errors
///
/// Returns `GatewayError::InvalidInput` if any segment is `..`.
pub fn split_segments(raw: &str) -> GatewayResult<Vec<String>> {
    let mut segments = Vec::new();

    for seg in raw.split(['/', '\\']) {
        if seg.is_empty() || seg == "." || ABSENT_PATH_LITERALS.contains(&seg) {
            continue;
        }
        if seg == ".." {
            return Err(GatewayError::InvalidInput(format!(
                "path '{}' escapes the area root",
                raw
            )));
        }
        segments.push(seg.to_owned());
    }

    Ok(segments)
}

/// Builds the address of `subpath` inside the area stored in `folder`.
///
/// # Errors
///
/// Returns `GatewayError::InvalidInput` if `subpath` or `folder` contain a `..` segment.
pub fn resolve_path(
    share: &ShareTarget,
    folder: &str,
    subpath: &str,
) -> GatewayResult<RemoteShareAddress> {
    let base = split_segments(share.base_share())?;
    let mut segments = split_segments(folder)?;
    segments.extend(split_segments(subpath)?);

    Ok(RemoteShareAddress::from_parts(
        share.host().to_owned(),
        base,
        segments,
    ))
}

/// The client-facing relative path of `name` inside `subpath`, joined with `\`.
pub fn relative_path(subpath: &[String], name: &str) -> String {
    let mut out = String::new();
    for seg in subpath {
        out.push_str(seg);
        out.push(SHARE_SEPARATOR);
    }
    out.push_str(name);
    out
}

/// Validates a folder name supplied by a client as a single path segment.
///
/// # Errors
///
/// Returns `GatewayError::InvalidInput` for empty names, names containing a separator or
/// control character, and the names `.` and `..`.
pub fn validate_entry_name(name: &str) -> GatewayResult<NonEmptyText> {
    let name = NonEmptyText::new(name)
        .map_err(|_| GatewayError::InvalidInput("name cannot be empty".into()))?;

    let s = name.as_str();
    if s == "." || s == ".." {
        return Err(GatewayError::InvalidInput(format!("'{}' is not a valid name", s)));
    }
    if s.contains(['/', '\\']) || s.chars().any(char::is_control) {
        return Err(GatewayError::InvalidInput(format!(
            "'{}' must not contain path separators or control characters",
            s
        )));
    }

    Ok(name)
}
