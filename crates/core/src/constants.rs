//! Constants used throughout the gateway core crate.

/// Separator used in remote share addresses.
pub const SHARE_SEPARATOR: char = '\\';

/// Default remote file-server host.
pub const DEFAULT_SHARE_HOST: &str = "10.0.5.20";

/// Default directory for the persisted registry and audit log.
pub const DEFAULT_DATA_DIR: &str = "gateway_data";

/// Staging subdirectory created under the data directory unless overridden.
pub const STAGING_DIR_NAME: &str = "staging";

/// Filename of the persisted area registry.
pub const AREAS_FILENAME: &str = "areas.json";

/// Filename of the persisted audit log.
pub const AUDIT_FILENAME: &str = "audit.json";

/// Maximum number of audit entries retained.
pub const DEFAULT_AUDIT_CAPACITY: usize = 500;

/// Default timeout, in seconds, for every remote-filesystem call.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 30;

/// Default lifetime, in seconds, of an authenticated share session.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 600;

/// Placeholder used for dates and sizes that could not be read.
pub const UNKNOWN_DATE: &str = "---";
pub const NO_SIZE: &str = "-";

/// Type reported for directories (and for entries whose metadata could not be read).
pub const FOLDER_TYPE: &str = "FOLDER";

/// Type reported for files without an extension.
pub const FILE_TYPE: &str = "FILE";

/// Icon given to areas created without one.
pub const DEFAULT_AREA_ICON: &str = "📁";

/// Literal values a client sends when it serialises an absent path.
pub const ABSENT_PATH_LITERALS: &[&str] = &["undefined", "null"];
