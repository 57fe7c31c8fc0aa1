/// Extension given to files while they sit in the staging area.
pub const STAGING_EXTENSION: &str = "part";

/// Number of leading bytes kept in memory for media type sniffing.
pub(crate) const SNIFF_LEN: usize = 8192;
