//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the gateway. Nothing
//! in the request path reads process-wide environment variables; binaries call
//! [`config_from_env`] (or build a [`CoreConfig`] directly, as tests do) and share the result
//! behind an `Arc`.

use crate::constants::{
    AREAS_FILENAME, AUDIT_FILENAME, DEFAULT_AUDIT_CAPACITY, DEFAULT_DATA_DIR,
    DEFAULT_REMOTE_TIMEOUT_SECS, DEFAULT_SESSION_TTL_SECS, DEFAULT_SHARE_HOST, SHARE_SEPARATOR,
    STAGING_DIR_NAME,
};
use crate::{GatewayError, GatewayResult};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Where the remote share lives and how it is reached from this process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShareTarget {
    host: String,
    base_share: String,
    mount_root: Option<PathBuf>,
}

impl ShareTarget {
    /// Creates a share target.
    ///
    /// `host` may carry leading or trailing separators (`\\10.0.5.20`); they are stripped.
    /// `base_share` may be empty when areas sit directly below the host.
    pub fn new(
        host: impl AsRef<str>,
        base_share: impl AsRef<str>,
        mount_root: Option<PathBuf>,
    ) -> GatewayResult<Self> {
        let host = trim_separators(host.as_ref());
        if host.is_empty() {
            return Err(GatewayError::InvalidInput(
                "share host cannot be empty".into(),
            ));
        }

        Ok(Self {
            host: host.to_owned(),
            base_share: trim_separators(base_share.as_ref()).replace('/', "\\"),
            mount_root,
        })
    }

    /// A share that is already mounted at `mount_root`; the host is only used for addressing.
    pub fn mounted(host: impl AsRef<str>, mount_root: impl Into<PathBuf>) -> GatewayResult<Self> {
        Self::new(host, "", Some(mount_root.into()))
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_share(&self) -> &str {
        &self.base_share
    }

    pub fn mount_root(&self) -> Option<&Path> {
        self.mount_root.as_deref()
    }

    /// The share name passed to the session connector (`\\host\<share>`).
    ///
    /// This is the first segment of the base share, or `IPC$` when areas sit directly below
    /// the host.
    pub fn connect_share(&self) -> &str {
        self.base_share
            .split(SHARE_SEPARATOR)
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("IPC$")
    }
}

fn trim_separators(s: &str) -> &str {
    s.trim().trim_matches(|c| c == '\\' || c == '/')
}

/// Process-wide identity used to authenticate against the remote share.
#[derive(Clone, PartialEq, Eq)]
pub struct ShareCredentials {
    pub user: String,
    pub secret: String,
}

impl fmt::Debug for ShareCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShareCredentials")
            .field("user", &self.user)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// How share sessions are established.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthMode {
    /// Issue `net use` against the host (Windows file servers).
    NetUse,
    /// The share is mounted by the operating system; nothing to do.
    Mounted,
}

impl std::str::FromStr for AuthMode {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "net-use" | "netuse" => Ok(AuthMode::NetUse),
            "mounted" | "none" => Ok(AuthMode::Mounted),
            other => Err(GatewayError::InvalidInput(format!(
                "unknown share auth mode '{}' (expected net-use or mounted)",
                other
            ))),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    share: ShareTarget,
    credentials: Option<ShareCredentials>,
    auth_mode: AuthMode,
    data_dir: PathBuf,
    staging_dir: PathBuf,
    remote_timeout: Duration,
    session_ttl: Duration,
    treat_enumeration_failure_as_empty: bool,
    audit_capacity: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig` with default timeouts and policies.
    ///
    /// The staging directory defaults to `<data_dir>/staging`.
    pub fn new(share: ShareTarget, data_dir: PathBuf) -> Self {
        let auth_mode = if share.mount_root().is_some() {
            AuthMode::Mounted
        } else {
            default_auth_mode()
        };

        Self {
            staging_dir: data_dir.join(STAGING_DIR_NAME),
            share,
            credentials: None,
            auth_mode,
            data_dir,
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            treat_enumeration_failure_as_empty: true,
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<ShareCredentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    pub fn with_staging_dir(mut self, staging_dir: PathBuf) -> Self {
        self.staging_dir = staging_dir;
        self
    }

    pub fn with_remote_timeout(mut self, timeout: Duration) -> GatewayResult<Self> {
        if timeout.is_zero() {
            return Err(GatewayError::InvalidInput(
                "remote timeout must be greater than zero".into(),
            ));
        }
        self.remote_timeout = timeout;
        Ok(self)
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_enumeration_failure_as_empty(mut self, enabled: bool) -> Self {
        self.treat_enumeration_failure_as_empty = enabled;
        self
    }

    pub fn with_audit_capacity(mut self, capacity: usize) -> GatewayResult<Self> {
        if capacity == 0 {
            return Err(GatewayError::InvalidInput(
                "audit capacity must be at least 1".into(),
            ));
        }
        self.audit_capacity = capacity;
        Ok(self)
    }

    pub fn share(&self) -> &ShareTarget {
        &self.share
    }

    pub fn credentials(&self) -> Option<&ShareCredentials> {
        self.credentials.as_ref()
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.auth_mode
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn areas_path(&self) -> PathBuf {
        self.data_dir.join(AREAS_FILENAME)
    }

    pub fn audit_path(&self) -> PathBuf {
        self.data_dir.join(AUDIT_FILENAME)
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn remote_timeout(&self) -> Duration {
        self.remote_timeout
    }

    pub fn session_ttl(&self) -> Duration {
        self.session_ttl
    }

    pub fn treat_enumeration_failure_as_empty(&self) -> bool {
        self.treat_enumeration_failure_as_empty
    }

    pub fn audit_capacity(&self) -> usize {
        self.audit_capacity
    }
}

fn default_auth_mode() -> AuthMode {
    if cfg!(windows) {
        AuthMode::NetUse
    } else {
        AuthMode::Mounted
    }
}

/// Build a [`CoreConfig`] from the process environment.
///
/// Intended to be called once from a binary's `main`. Every variable is optional.
///
/// # Errors
///
/// Returns `GatewayError::InvalidInput` if a variable is present but malformed.
pub fn config_from_env() -> GatewayResult<CoreConfig> {
    let var = |name: &str| std::env::var(name).ok();

    let share = ShareTarget::new(
        var("SHARE_HOST").unwrap_or_else(|| DEFAULT_SHARE_HOST.into()),
        var("SHARE_BASE").unwrap_or_default(),
        path_from_env_value(var("SHARE_MOUNT_ROOT")),
    )?;

    let data_dir =
        path_from_env_value(var("GATEWAY_DATA_DIR")).unwrap_or_else(|| DEFAULT_DATA_DIR.into());

    let mut cfg = CoreConfig::new(share, data_dir)
        .with_credentials(credentials_from_env_values(
            var("SHARE_USER"),
            var("SHARE_PASSWORD"),
        ))
        .with_remote_timeout(duration_from_env_value(
            "SHARE_TIMEOUT_SECS",
            var("SHARE_TIMEOUT_SECS"),
            Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
        )?)?
        .with_session_ttl(duration_from_env_value(
            "SHARE_SESSION_TTL_SECS",
            var("SHARE_SESSION_TTL_SECS"),
            Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
        )?)
        .with_enumeration_failure_as_empty(bool_from_env_value(
            "GATEWAY_EMPTY_ON_ENUM_FAILURE",
            var("GATEWAY_EMPTY_ON_ENUM_FAILURE"),
            true,
        )?)
        .with_audit_capacity(usize_from_env_value(
            "GATEWAY_AUDIT_CAPACITY",
            var("GATEWAY_AUDIT_CAPACITY"),
            DEFAULT_AUDIT_CAPACITY,
        )?)?;

    if let Some(mode) = non_empty(var("SHARE_AUTH_MODE")) {
        cfg = cfg.with_auth_mode(mode.parse()?);
    }
    if let Some(staging) = path_from_env_value(var("GATEWAY_STAGING_DIR")) {
        cfg = cfg.with_staging_dir(staging);
    }

    Ok(cfg)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an optional path value; empty values count as unset.
pub fn path_from_env_value(value: Option<String>) -> Option<PathBuf> {
    non_empty(value).map(PathBuf::from)
}

/// Parse a whole number of seconds, falling back to `default` when unset.
pub fn duration_from_env_value(
    name: &str,
    value: Option<String>,
    default: Duration,
) -> GatewayResult<Duration> {
    match non_empty(value) {
        None => Ok(default),
        Some(v) => v.parse::<u64>().map(Duration::from_secs).map_err(|_| {
            GatewayError::InvalidInput(format!("{} must be a whole number of seconds", name))
        }),
    }
}

/// Parse a boolean flag (`true/false`, `1/0`, `yes/no`), falling back to `default` when unset.
pub fn bool_from_env_value(name: &str, value: Option<String>, default: bool) -> GatewayResult<bool> {
    match non_empty(value).map(|v| v.to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(GatewayError::InvalidInput(format!(
                "{} must be true or false",
                name
            ))),
        },
    }
}

/// Parse a non-negative integer, falling back to `default` when unset.
pub fn usize_from_env_value(name: &str, value: Option<String>, default: usize) -> GatewayResult<usize> {
    match non_empty(value) {
        None => Ok(default),
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| GatewayError::InvalidInput(format!("{} must be a whole number", name))),
    }
}

/// Credentials are only used when a user is configured; a missing password means empty.
pub fn credentials_from_env_values(
    user: Option<String>,
    secret: Option<String>,
) -> Option<ShareCredentials> {
    non_empty(user).map(|user| ShareCredentials {
        user,
        secret: secret.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_target_strips_separators() {
        let share = ShareTarget::new("\\\\10.0.5.20\\", "/docs/", None).unwrap();
        assert_eq!(share.host(), "10.0.5.20");
        assert_eq!(share.base_share(), "docs");
        assert_eq!(share.connect_share(), "docs");
    }

    #[test]
    fn share_target_without_base_connects_to_ipc() {
        let share = ShareTarget::new("fileserver", "", None).unwrap();
        assert_eq!(share.connect_share(), "IPC$");
    }

    #[test]
    fn share_target_rejects_empty_host() {
        assert!(matches!(
            ShareTarget::new("\\\\", "", None),
            Err(GatewayError::InvalidInput(_))
        ));
    }

    #[test]
    fn mounted_share_defaults_to_mounted_auth() {
        let share = ShareTarget::mounted("10.0.5.20", "/mnt/share").unwrap();
        let cfg = CoreConfig::new(share, PathBuf::from("data"));
        assert_eq!(cfg.auth_mode(), AuthMode::Mounted);
        assert_eq!(cfg.staging_dir(), PathBuf::from("data").join(STAGING_DIR_NAME));
        assert_eq!(cfg.areas_path(), PathBuf::from("data").join(AREAS_FILENAME));
        assert!(cfg.treat_enumeration_failure_as_empty());
        assert_eq!(cfg.audit_capacity(), DEFAULT_AUDIT_CAPACITY);
    }

    #[test]
    fn credentials_debug_redacts_secret() {
        let creds = credentials_from_env_values(Some("svc_docs".into()), Some("hunter2".into()))
            .unwrap();
        let rendered = format!("{:?}", creds);
        assert!(rendered.contains("svc_docs"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn credentials_require_user() {
        assert!(credentials_from_env_values(None, Some("x".into())).is_none());
        assert!(credentials_from_env_values(Some("  ".into()), None).is_none());
    }

    #[test]
    fn duration_parsing() {
        let d = Duration::from_secs(30);
        assert_eq!(duration_from_env_value("T", None, d).unwrap(), d);
        assert_eq!(
            duration_from_env_value("T", Some(" 5 ".into()), d).unwrap(),
            Duration::from_secs(5)
        );
        assert!(duration_from_env_value("T", Some("5s".into()), d).is_err());
    }

    #[test]
    fn zero_remote_timeout_is_rejected() {
        let target = ShareTarget::new("10.0.5.20", "", None).unwrap();
        let cfg = CoreConfig::new(target, PathBuf::from("gateway_data"));
        assert!(matches!(
            cfg.clone().with_remote_timeout(Duration::ZERO),
            Err(GatewayError::InvalidInput(_))
        ));
        assert_eq!(
            cfg.with_remote_timeout(Duration::from_secs(5))
                .unwrap()
                .remote_timeout(),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn bool_parsing() {
        assert!(bool_from_env_value("B", None, true).unwrap());
        assert!(!bool_from_env_value("B", Some("FALSE".into()), true).unwrap());
        assert!(bool_from_env_value("B", Some("1".into()), false).unwrap());
        assert!(bool_from_env_value("B", Some("maybe".into()), false).is_err());
    }

    #[test]
    fn zero_audit_capacity_is_rejected() {
        let share = ShareTarget::mounted("h", "/mnt").unwrap();
        assert!(CoreConfig::new(share, PathBuf::from("d"))
            .with_audit_capacity(0)
            .is_err());
    }

    #[test]
    fn auth_mode_parsing() {
        assert_eq!("net-use".parse::<AuthMode>().unwrap(), AuthMode::NetUse);
        assert_eq!("Mounted".parse::<AuthMode>().unwrap(), AuthMode::Mounted);
        assert!("kerberos".parse::<AuthMode>().is_err());
    }
}
