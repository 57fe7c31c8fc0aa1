//! Remote share sessions.
//!
//! Before touching the share the gateway makes sure an authenticated session to the host
//! exists. Sessions are cached per host for a configurable lifetime; a connect is only issued
//! when there is no fresh session, or after the caller invalidates one because the share
//! rejected a call as unauthorised.
//!
//! Establishing a session is best-effort: a failed connect is logged and reported as
//! [`SessionStatus::Failed`], never raised. Callers observe it through the filesystem call that
//! follows, and use the status to tell "upstream unavailable" apart from "not found".

use crate::config::{AuthMode, ShareCredentials, ShareTarget};
use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Establishes an authenticated connection to a share host.
#[async_trait]
pub trait ShareConnector: Send + Sync + fmt::Debug {
    async fn connect(
        &self,
        share: &ShareTarget,
        credentials: Option<&ShareCredentials>,
    ) -> io::Result<()>;
}

/// Connector for shares mounted by the operating system. Nothing to establish.
#[derive(Debug, Default, Clone, Copy)]
pub struct MountedShareConnector;

#[async_trait]
impl ShareConnector for MountedShareConnector {
    async fn connect(&self, _: &ShareTarget, _: Option<&ShareCredentials>) -> io::Result<()> {
        Ok(())
    }
}

/// Connector issuing `net use \\host\share <secret> /user:<user> /persistent:no`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NetUseConnector;

/// `net use` error for "multiple connections to a server by the same user": already connected.
const NET_USE_ALREADY_CONNECTED: &str = "1219";

#[async_trait]
impl ShareConnector for NetUseConnector {
    async fn connect(
        &self,
        share: &ShareTarget,
        credentials: Option<&ShareCredentials>,
    ) -> io::Result<()> {
        let target = format!("\\\\{}\\{}", share.host(), share.connect_share());

        let mut cmd = tokio::process::Command::new("net");
        cmd.arg("use").arg(&target);
        if let Some(creds) = credentials {
            cmd.arg(&creds.secret).arg(format!("/user:{}", creds.user));
        }
        cmd.arg("/persistent:no").kill_on_drop(true);

        let output = cmd.output().await?;
        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains(NET_USE_ALREADY_CONNECTED) {
            return Ok(());
        }

        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("net use {} failed: {}", target, stderr.trim()),
        ))
    }
}

/// Connector matching the configured auth mode.
pub fn connector_for(mode: AuthMode) -> Arc<dyn ShareConnector> {
    match mode {
        AuthMode::NetUse => Arc::new(NetUseConnector),
        AuthMode::Mounted => Arc::new(MountedShareConnector),
    }
}

/// Result of [`SessionManager::ensure_access`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// A fresh session was established by this call.
    Connected,
    /// An unexpired session was reused.
    Cached,
    /// Connecting failed; the reason is kept for diagnostics.
    Failed(String),
}

impl SessionStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, SessionStatus::Failed(_))
    }
}

/// Per-host cache of authenticated sessions.
#[derive(Debug)]
pub struct SessionManager {
    connector: Arc<dyn ShareConnector>,
    ttl: Duration,
    connect_timeout: Duration,
    sessions: Mutex<HashMap<String, Instant>>,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn ShareConnector>, ttl: Duration, connect_timeout: Duration) -> Self {
        Self {
            connector,
            ttl,
            connect_timeout,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Makes sure a session to the share host exists, connecting if needed.
    pub async fn ensure_access(
        &self,
        share: &ShareTarget,
        credentials: Option<&ShareCredentials>,
    ) -> SessionStatus {
        let key = session_key(share);
        // Held across the connect so concurrent requests do not all connect at once.
        let mut sessions = self.sessions.lock().await;

        if let Some(established) = sessions.get(&key) {
            if established.elapsed() < self.ttl {
                return SessionStatus::Cached;
            }
            tracing::debug!(host = %share.host(), "share session expired");
        }

        let outcome = tokio::time::timeout(
            self.connect_timeout,
            self.connector.connect(share, credentials),
        )
        .await;

        match outcome {
            Ok(Ok(())) => {
                sessions.insert(key, Instant::now());
                tracing::info!(host = %share.host(), "share session established");
                SessionStatus::Connected
            }
            Ok(Err(e)) => {
                sessions.remove(&key);
                tracing::warn!(host = %share.host(), "share session connect failed: {}", e);
                SessionStatus::Failed(e.to_string())
            }
            Err(_) => {
                sessions.remove(&key);
                let reason = format!(
                    "connect timed out after {}s",
                    self.connect_timeout.as_secs_f32()
                );
                tracing::warn!(host = %share.host(), "share session {}", reason);
                SessionStatus::Failed(reason)
            }
        }
    }

    /// Forgets the session to the share host so the next access reconnects.
    pub async fn invalidate(&self, share: &ShareTarget) {
        self.sessions.lock().await.remove(&session_key(share));
    }
}

fn session_key(share: &ShareTarget) -> String {
    share.host().to_ascii_lowercase()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Connector that counts calls and fails while `failing` is set.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingConnector {
        pub calls: AtomicUsize,
        pub failing: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl ShareConnector for RecordingConnector {
        async fn connect(&self, _: &ShareTarget, _: Option<&ShareCredentials>) -> io::Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                Err(io::Error::new(io::ErrorKind::PermissionDenied, "logon failure"))
            } else {
                Ok(())
            }
        }
    }

    #[derive(Debug)]
    struct HangingConnector;

    #[async_trait]
    impl ShareConnector for HangingConnector {
        async fn connect(&self, _: &ShareTarget, _: Option<&ShareCredentials>) -> io::Result<()> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    fn share() -> ShareTarget {
        ShareTarget::new("10.0.5.20", "", None).unwrap()
    }

    #[tokio::test]
    async fn session_is_reused_within_ttl() {
        let connector = Arc::new(RecordingConnector::default());
        let manager = SessionManager::new(
            connector.clone(),
            Duration::from_secs(600),
            Duration::from_secs(5),
        );

        assert_eq!(manager.ensure_access(&share(), None).await, SessionStatus::Connected);
        assert_eq!(manager.ensure_access(&share(), None).await, SessionStatus::Cached);
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn session_expires_after_ttl() {
        let connector = Arc::new(RecordingConnector::default());
        let manager = SessionManager::new(
            connector.clone(),
            Duration::from_secs(60),
            Duration::from_secs(5),
        );

        manager.ensure_access(&share(), None).await;
        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(manager.ensure_access(&share(), None).await, SessionStatus::Connected);
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_reconnect() {
        let connector = Arc::new(RecordingConnector::default());
        let manager = SessionManager::new(
            connector.clone(),
            Duration::from_secs(600),
            Duration::from_secs(5),
        );

        manager.ensure_access(&share(), None).await;
        manager.invalidate(&share()).await;
        assert_eq!(manager.ensure_access(&share(), None).await, SessionStatus::Connected);
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failures_are_reported_not_cached() {
        let connector = Arc::new(RecordingConnector::default());
        connector.failing.store(true, Ordering::SeqCst);
        let manager = SessionManager::new(
            connector.clone(),
            Duration::from_secs(600),
            Duration::from_secs(5),
        );

        assert!(manager.ensure_access(&share(), None).await.is_failed());
        assert!(manager.ensure_access(&share(), None).await.is_failed());
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_connect_times_out() {
        let manager = SessionManager::new(
            Arc::new(HangingConnector),
            Duration::from_secs(600),
            Duration::from_secs(5),
        );

        let status = manager.ensure_access(&share(), None).await;
        assert!(matches!(status, SessionStatus::Failed(reason) if reason.contains("timed out")));
    }
}
