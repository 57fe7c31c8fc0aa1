//! # Share Gateway Core
//!
//! Core logic of the remote share gateway: a keyed registry of organisational areas, each
//! mapped to a folder on a remote file-server share, and the operations performed inside
//! those folders on behalf of clients.
//!
//! - Area registry and audit log persisted as JSON documents under the data directory
//! - Path resolution from `(area, subpath)` to a normalised share address
//! - Authenticated share sessions, cached per host
//! - Directory listing, folder creation, uploads from the staging area, and downloads
//!
//! **No API concerns**: HTTP routing, multipart parsing and response shaping belong in
//! `api-rest` and `api-shared`.

pub mod areas;
pub mod audit;
pub mod config;
pub mod constants;
pub mod error;
pub mod listing;
pub mod paths;
pub mod session;
mod store;
pub mod transfer;

pub use areas::{AreaDescriptor, AreaRegistry, AreaSaveOutcome, AreaUpdate, NewArea};
pub use audit::{AuditAction, AuditLog, AuditLogEntry};
pub use config::{config_from_env, AuthMode, CoreConfig, ShareCredentials, ShareTarget};
pub use error::{GatewayError, GatewayResult};
pub use listing::FileEntry;
pub use paths::RemoteShareAddress;
pub use session::{ShareConnector, SessionManager, SessionStatus};
pub use transfer::Download;

use share_types::NonEmptyText;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Gateway operations over the configured share.
#[derive(Debug)]
pub struct GatewayService {
    cfg: Arc<CoreConfig>,
    areas: AreaRegistry,
    audit: AuditLog,
    sessions: SessionManager,
}

impl GatewayService {
    /// Creates a service connecting to the share the way `cfg.auth_mode()` dictates.
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        let connector = session::connector_for(cfg.auth_mode());
        Self::with_connector(cfg, connector)
    }

    pub fn with_connector(cfg: Arc<CoreConfig>, connector: Arc<dyn ShareConnector>) -> Self {
        Self {
            areas: AreaRegistry::new(cfg.areas_path()),
            audit: AuditLog::new(cfg.audit_path(), cfg.audit_capacity()),
            sessions: SessionManager::new(connector, cfg.session_ttl(), cfg.remote_timeout()),
            cfg,
        }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit
    }

    pub async fn areas(&self) -> GatewayResult<Vec<AreaDescriptor>> {
        self.areas.get_areas().await
    }

    /// Registers a new area and returns its id and whether it was created.
    ///
    /// An area whose id already exists is left untouched (`AlreadyExists`) and not audited.
    pub async fn create_area(
        &self,
        area: NewArea,
        user: &str,
    ) -> GatewayResult<(String, AreaSaveOutcome)> {
        let descriptor = area.into_descriptor()?;
        let id = descriptor.id.clone();
        let name = descriptor.name.clone();

        let outcome = self.areas.save_area(descriptor).await?;
        if outcome == AreaSaveOutcome::Created {
            self.audit
                .record(&id, user, AuditAction::AreaCreate, &name)
                .await?;
        }
        Ok((id, outcome))
    }

    pub async fn update_area(
        &self,
        area_id: &str,
        update: AreaUpdate,
        user: &str,
    ) -> GatewayResult<AreaDescriptor> {
        let updated = self.areas.update_area(area_id, update).await?;
        self.audit
            .record(area_id, user, AuditAction::AreaUpdate, &updated.name)
            .await?;
        Ok(updated)
    }

    pub async fn delete_area(&self, area_id: &str, user: &str) -> GatewayResult<AreaDescriptor> {
        let removed = self.areas.delete_area(area_id).await?;
        self.audit
            .record(area_id, user, AuditAction::AreaDelete, &removed.name)
            .await?;
        Ok(removed)
    }

    /// Checks `user` / `secret` against the credentials stored on the area.
    ///
    /// These are client-facing credentials only; the share session always uses the
    /// process-wide identity from [`CoreConfig::credentials`].
    pub async fn verify_area_credentials(
        &self,
        area_id: &str,
        user: &str,
        secret: &str,
    ) -> GatewayResult<bool> {
        let area = self
            .areas
            .find(area_id)
            .await?
            .ok_or_else(|| GatewayError::AreaNotFound(area_id.to_owned()))?;
        Ok(area.credentials_match(user, secret))
    }

    /// Address of `subpath` inside the area. Unregistered ids are used as the folder name.
    pub async fn resolve_path(
        &self,
        area_id: &str,
        subpath: &str,
    ) -> GatewayResult<RemoteShareAddress> {
        let area_id = NonEmptyText::new(area_id)
            .map_err(|_| GatewayError::InvalidInput("areaId is required".into()))?;
        let folder = self.areas.folder_for(area_id.as_str()).await?;
        paths::resolve_path(self.cfg.share(), &folder, subpath)
    }

    /// Lists the immediate children of `subpath` inside the area.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the directory does not exist or cannot be reached,
    /// - `DirectoryRead` if enumeration fails and the configuration surfaces such failures,
    /// - `UpstreamUnavailable` if the share does not answer in time.
    pub async fn list(&self, area_id: &str, subpath: &str) -> GatewayResult<Vec<FileEntry>> {
        let address = self.resolve_path(area_id, subpath).await?;
        let subpath_segments = paths::split_segments(subpath)?;
        let dir = address.to_fs_path(self.cfg.share());

        tracing::info!(area = area_id, address = %address, "listing");

        if let Err(e) = self.remote(&address, || tokio::fs::metadata(&dir)).await? {
            tracing::warn!(address = %address, "listing root unavailable: {}", e);
            return Err(GatewayError::NotFound { address });
        }

        let names = match self.remote(&address, || listing::enumerate(&dir)).await? {
            Ok(names) => names,
            Err(source) if self.cfg.treat_enumeration_failure_as_empty() => {
                tracing::warn!(address = %address, "enumeration failed, returning empty listing: {}", source);
                Vec::new()
            }
            Err(source) => return Err(GatewayError::DirectoryRead { address, source }),
        };

        Ok(listing::describe(&dir, &subpath_segments, names, self.cfg.remote_timeout()).await)
    }

    /// Runs one filesystem call against the share.
    ///
    /// Access is ensured first and the call is bounded by the remote timeout. A
    /// permission-denied failure on a cached session reconnects and repeats the call once.
    /// When the session could not be established, a failing call is reported as
    /// `UpstreamUnavailable`; otherwise the call's own result is handed back for the caller
    /// to classify.
    pub(crate) async fn remote<T, F, Fut>(
        &self,
        address: &RemoteShareAddress,
        op: F,
    ) -> GatewayResult<io::Result<T>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = io::Result<T>>,
    {
        self.with_access(address, move || self.bounded(address, op()))
            .await
    }

    /// Like [`Self::remote`], for calls that change the share.
    ///
    /// `op` runs on the blocking pool and is never abandoned. When the timeout elapses the
    /// [`Cancellation`] is raised and the call is awaited until it settles. A late failure is
    /// `UpstreamUnavailable` and leaves nothing behind on the share. A late success is returned
    /// as if it had finished in time, so the caller still records it.
    pub(crate) async fn remote_mutation<T, F>(
        &self,
        address: &RemoteShareAddress,
        op: F,
    ) -> GatewayResult<io::Result<T>>
    where
        F: Fn(&Cancellation) -> io::Result<T> + Clone + Send + 'static,
        T: Send + 'static,
    {
        self.with_access(address, move || self.settled(address, op.clone()))
            .await
    }

    async fn with_access<T, F, Fut>(
        &self,
        address: &RemoteShareAddress,
        attempt: F,
    ) -> GatewayResult<io::Result<T>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = GatewayResult<io::Result<T>>>,
    {
        let share = self.cfg.share();
        let credentials = self.cfg.credentials();

        let mut status = self.sessions.ensure_access(share, credentials).await;
        let mut result = attempt().await?;

        if matches!(&result, Err(e) if e.kind() == io::ErrorKind::PermissionDenied)
            && status == SessionStatus::Cached
        {
            tracing::info!(host = %share.host(), "access denied on cached session, reconnecting");
            self.sessions.invalidate(share).await;
            status = self.sessions.ensure_access(share, credentials).await;
            result = attempt().await?;
        }

        match (result, status) {
            (Err(e), SessionStatus::Failed(reason)) if e.kind() != io::ErrorKind::AlreadyExists => {
                Err(GatewayError::UpstreamUnavailable {
                    address: address.clone(),
                    reason: format!("{}; {}", reason, e),
                })
            }
            (result, _) => Ok(result),
        }
    }

    async fn bounded<T>(
        &self,
        address: &RemoteShareAddress,
        call: impl Future<Output = io::Result<T>>,
    ) -> GatewayResult<io::Result<T>> {
        let timeout = self.cfg.remote_timeout();
        tokio::time::timeout(timeout, call)
            .await
            .map_err(|_| self.timed_out(address))
    }

    async fn settled<T, F>(&self, address: &RemoteShareAddress, op: F) -> GatewayResult<io::Result<T>>
    where
        F: FnOnce(&Cancellation) -> io::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let cancellation = Cancellation::default();
        let mut task = tokio::task::spawn_blocking({
            let cancellation = cancellation.clone();
            move || op(&cancellation)
        });

        let joined = match tokio::time::timeout(self.cfg.remote_timeout(), &mut task).await {
            Ok(joined) => joined,
            Err(_) => {
                cancellation.cancel();
                let joined = task.await;
                if matches!(joined, Ok(Err(_)) | Err(_)) {
                    return Err(self.timed_out(address));
                }
                tracing::info!(address = %address, "late remote call completed");
                joined
            }
        };

        Ok(joined.unwrap_or_else(|e| Err(io::Error::other(e))))
    }

    fn timed_out(&self, address: &RemoteShareAddress) -> GatewayError {
        tracing::warn!(address = %address, "remote call timed out");
        GatewayError::UpstreamUnavailable {
            address: address.clone(),
            reason: format!(
                "no response within {}s",
                self.cfg.remote_timeout().as_secs_f32()
            ),
        }
    }
}

/// Raised when a share mutation outlives the remote timeout.
///
/// Mutations check it between steps and undo what they have written so far.
#[derive(Debug, Clone, Default)]
pub(crate) struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err` once cancelled.
    pub(crate) fn check(&self) -> io::Result<()> {
        if self.is_cancelled() {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "cancelled after timeout"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::RecordingConnector;
    use share_files::StagingService;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        share: TempDir,
        data: TempDir,
        service: GatewayService,
        staging: StagingService,
    }

    fn fixture_with(
        configure: impl FnOnce(CoreConfig) -> CoreConfig,
        connector: Arc<dyn ShareConnector>,
    ) -> Fixture {
        let share = TempDir::new().unwrap();
        let data = TempDir::new().unwrap();
        let target = ShareTarget::mounted("10.0.5.20", share.path()).unwrap();
        let cfg = configure(CoreConfig::new(target, data.path().to_path_buf()));
        let staging = StagingService::new(cfg.staging_dir()).unwrap();
        let service = GatewayService::with_connector(Arc::new(cfg), connector);
        Fixture {
            share,
            data,
            service,
            staging,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(|cfg| cfg, Arc::new(session::MountedShareConnector))
    }

    async fn stage(staging: &StagingService, filename: &str, bytes: &[u8]) -> share_files::StagedFile {
        let mut writer = staging.begin(filename).await.unwrap();
        writer.write_chunk(bytes).await.unwrap();
        writer.finish().await.unwrap()
    }

    #[tokio::test]
    async fn lists_area_folder() {
        let fx = fixture();
        let tics = fx.share.path().join("tics");
        std::fs::create_dir_all(tics.join("reportes")).unwrap();
        std::fs::write(tics.join("manual.pdf"), vec![0u8; 2_621_440]).unwrap();
        std::fs::write(tics.join("~$borrador.docx"), b"lock").unwrap();

        let entries = fx.service.list("tic", "").await.unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(
            (entries[0].name.as_str(), entries[0].kind.as_str(), entries[0].size.as_str()),
            ("reportes", "FOLDER", "-")
        );
        assert_eq!(
            (entries[1].name.as_str(), entries[1].kind.as_str(), entries[1].size.as_str()),
            ("manual.pdf", "PDF", "2.50 MB")
        );
    }

    #[tokio::test]
    async fn subpath_noise_is_normalised() {
        let fx = fixture();
        std::fs::create_dir_all(fx.share.path().join("tics/2025/enero")).unwrap();

        let clean = fx.service.resolve_path("tic", "2025/enero").await.unwrap();
        let noisy = fx.service.resolve_path("tic", "\\2025//enero/").await.unwrap();
        assert_eq!(clean, noisy);
        assert_eq!(clean.as_str(), "\\\\10.0.5.20\\tics\\2025\\enero");

        let entries = fx.service.list("tic", "2025").await.unwrap();
        assert_eq!(entries[0].relative_path, "2025\\enero");
        assert!(fx.service.list("tic", "undefined").await.is_ok());
    }

    #[tokio::test]
    async fn missing_root_is_not_found_with_address() {
        let fx = fixture();

        let err = fx.service.list("tic", "no-existe").await.unwrap_err();
        match err {
            GatewayError::NotFound { address } => {
                assert_eq!(address.as_str(), "\\\\10.0.5.20\\tics\\no-existe")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let fx = fixture();
        std::fs::create_dir_all(fx.share.path().join("tics")).unwrap();

        assert!(matches!(
            fx.service.list("tic", "../juridica").await,
            Err(GatewayError::InvalidInput(_))
        ));
        assert!(matches!(
            fx.service.download("tic", "docs\\..\\..\\secreto.txt").await,
            Err(GatewayError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn unregistered_area_uses_raw_id() {
        let fx = fixture();
        std::fs::create_dir_all(fx.share.path().join("bodega")).unwrap();

        assert!(fx.service.list("bodega", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enumeration_failure_is_empty_by_default() {
        let fx = fixture();
        // Exists, but cannot be enumerated.
        std::fs::write(fx.share.path().join("tics"), b"not a directory").unwrap();

        assert!(fx.service.list("tic", "").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn enumeration_failure_can_surface() {
        let fx = fixture_with(
            |cfg| cfg.with_enumeration_failure_as_empty(false),
            Arc::new(session::MountedShareConnector),
        );
        std::fs::write(fx.share.path().join("tics"), b"not a directory").unwrap();

        assert!(matches!(
            fx.service.list("tic", "").await,
            Err(GatewayError::DirectoryRead { .. })
        ));
    }

    #[tokio::test]
    async fn create_folder_then_conflict() {
        let fx = fixture();
        std::fs::create_dir_all(fx.share.path().join("tics")).unwrap();

        fx.service
            .create_folder("tic", "", "Informes 2025", "ana")
            .await
            .unwrap();
        assert!(fx.share.path().join("tics/Informes 2025").is_dir());

        let err = fx
            .service
            .create_folder("tic", "", "Informes 2025", "ana")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Conflict { .. }));

        let log = fx.service.audit_log().read_all().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, "folder-create");
        assert_eq!(log[0].detail, "Informes 2025");
        assert_eq!(log[0].user, "ana");
    }

    #[tokio::test]
    async fn create_folder_rejects_bad_names_and_missing_parent() {
        let fx = fixture();
        std::fs::create_dir_all(fx.share.path().join("tics")).unwrap();

        for bad in ["", "..", "a/b", "a\\b"] {
            assert!(matches!(
                fx.service.create_folder("tic", "", bad, "ana").await,
                Err(GatewayError::InvalidInput(_))
            ));
        }
        assert!(matches!(
            fx.service.create_folder("tic", "no/existe", "nueva", "ana").await,
            Err(GatewayError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn upload_creates_directories_and_is_listed() {
        let fx = fixture();
        let staged = stage(&fx.staging, "C:\\fakepath\\informe.pdf", b"%PDF-1.4 contenido").await;

        fx.service
            .upload("tic", "2025/enero", staged, "ana")
            .await
            .unwrap();

        let entries = fx.service.list("tic", "2025/enero").await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "informe.pdf");
        assert_eq!(entries[0].relative_path, "2025\\enero\\informe.pdf");
        assert_eq!(
            std::fs::read(fx.share.path().join("tics/2025/enero/informe.pdf")).unwrap(),
            b"%PDF-1.4 contenido"
        );

        assert_eq!(std::fs::read_dir(fx.staging.staging_dir()).unwrap().count(), 0);

        let log = fx.service.audit_log().read_all().await.unwrap();
        assert_eq!(log[0].action, "upload");
        assert_eq!(log[0].detail, "informe.pdf");
    }

    #[tokio::test]
    async fn failed_upload_still_discards_staging() {
        let fx = fixture();
        // A file where the destination directory should be.
        std::fs::create_dir_all(fx.share.path().join("tics")).unwrap();
        std::fs::write(fx.share.path().join("tics/2025"), b"file").unwrap();
        let staged = stage(&fx.staging, "informe.pdf", b"bytes").await;

        let err = fx.service.upload("tic", "2025", staged, "ana").await.unwrap_err();
        assert!(matches!(err, GatewayError::Io { .. }));
        assert_eq!(std::fs::read_dir(fx.staging.staging_dir()).unwrap().count(), 0);
        assert!(fx.service.audit_log().read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_opens_files_only() {
        let fx = fixture();
        std::fs::create_dir_all(fx.share.path().join("tics/docs")).unwrap();
        std::fs::write(fx.share.path().join("tics/docs/acta.txt"), b"acta").unwrap();

        let download = fx.service.download("tic", "docs\\acta.txt").await.unwrap();
        assert_eq!(download.size, 4);
        assert_eq!(download.filename, "acta.txt");

        assert!(matches!(
            fx.service.download("tic", "docs").await,
            Err(GatewayError::NotFound { .. })
        ));
        assert!(matches!(
            fx.service.download("tic", "docs/falta.txt").await,
            Err(GatewayError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn area_lifecycle_is_audited() {
        let fx = fixture();

        let (id, outcome) = fx
            .service
            .create_area(
                NewArea {
                    folder_name: "Archivo Central".into(),
                    display_name: "Archivo Central".into(),
                    credential_user: Some("archivo".into()),
                    credential_secret: Some("clave".into()),
                    ..Default::default()
                },
                "admin",
            )
            .await
            .unwrap();
        assert_eq!(id, "archivo-central");
        assert_eq!(outcome, AreaSaveOutcome::Created);

        assert!(fx
            .service
            .verify_area_credentials("archivo-central", "archivo", "clave")
            .await
            .unwrap());
        assert!(!fx
            .service
            .verify_area_credentials("archivo-central", "archivo", "otra")
            .await
            .unwrap());
        assert!(!fx.service.verify_area_credentials("tic", "x", "y").await.unwrap());

        let (_, again) = fx
            .service
            .create_area(
                NewArea {
                    folder_name: "archivo central".into(),
                    display_name: "Duplicado".into(),
                    ..Default::default()
                },
                "admin",
            )
            .await
            .unwrap();
        assert_eq!(again, AreaSaveOutcome::AlreadyExists);

        fx.service
            .update_area(
                "archivo-central",
                AreaUpdate {
                    icon: Some("🗄️".into()),
                    ..Default::default()
                },
                "admin",
            )
            .await
            .unwrap();
        fx.service.delete_area("archivo-central", "admin").await.unwrap();

        let actions: Vec<_> = fx
            .service
            .audit_log()
            .read_all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec!["area-delete", "area-update", "area-create"]);
        assert!(fx.data.path().join("areas.json").exists());
    }

    #[tokio::test]
    async fn denied_call_on_cached_session_reconnects_once() {
        let connector = Arc::new(RecordingConnector::default());
        let fx = fixture_with(|cfg| cfg, connector.clone());
        let address = fx.service.resolve_path("tic", "").await.unwrap();

        fx.service.remote(&address, || async { Ok(()) }).await.unwrap().unwrap();
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);

        let attempts = AtomicUsize::new(0);
        let result = fx
            .service
            .remote(&address, || {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt == 0 {
                        Err(io::Error::new(io::ErrorKind::PermissionDenied, "expired"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result.unwrap(), 1);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failing_session_reports_upstream_unavailable() {
        let connector = Arc::new(RecordingConnector::default());
        connector.failing.store(true, Ordering::SeqCst);
        let fx = fixture_with(|cfg| cfg, connector);

        let err = fx.service.list("tic", "").await.unwrap_err();
        match err {
            GatewayError::UpstreamUnavailable { address, reason } => {
                assert_eq!(address.as_str(), "\\\\10.0.5.20\\tics");
                assert!(reason.contains("logon failure"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn failing_session_does_not_mask_working_share() {
        let connector = Arc::new(RecordingConnector::default());
        connector.failing.store(true, Ordering::SeqCst);
        let fx = fixture_with(|cfg| cfg, connector);
        std::fs::create_dir_all(fx.share.path().join("tics")).unwrap();

        assert!(fx.service.list("tic", "").await.unwrap().is_empty());
    }

    fn short_timeout(timeout: Duration) -> Fixture {
        fixture_with(
            |cfg| cfg.with_remote_timeout(timeout).unwrap(),
            Arc::new(session::MountedShareConnector),
        )
    }

    #[tokio::test]
    async fn timed_out_mutation_is_waited_for_and_undone() {
        let fx = short_timeout(Duration::from_millis(50));
        let address = fx.service.resolve_path("tic", "").await.unwrap();
        let marker = fx.share.path().join("en-curso");

        let err = fx
            .service
            .remote_mutation(&address, {
                let marker = marker.clone();
                move |cancellation: &Cancellation| {
                    std::fs::write(&marker, b"x")?;
                    while !cancellation.is_cancelled() {
                        std::thread::sleep(Duration::from_millis(5));
                    }
                    std::fs::remove_file(&marker)?;
                    cancellation.check()
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::UpstreamUnavailable { .. }));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn late_mutation_success_is_reported() {
        let fx = short_timeout(Duration::from_millis(20));
        let address = fx.service.resolve_path("tic", "").await.unwrap();
        let dir = fx.share.path().join("tardia");

        let result = fx
            .service
            .remote_mutation(&address, {
                let dir = dir.clone();
                move |_: &Cancellation| {
                    std::thread::sleep(Duration::from_millis(200));
                    std::fs::create_dir(&dir)
                }
            })
            .await
            .unwrap();

        assert!(result.is_ok());
        assert!(dir.is_dir());
    }

    #[tokio::test]
    async fn timed_out_upload_leaves_no_unaudited_file() {
        let fx = short_timeout(Duration::from_millis(1));
        let bytes = vec![7u8; 32 * 1024 * 1024];
        let staged = stage(&fx.staging, "grande.bin", &bytes).await;

        let result = fx.service.upload("tic", "", staged, "ana").await;

        let dest = fx.share.path().join("tics/grande.bin");
        let log = fx.service.audit_log().read_all().await.unwrap();
        match result {
            Ok(()) => {
                assert_eq!(std::fs::metadata(&dest).unwrap().len(), bytes.len() as u64);
                assert_eq!(log.len(), 1);
            }
            Err(e) => {
                assert!(matches!(e, GatewayError::UpstreamUnavailable { .. }), "{:?}", e);
                assert!(!dest.exists());
                assert!(log.is_empty());
            }
        }
        let leftovers: Vec<_> = std::fs::read_dir(fx.share.path().join("tics"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name != "grande.bin")
            .collect();
        assert!(leftovers.is_empty(), "{:?}", leftovers);
        assert_eq!(std::fs::read_dir(fx.staging.staging_dir()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn timed_out_folder_create_is_audited_when_it_lands() {
        let fx = short_timeout(Duration::from_nanos(1));
        std::fs::create_dir_all(fx.share.path().join("tics")).unwrap();

        let result = fx.service.create_folder("tic", "", "Actas", "ana").await;

        let created = fx.share.path().join("tics/Actas").is_dir();
        let audited = fx.service.audit_log().read_all().await.unwrap().len() == 1;
        assert_eq!(result.is_ok(), created);
        assert_eq!(created, audited);
    }

    #[tokio::test]
    async fn upload_replaces_existing_file_whole() {
        let fx = fixture();
        std::fs::create_dir_all(fx.share.path().join("tics")).unwrap();
        std::fs::write(fx.share.path().join("tics/acta.txt"), b"version anterior mas larga").unwrap();
        let staged = stage(&fx.staging, "acta.txt", b"nueva").await;

        fx.service.upload("tic", "", staged, "ana").await.unwrap();

        assert_eq!(std::fs::read(fx.share.path().join("tics/acta.txt")).unwrap(), b"nueva");
        assert_eq!(std::fs::read_dir(fx.share.path().join("tics")).unwrap().count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hung_call_times_out() {
        let fx = fixture_with(
            |cfg| cfg.with_remote_timeout(Duration::from_secs(2)).unwrap(),
            Arc::new(session::MountedShareConnector),
        );
        let address = fx.service.resolve_path("tic", "").await.unwrap();

        let err = fx
            .service
            .remote(&address, || std::future::pending::<io::Result<()>>())
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable { .. }));
    }
}
