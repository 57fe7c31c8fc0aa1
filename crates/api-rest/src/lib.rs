//! # API REST
//!
//! REST API for the remote share gateway.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON and multipart bodies, streamed downloads, CORS)
//!
//! Uses `api-shared` for request/response types and `share-core` for every operation.

#![warn(rust_2018_idioms)]

mod error;

pub use error::{status_for, ApiError};

use api_shared::{
    AreaRes, AuditEntryRes, CreateAreaReq, CreateAreaRes, CreateFolderReq, ErrorRes,
    FileEntryRes, HealthRes, HealthService, LoginReq, SuccessRes, UpdateAreaReq, UploadForm,
};
use axum::{
    body::Body,
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path as AxumPath, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use share_core::{
    AreaDescriptor, AreaSaveOutcome, AreaUpdate, AuditLogEntry, FileEntry, GatewayError,
    GatewayService, NewArea,
};
use share_files::{StagedFile, StagingService};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::{IntoParams, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

/// `Json` whose rejections are reported as a 400 with the usual error body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
struct JsonBody<T>(T);

/// Recorded as the acting user when a request does not name one.
pub const UNKNOWN_USER: &str = "unknown";

/// Application state for the REST API server
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<GatewayService>,
    pub staging: StagingService,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        list_areas,
        create_area,
        update_area,
        delete_area,
        login_area,
        list_files,
        download,
        upload,
        create_folder,
        list_audit,
    ),
    components(schemas(
        HealthRes,
        SuccessRes,
        ErrorRes,
        AreaRes,
        CreateAreaReq,
        CreateAreaRes,
        UpdateAreaReq,
        LoginReq,
        FileEntryRes,
        CreateFolderReq,
        UploadForm,
        AuditEntryRes,
    ))
)]
pub struct ApiDoc;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FilesQuery {
    /// Path inside the area; `/` and `\` both separate segments.
    subpath: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DownloadQuery {
    /// `relativePath` of a listed file.
    path: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActorQuery {
    /// Who performed the change, for the audit log.
    actor: Option<String>,
}

/// Builds the gateway router.
///
/// `max_upload_bytes` bounds the body of `POST /upload`; other routes keep axum's default limit.
pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/areas", get(list_areas).post(create_area))
        .route("/areas/:id", put(update_area).delete(delete_area))
        .route("/areas/:id/login", post(login_area))
        .route("/files/:area_id", get(list_files))
        .route("/download/:area_id", get(download))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/folders", post(create_folder))
        .route("/audit", get(list_audit))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/areas",
    responses(
        (status = 200, description = "Registered areas", body = [AreaRes]),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// List the registered areas
///
/// Returns the built-in set until an area is created, updated or deleted. Credentials are
/// reported only as `hasCredentials`.
#[axum::debug_handler]
async fn list_areas(State(state): State<AppState>) -> Result<Json<Vec<AreaRes>>, ApiError> {
    let areas = state
        .gateway
        .areas()
        .await
        .map_err(|e| ApiError::from_gateway("List areas", e))?;
    Ok(Json(areas.iter().map(area_res).collect()))
}

#[utoipa::path(
    post,
    path = "/areas",
    request_body = CreateAreaReq,
    responses(
        (status = 200, description = "Area created, or already present", body = CreateAreaRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Register a new area
///
/// The area id is derived from `folderName`. Creating an area whose id already exists leaves
/// the registry unchanged and reports `created: false`.
#[axum::debug_handler]
async fn create_area(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateAreaReq>,
) -> Result<Json<CreateAreaRes>, ApiError> {
    let actor = actor_or_unknown(req.actor);
    let new_area = NewArea {
        folder_name: req.folder_name,
        display_name: req.display_name,
        icon: req.icon,
        credential_user: req.user,
        credential_secret: req.secret,
    };

    let (id, outcome) = state
        .gateway
        .create_area(new_area, &actor)
        .await
        .map_err(|e| ApiError::from_gateway("Create area", e))?;

    Ok(Json(CreateAreaRes {
        success: true,
        id,
        created: outcome == AreaSaveOutcome::Created,
    }))
}

#[utoipa::path(
    put,
    path = "/areas/{id}",
    request_body = UpdateAreaReq,
    params(("id" = String, Path, description = "Area id")),
    responses(
        (status = 200, description = "Area updated", body = AreaRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "Area not found", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn update_area(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    JsonBody(req): JsonBody<UpdateAreaReq>,
) -> Result<Json<AreaRes>, ApiError> {
    let actor = actor_or_unknown(req.actor);
    let update = AreaUpdate {
        name: req.name,
        icon: req.icon,
        folder: req.folder,
        credential_user: req.user,
        credential_secret: req.secret,
    };

    let updated = state
        .gateway
        .update_area(&id, update, &actor)
        .await
        .map_err(|e| ApiError::from_gateway("Update area", e))?;
    Ok(Json(area_res(&updated)))
}

#[utoipa::path(
    delete,
    path = "/areas/{id}",
    params(("id" = String, Path, description = "Area id"), ActorQuery),
    responses(
        (status = 200, description = "Area removed from the registry", body = SuccessRes),
        (status = 404, description = "Area not found", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Remove an area from the registry
///
/// The folder on the share is left untouched.
#[axum::debug_handler]
async fn delete_area(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<ActorQuery>,
) -> Result<Json<SuccessRes>, ApiError> {
    let actor = actor_or_unknown(query.actor);
    state
        .gateway
        .delete_area(&id, &actor)
        .await
        .map_err(|e| ApiError::from_gateway("Delete area", e))?;
    Ok(Json(SuccessRes { success: true }))
}

#[utoipa::path(
    post,
    path = "/areas/{id}/login",
    request_body = LoginReq,
    params(("id" = String, Path, description = "Area id")),
    responses(
        (status = 200, description = "Whether the credentials match", body = SuccessRes),
        (status = 404, description = "Area not found", body = ErrorRes)
    )
)]
/// Check a user/secret pair against the credentials stored on an area
#[axum::debug_handler]
async fn login_area(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    JsonBody(req): JsonBody<LoginReq>,
) -> Result<Json<SuccessRes>, ApiError> {
    let success = state
        .gateway
        .verify_area_credentials(&id, &req.user, &req.secret)
        .await
        .map_err(|e| ApiError::from_gateway("Area login", e))?;
    Ok(Json(SuccessRes { success }))
}

#[utoipa::path(
    get,
    path = "/files/{area_id}",
    params(("area_id" = String, Path, description = "Area id"), FilesQuery),
    responses(
        (status = 200, description = "Directory contents, folders first", body = [FileEntryRes]),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "Directory not found", body = ErrorRes),
        (status = 502, description = "Remote share unavailable", body = ErrorRes)
    )
)]
/// List a directory inside an area
#[axum::debug_handler]
async fn list_files(
    State(state): State<AppState>,
    AxumPath(area_id): AxumPath<String>,
    Query(query): Query<FilesQuery>,
) -> Result<Json<Vec<FileEntryRes>>, ApiError> {
    let entries = state
        .gateway
        .list(&area_id, query.subpath.as_deref().unwrap_or_default())
        .await
        .map_err(|e| ApiError::from_gateway("List files", e))?;
    Ok(Json(entries.into_iter().map(file_entry_res).collect()))
}

#[utoipa::path(
    get,
    path = "/download/{area_id}",
    params(("area_id" = String, Path, description = "Area id"), DownloadQuery),
    responses(
        (status = 200, description = "File contents as application/octet-stream"),
        (status = 404, description = "File not found", body = ErrorRes)
    )
)]
/// Stream a file from an area as an attachment
#[axum::debug_handler]
async fn download(
    State(state): State<AppState>,
    AxumPath(area_id): AxumPath<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let download = state
        .gateway
        .download(&area_id, query.path.as_deref().unwrap_or_default())
        .await
        .map_err(|e| ApiError::from_gateway("Download", e))?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(download.size));
    let disposition = format!(
        "attachment; filename=\"{}\"",
        download.filename.replace('"', "")
    );
    if let Ok(value) = HeaderValue::from_bytes(disposition.as_bytes()) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    let body = Body::from_stream(ReaderStream::new(download.file));
    Ok((StatusCode::OK, headers, body).into_response())
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "File stored on the share", body = SuccessRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 500, description = "Write error", body = ErrorRes),
        (status = 502, description = "Remote share unavailable", body = ErrorRes)
    )
)]
/// Upload a file into an area
///
/// The `file` part is staged locally while it streams in, then copied onto the share.
/// Missing directories below the area folder are created.
#[axum::debug_handler]
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SuccessRes>, ApiError> {
    let mut form = UploadParts::default();
    if let Err(e) = form.read(&state.staging, &mut multipart).await {
        form.discard().await;
        return Err(e);
    }

    let Some(area_id) = form.area_id.take().filter(|a| !a.trim().is_empty()) else {
        form.discard().await;
        return Err(ApiError::bad_request("areaId is required"));
    };
    let Some(staged) = form.staged.take() else {
        return Err(ApiError::bad_request("file is required"));
    };

    state
        .gateway
        .upload(
            &area_id,
            form.current_path.as_deref().unwrap_or_default(),
            staged,
            &actor_or_unknown(form.user),
        )
        .await
        .map_err(|e| ApiError::from_gateway("Upload", e))?;
    Ok(Json(SuccessRes { success: true }))
}

#[utoipa::path(
    post,
    path = "/folders",
    request_body = CreateFolderReq,
    responses(
        (status = 200, description = "Folder created", body = SuccessRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 404, description = "Parent directory not found", body = ErrorRes),
        (status = 409, description = "Folder already exists", body = ErrorRes),
        (status = 502, description = "Remote share unavailable", body = ErrorRes)
    )
)]
/// Create a folder inside an area
#[axum::debug_handler]
async fn create_folder(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CreateFolderReq>,
) -> Result<Json<SuccessRes>, ApiError> {
    state
        .gateway
        .create_folder(
            &req.area_id,
            req.current_path.as_deref().unwrap_or_default(),
            &req.name,
            &actor_or_unknown(req.user),
        )
        .await
        .map_err(|e| ApiError::from_gateway("Create folder", e))?;
    Ok(Json(SuccessRes { success: true }))
}

#[utoipa::path(
    get,
    path = "/audit",
    responses(
        (status = 200, description = "Audit log, newest first", body = [AuditEntryRes]),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Read the audit log
#[axum::debug_handler]
async fn list_audit(State(state): State<AppState>) -> Result<Json<Vec<AuditEntryRes>>, ApiError> {
    let entries = state
        .gateway
        .audit_log()
        .read_all()
        .await
        .map_err(|e| ApiError::from_gateway("Read audit log", e))?;
    Ok(Json(entries.into_iter().map(audit_entry_res).collect()))
}

/// Fields of an upload form collected so far.
#[derive(Default)]
struct UploadParts {
    staged: Option<StagedFile>,
    area_id: Option<String>,
    current_path: Option<String>,
    user: Option<String>,
}

impl UploadParts {
    async fn read(
        &mut self,
        staging: &StagingService,
        multipart: &mut Multipart,
    ) -> Result<(), ApiError> {
        while let Some(mut field) = multipart.next_field().await.map_err(bad_multipart)? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "file" => {
                    let filename = field.file_name().unwrap_or_default().to_owned();
                    let mut writer = staging
                        .begin(&filename)
                        .await
                        .map_err(|e| ApiError::from_gateway("Upload", GatewayError::from(e)))?;

                    loop {
                        match field.chunk().await {
                            Ok(Some(chunk)) => {
                                if let Err(e) = writer.write_chunk(&chunk).await {
                                    writer.abort().await;
                                    return Err(ApiError::from_gateway("Upload", e.into()));
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                writer.abort().await;
                                return Err(bad_multipart(e));
                            }
                        }
                    }

                    let staged = writer
                        .finish()
                        .await
                        .map_err(|e| ApiError::from_gateway("Upload", e.into()))?;
                    if let Some(previous) = self.staged.replace(staged) {
                        discard_staged(previous).await;
                    }
                }
                "areaId" => self.area_id = Some(field.text().await.map_err(bad_multipart)?),
                "currentPath" => {
                    self.current_path = Some(field.text().await.map_err(bad_multipart)?)
                }
                "user" => self.user = Some(field.text().await.map_err(bad_multipart)?),
                _ => {}
            }
        }
        Ok(())
    }

    async fn discard(&mut self) {
        if let Some(staged) = self.staged.take() {
            discard_staged(staged).await;
        }
    }
}

async fn discard_staged(staged: StagedFile) {
    if let Err(e) = staged.discard().await {
        tracing::warn!("{}", e);
    }
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::bad_request(format!("invalid multipart body: {}", e))
}

fn actor_or_unknown(user: Option<String>) -> String {
    user.filter(|u| !u.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_USER.to_owned())
}

fn area_res(area: &AreaDescriptor) -> AreaRes {
    AreaRes {
        id: area.id.clone(),
        name: area.name.clone(),
        icon: area.icon.clone(),
        folder: area.folder.clone(),
        has_credentials: area.has_credentials(),
    }
}

fn file_entry_res(entry: FileEntry) -> FileEntryRes {
    FileEntryRes {
        id: entry.id,
        name: entry.name,
        date: entry.date,
        size: entry.size,
        kind: entry.kind,
        relative_path: entry.relative_path,
    }
}

fn audit_entry_res(entry: AuditLogEntry) -> AuditEntryRes {
    AuditEntryRes {
        id: entry.id,
        area: entry.area,
        user: entry.user,
        action: entry.action,
        detail: entry.detail,
        time: entry.time.to_rfc3339(),
    }
}
