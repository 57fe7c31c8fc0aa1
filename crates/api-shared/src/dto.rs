//! Request and response bodies.
//!
//! Field names follow the browser client (`areaId`, `currentPath`, `relativePath`, ...).

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Generic outcome of a mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SuccessRes {
    pub success: bool,
}

/// Error body returned with every non-2xx status.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub success: bool,
    pub message: String,
    /// Remote share address the failing operation targeted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

/// An area as shown to clients. Credentials are never included.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AreaRes {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub folder: String,
    pub has_credentials: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAreaReq {
    pub folder_name: String,
    pub display_name: String,
    #[serde(default)]
    pub icon: Option<String>,
    /// Credential user for the area login check.
    #[serde(default)]
    pub user: Option<String>,
    /// Credential secret for the area login check.
    #[serde(default)]
    pub secret: Option<String>,
    /// Who performed the change, for the audit log.
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CreateAreaRes {
    pub success: bool,
    pub id: String,
    /// `false` when an area with the same id already existed.
    pub created: bool,
}

/// Partial update; absent fields are left unchanged.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UpdateAreaReq {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub folder: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub actor: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LoginReq {
    pub user: String,
    pub secret: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileEntryRes {
    pub id: usize,
    pub name: String,
    /// Modification date (`YYYY-MM-DD`), or `---` when unavailable.
    pub date: String,
    /// Size such as `2.50 MB`, or `-` for folders.
    pub size: String,
    /// `FOLDER`, the uppercase extension, or `FILE`.
    #[serde(rename = "type")]
    pub kind: String,
    pub relative_path: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateFolderReq {
    pub area_id: String,
    #[serde(default)]
    pub current_path: Option<String>,
    pub name: String,
    #[serde(default)]
    pub user: Option<String>,
}

/// Multipart body of `POST /upload`.
#[derive(Clone, Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    pub area_id: String,
    pub current_path: Option<String>,
    pub user: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AuditEntryRes {
    pub id: i64,
    pub area: String,
    pub user: String,
    pub action: String,
    pub detail: String,
    /// RFC 3339 timestamp.
    pub time: String,
}
