use api_shared::ErrorRes;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use share_core::GatewayError;
use share_files::FilesError;

/// A failed request: the status plus the JSON body the client renders.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorRes,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            body: ErrorRes {
                success: false,
                message: message.into(),
                address: None,
            },
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Maps a gateway failure, logging it under `context`.
    pub fn from_gateway(context: &str, e: GatewayError) -> Self {
        let status = status_for(&e);
        if status.is_server_error() {
            tracing::error!("{} error: {:?}", context, e);
        } else {
            tracing::debug!("{} rejected: {}", context, e);
        }

        Self {
            status,
            body: ErrorRes {
                success: false,
                message: e.to_string(),
                address: e.address().map(ToString::to_string),
            },
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!("request body rejected: {}", rejection.body_text());
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn status_for(e: &GatewayError) -> StatusCode {
    match e {
        GatewayError::NotFound { .. } | GatewayError::AreaNotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::Conflict { .. } => StatusCode::CONFLICT,
        GatewayError::InvalidInput(_) | GatewayError::Staging(FilesError::InvalidFilename(_)) => {
            StatusCode::BAD_REQUEST
        }
        GatewayError::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
