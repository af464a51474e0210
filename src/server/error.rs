//! Error responses.

use crate::api::Reason;
use crate::auth::{AuthError, ClientError};
use crate::install::InstallError;
use crate::store::StoreError;
use crate::sync::SyncError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};

/// Any failure of a request, rendered as a [`Reason`] body
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body or query could not be used
    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Install(#[from] InstallError),
}

fn store_status(err: &StoreError) -> StatusCode {
    match err {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) | StoreError::AlreadyExists(_) => StatusCode::CONFLICT,
        StoreError::Status { code, .. } => {
            StatusCode::from_u16(*code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        }
        StoreError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Auth(AuthError::MissingCredential) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Sync(e) if e.is_client_error() => StatusCode::BAD_REQUEST,
            ApiError::Sync(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Store(e) => store_status(e),
            ApiError::Install(e) => match e {
                InstallError::MissingToken => StatusCode::BAD_REQUEST,
                InstallError::InvalidToken | InstallError::TokenExpiredOrUsed => {
                    StatusCode::UNAUTHORIZED
                }
                InstallError::NoServiceAccountToken { .. } => StatusCode::SERVICE_UNAVAILABLE,
                InstallError::Store(e) => store_status(e),
                InstallError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            warn!(status = status.as_u16(), error = %self, "Request rejected");
        }
        let reason = Reason {
            reason: self.to_string().replace('"', "'"),
        };
        (status, Json(reason)).into_response()
    }
}
