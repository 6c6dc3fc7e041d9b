use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use harbour_content::ContentError;
use harbour_meta::MetaError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Challenge sent with every 401 from the transfer API.
pub const LFS_AUTHENTICATE: &str = "Basic realm=\"harbour\"";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error(transparent)]
    Content(#[from] ContentError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not acceptable: {0}")]
    NotAcceptable(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Meta(e) => match e {
                MetaError::Unauthorized => StatusCode::UNAUTHORIZED,
                MetaError::ObjectNotFound(_) | MetaError::ProjectNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                MetaError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
                MetaError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                MetaError::Backend(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Content(e) => match e {
                ContentError::NotFound(_) => StatusCode::NOT_FOUND,
                ContentError::SizeMismatch { .. } | ContentError::HashMismatch { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ContentError::Backend(_) | ContentError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotAcceptable(_) => StatusCode::NOT_ACCEPTABLE,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        } else if status == StatusCode::UNPROCESSABLE_ENTITY {
            warn!(error = %self, "upload rejected");
        }

        let message = match status {
            StatusCode::UNAUTHORIZED => "Credentials needed".to_string(),
            _ => self.to_string(),
        };
        let mut response = (status, Json(json!({ "message": message }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::HeaderName::from_static("lfs-authenticate"),
                HeaderValue::from_static(LFS_AUTHENTICATE),
            );
        }
        response
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
