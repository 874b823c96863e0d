use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors raised while resolving and serving a request.
#[derive(Debug, Error)]
pub enum HostError {
    /// The relative path would resolve outside its mount's base directory.
    #[error("path escapes mount base")]
    PathEscape,

    /// No configured mount key is a prefix of the request path.
    #[error("no mount matches: {0}")]
    MountNotFound(String),

    /// The resolved path does not exist as a regular file.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    /// The configuration file could not be parsed.
    #[error("config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// HTTP status this error maps to. Path escapes deliberately read as
    /// 404 so probing requests learn nothing about the filesystem layout.
    pub fn status(&self) -> StatusCode {
        match self {
            HostError::PathEscape => StatusCode::NOT_FOUND,
            HostError::MountNotFound(_) => StatusCode::NOT_FOUND,
            HostError::NotFound(_) => StatusCode::NOT_FOUND,
            HostError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            HostError::ConfigParse(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HostError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for HostError {
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}
