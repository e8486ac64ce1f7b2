use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("unsupported file type: {file_name}")]
    UnsupportedFileType { file_name: String },

    #[error("malformed questions payload: {0}")]
    MalformedQuestionsPayload(String),

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("missing multipart field `{0}`")]
    MissingField(&'static str),

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] axum::extract::multipart::MultipartError),

    #[error("model endpoint unreachable: {0}")]
    ModelEndpointUnreachable(#[source] reqwest::Error),

    #[error("model endpoint returned {status}: {body}")]
    ModelStatus { status: u16, body: String },

    #[error("malformed model response: {0}")]
    ModelResponseMalformed(String),

    #[error("model reported an error: {0}")]
    ModelReportedError(String),

    #[error("model call timed out")]
    ModelTimeout,

    #[error("staging file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::UnsupportedFileType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::MalformedQuestionsPayload(_)
            | AppError::MissingField(_)
            | AppError::Multipart(_) => StatusCode::BAD_REQUEST,
            AppError::MalformedDocument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ModelEndpointUnreachable(_)
            | AppError::ModelStatus { .. }
            | AppError::ModelResponseMalformed(_)
            | AppError::ModelReportedError(_) => StatusCode::BAD_GATEWAY,
            AppError::ModelTimeout => StatusCode::GATEWAY_TIMEOUT,
            AppError::Io(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a transport error from the model call. Timeouts get their own
    /// variant, everything else means the endpoint could not be talked to.
    pub fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AppError::ModelTimeout
        } else {
            AppError::ModelEndpointUnreachable(e)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = status.as_u16(), "request failed: {}", self);
        } else {
            warn!(status = status.as_u16(), "request rejected: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
