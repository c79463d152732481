use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("read source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt data: {0}")]
    Corrupt(String),

    /// A single record could not be decoded. The rest of the stream is still usable.
    #[error("undecodable record: {0}")]
    BadRecord(String),

    #[error("position out of range: {0}")]
    OutOfRange(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub r#type: &'static str,
    pub message: String,
}

impl Error {
    /// Collapse a collaborator failure into the error surfaced by a track query.
    ///
    /// Cancellation and invalid ranges pass through untouched.
    pub fn into_source_unavailable(self) -> Error {
        match self {
            Error::Cancelled | Error::InvalidRange(_) | Error::SourceUnavailable(_) => self,
            other => Error::SourceUnavailable(other.to_string()),
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Error::InvalidRange(_) => "InvalidRange",
            Error::SourceUnavailable(_) => "SourceUnavailable",
            Error::NotFound(_) => "NotFound",
            Error::Corrupt(_) => "Corrupt",
            Error::BadRecord(_) => "BadRecord",
            Error::OutOfRange(_) => "OutOfRange",
            Error::Cancelled => "Cancelled",
            Error::InvalidInput(_) => "InvalidInput",
            Error::Io(_) | Error::Internal(_) => "InternalError",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidRange(_) => StatusCode::BAD_REQUEST,
            Error::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Error::OutOfRange(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::SourceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Cancelled => StatusCode::REQUEST_TIMEOUT,
            Error::Corrupt(_) | Error::BadRecord(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Error::Io(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                r#type: self.error_type(),
                message: self.to_string(),
            },
        };
        (self.status_code(), axum::Json(body)).into_response()
    }
}
