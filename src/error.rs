//! Service error type and its HTTP mapping.
//!
//! Every handler returns [`Result<T>`]; failures render as
//!
//! ```json
//! { "error": { "code": "embedding_error", "message": "..." } }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Text could not be extracted from one file. The indexing run skips
    /// the file and reports it.
    #[error("failed to extract '{filename}': {message}")]
    Extraction { filename: String, message: String },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("vector store error: {0}")]
    VectorStore(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("conversation memory error: {0}")]
    Memory(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("an indexing run is already in progress")]
    IndexInProgress,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn extraction(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            filename: filename.into(),
            message: message.into(),
        }
    }

    pub fn embedding(message: impl std::fmt::Display) -> Self {
        Self::Embedding(message.to_string())
    }

    pub fn vector_store(message: impl std::fmt::Display) -> Self {
        Self::VectorStore(message.to_string())
    }

    pub fn generation(message: impl std::fmt::Display) -> Self {
        Self::Generation(message.to_string())
    }

    pub fn memory(message: impl std::fmt::Display) -> Self {
        Self::Memory(message.to_string())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// HTTP status and stable machine-readable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Error::IndexInProgress => (StatusCode::CONFLICT, "index_in_progress"),
            Error::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding_error"),
            Error::Generation(_) => (StatusCode::BAD_GATEWAY, "generation_error"),
            Error::VectorStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "vector_store_error"),
            Error::Memory(_) => (StatusCode::INTERNAL_SERVER_ERROR, "memory_error"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            Error::Extraction { .. } | Error::Io(_) | Error::Json(_) | Error::Http(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            Error::bad_request("x").status_and_code(),
            (StatusCode::BAD_REQUEST, "bad_request")
        );
        assert_eq!(
            Error::IndexInProgress.status_and_code().0,
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::embedding("down").status_and_code(),
            (StatusCode::BAD_GATEWAY, "embedding_error")
        );
        assert_eq!(
            Error::generation("down").status_and_code(),
            (StatusCode::BAD_GATEWAY, "generation_error")
        );
        assert_eq!(
            Error::memory("disk").status_and_code().1,
            "memory_error"
        );
    }

    #[test]
    fn test_extraction_message_names_file() {
        let err = Error::extraction("a.pdf", "bad xref");
        assert_eq!(err.to_string(), "failed to extract 'a.pdf': bad xref");
    }
}
