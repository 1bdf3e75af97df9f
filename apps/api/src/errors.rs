use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
/// Every variant renders as `{ "error": "<message>" }`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("No PDF files found. Use 'file' or 'files' in multipart/form-data.")]
    NoFiles,

    #[error("Unsupported file type for \"{file_name}\". Only application/pdf is allowed.")]
    UnsupportedFileType { file_name: String },

    /// Malformed or oversized multipart body; keeps the status the parser chose (400 or 413).
    #[error("Invalid multipart body: {message}")]
    Multipart { status: StatusCode, message: String },

    #[error("Failed to extract text from \"{file_name}\": {reason}")]
    Extraction { file_name: String, reason: String },

    #[error("Model returned empty output.")]
    EmptyModelOutput,

    #[error("Model returned output that is not valid JSON: {0}")]
    InvalidModelOutput(String),

    #[error("Normalization error: {0}")]
    Normalization(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NoFiles | AppError::UnsupportedFileType { .. } => StatusCode::BAD_REQUEST,
            AppError::Multipart { status, .. } => *status,
            AppError::Extraction { .. }
            | AppError::EmptyModelOutput
            | AppError::InvalidModelOutput(_)
            | AppError::Normalization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Normalization(msg) => {
                tracing::error!("Normalization invariant violated: {msg}");
                "The analysis could not be normalized".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "Unexpected error while analyzing PDF(s).".to_string()
            }
            AppError::Extraction { .. }
            | AppError::EmptyModelOutput
            | AppError::InvalidModelOutput(_) => {
                tracing::error!("{self}");
                self.to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_rejections_are_bad_request() {
        assert_eq!(AppError::NoFiles.status(), StatusCode::BAD_REQUEST);
        let unsupported = AppError::UnsupportedFileType {
            file_name: "notes.txt".to_string(),
        };
        assert_eq!(unsupported.status(), StatusCode::BAD_REQUEST);
        assert!(unsupported.to_string().contains("\"notes.txt\""));
    }

    #[test]
    fn test_upstream_failures_are_server_errors() {
        assert_eq!(
            AppError::EmptyModelOutput.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::InvalidModelOutput("eof".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_multipart_error_keeps_parser_status() {
        let too_large = AppError::Multipart {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            message: "length limit exceeded".to_string(),
        };
        assert_eq!(too_large.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(
            too_large.into_response().status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_internal_error_message_is_generic() {
        let response = AppError::Internal(anyhow::anyhow!("secret detail")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
