use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Structured error type for the application. Variants map one-to-one onto
/// HTTP status codes so API handlers can `?` their way out.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to start command server: {message}")]
    ProcessStart { message: String },

    /// The command server could not be reached (or timed out).
    #[error("command server unreachable: {message}")]
    Transport { message: String },

    /// The command server answered, but not with anything we can parse.
    #[error("malformed response from command server: {message}")]
    Protocol { message: String },

    #[error("speaker '{name}' not found")]
    SpeakerNotFound { name: String },

    #[error("macro '{name}' not found")]
    MacroNotFound { name: String },

    #[error("invalid macro: {message}")]
    MacroValidation { message: String },

    #[error("library cache refresh failed: {message}")]
    CacheRefresh { message: String },

    #[error("a library cache refresh is already running")]
    RefreshInProgress,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::SpeakerNotFound { .. } | AppError::MacroNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            AppError::MacroValidation { .. } => StatusCode::BAD_REQUEST,
            AppError::RefreshInProgress => StatusCode::CONFLICT,
            AppError::Transport { .. } | AppError::Protocol { .. } => StatusCode::BAD_GATEWAY,
            AppError::ProcessStart { .. }
            | AppError::CacheRefresh { .. }
            | AppError::Io(_)
            | AppError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    ok: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            ok: false,
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(
            AppError::SpeakerNotFound { name: "Den".into() }.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(AppError::RefreshInProgress.status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::MacroValidation {
                message: "missing parameter".into()
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Transport {
                message: "connection refused".into()
            }
            .status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
