//! Error types for the API layer.
//!
//! [`ApiError`] unifies all failure modes into a single enum that can be
//! converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cartograph_core::WorkspaceError;

/// Errors that can occur in the API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The workspace rejected or failed the command.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// The workspace task is gone or dropped the request.
    #[error("workspace unavailable: {0}")]
    Unavailable(String),

    /// The request itself is malformed.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Workspace(WorkspaceError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Workspace(WorkspaceError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Workspace(
                WorkspaceError::RemoteWriteFailed { .. } | WorkspaceError::RemoteLoadFailed(_),
            )
            | Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use cartograph_core::ValidationError;
    use cartograph_types::FeatureId;

    use super::*;

    #[test]
    fn statuses_follow_the_error_kind() {
        let not_found = ApiError::from(WorkspaceError::NotFound(FeatureId::from("f1")));
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let invalid = ApiError::from(WorkspaceError::Validation(
            ValidationError::UnsupportedFileType {
                file_name: String::from("a.kml"),
            },
        ));
        assert_eq!(
            invalid.into_response().status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );

        let gone = ApiError::Unavailable(String::from("closed"));
        assert_eq!(gone.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
