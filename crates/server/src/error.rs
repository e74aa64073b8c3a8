use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sessions::SessionError;
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound => ApiError::NotFound("Invalid session ID".to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match &self {
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Internal(msg) => {
                msg.clone()
            }
        };

        if status_code.is_server_error() {
            tracing::error!(status = %status_code, error = %self, "API request failed");
        }
        let response = ApiResponse::<()>::error(&message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_maps_to_expected_http_statuses() {
        assert_eq!(
            ApiError::BadRequest("bad".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("missing".to_string())
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Internal("boom".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn unknown_sessions_become_not_found() {
        assert_eq!(
            ApiError::from(SessionError::NotFound)
                .into_response()
                .status(),
            StatusCode::NOT_FOUND
        );
    }
}
