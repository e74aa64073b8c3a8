use axum::{
    Router,
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new().route("/download/{session_id}", get(download_log))
}

/// The session's full log as a plain-text attachment.
async fn download_log(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let log = state.sessions.log_artifact(session_id)?;

    let headers = [
        (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"session_{session_id}.log\""),
        ),
    ];
    Ok((headers, log))
}
