use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new().route("/progress/{session_id}", get(progress))
}

/// Polling endpoint for the form: flat JSON, `error` only when set.
async fn progress(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<ResponseJson<Value>, ApiError> {
    let snapshot = state.sessions.snapshot(session_id)?;

    let mut body = json!({
        "progress": snapshot.progress,
        "status": snapshot.status,
        "complete": snapshot.complete,
    });
    if let Some(error) = snapshot.error {
        body["error"] = json!(error);
    }
    Ok(ResponseJson(body))
}
