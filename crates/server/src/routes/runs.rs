use axum::{
    Router,
    extract::{Json, State},
    response::Json as ResponseJson,
    routing::post,
};
use pipeline::{CleanupRequest, GenerationRequest, spawn_cleanup, spawn_generation};
use serde_json::{Value, json};
use url::Url;

use crate::{AppState, error::ApiError};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/cleanup", post(cleanup))
}

/// A PAT is a JWT; anything else is a paste error worth rejecting before a
/// session exists.
fn validate_pat(pat: &str) -> Result<(), ApiError> {
    if pat.is_empty() {
        return Err(ApiError::BadRequest("DevOrg PAT is required".to_string()));
    }
    if !pat.starts_with("ey") {
        return Err(ApiError::BadRequest(
            "Invalid PAT format. The PAT should start with \"ey\"".to_string(),
        ));
    }
    Ok(())
}

fn validate_generation(request: &GenerationRequest) -> Result<(), ApiError> {
    validate_pat(&request.devorg_pat)?;
    Url::parse(&request.website_url)
        .map_err(|_| ApiError::BadRequest("Invalid website URL".to_string()))?;
    if let Some(kb_url) = &request.knowledgebase_url {
        Url::parse(kb_url)
            .map_err(|_| ApiError::BadRequest("Invalid knowledge base URL".to_string()))?;
    }
    if request.num_articles < 2 {
        return Err(ApiError::BadRequest(
            "numArticles must be at least 2".to_string(),
        ));
    }
    if request.num_issues < 2 {
        return Err(ApiError::BadRequest(
            "numIssues must be at least 2".to_string(),
        ));
    }
    Ok(())
}

async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Result<ResponseJson<Value>, ApiError> {
    validate_generation(&request)?;

    let session_id = state.sessions.create();
    tracing::info!(session_id = %session_id, website = %request.website_url, "generation run accepted");
    spawn_generation(
        state.sessions.clone(),
        state.adapters.clone(),
        session_id,
        request,
    );

    Ok(ResponseJson(json!({ "sessionId": session_id })))
}

async fn cleanup(
    State(state): State<AppState>,
    Json(request): Json<CleanupRequest>,
) -> Result<ResponseJson<Value>, ApiError> {
    validate_pat(&request.devorg_pat)?;

    let session_id = state.sessions.create();
    tracing::info!(session_id = %session_id, "cleanup run accepted");
    spawn_cleanup(
        state.sessions.clone(),
        state.adapters.clone(),
        session_id,
        request,
    );

    Ok(ResponseJson(json!({ "sessionId": session_id })))
}
