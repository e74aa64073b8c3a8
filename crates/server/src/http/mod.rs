use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use crate::{AppState, routes};

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(routes::runs::router())
        .merge(routes::progress::router())
        .merge(routes::download::router());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
