//! Router assembly.

use axum::extract::DefaultBodyLimit;
use axum::routing::any;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::AppState;

/// Build the application router: the root and one wildcard route, with the
/// method dispatched inside the handler (a 405 decision depends on what the
/// path resolves to).
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", any(handlers::serve))
        .route("/*path", any(handlers::serve))
        // Upload sizes are bounded by the deployment, not the handler.
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
