use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all artifact store endpoints.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health_handler))
        .route("/v1/info", get(handler::info_handler))
        .route("/v1/store", post(handler::store_handler))
        .route("/v1/commit", post(handler::commit_handler))
        .route("/v1/retrieve", post(handler::retrieve_handler))
        .route("/v1/list", post(handler::list_handler))
        .route("/v1/tag", post(handler::tag_handler))
        .route("/v1/note", post(handler::note_handler))
        .route("/v1/publish", post(handler::publish_handler))
        .route("/v1/unpublish", post(handler::unpublish_handler))
        .route("/g/", get(handler::download_handler))
        .route("/g/*path", get(handler::download_handler))
        .route("/d/*path", get(handler::download_published_handler))
        .route("/l/*path", get(handler::list_published_handler))
        .route(
            "/blob/:bucket/*object",
            get(handler::blob_get_handler).put(handler::blob_put_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
