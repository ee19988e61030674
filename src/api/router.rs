use axum::{
    http::HeaderName,
    middleware,
    routing::{get, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::documents;
use super::health;
use super::middleware::{logging_middleware, REQUEST_ID_HEADER};
use super::state::AppState;
use super::stores;

/// Create the full router with application state
pub fn create_router_with_state(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/ready", get(health::ready_check))
        .route("/live", get(health::live_check))
        // Documents
        .route(
            "/documents",
            get(documents::search_documents)
                .post(documents::add_document)
                .delete(documents::delete_document),
        )
        // Stores
        .route("/stores", get(stores::list_stores).post(stores::get_store))
        .route("/stores/{store_id}/chunks", get(stores::list_chunks))
        .route(
            "/stores/{store_id}/chunks/{document_id}/{chunk_id}",
            put(stores::update_chunk).delete(stores::delete_chunk),
        )
        .with_state(state)
        .layer(middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(cors)
}
