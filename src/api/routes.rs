use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::{self, AppState};

/// Build the router. Resource routes are mounted under `base_path`, which is
/// also the base every href in an atomic request is resolved against.
pub fn create_router(state: AppState, base_path: &str) -> Router {
    let api = Router::new()
        // Atomic operations
        .route("/operations", post(handlers::atomic))
        // Resources
        .route("/:resource_type", get(handlers::fetch_many).post(handlers::store))
        .route(
            "/:resource_type/:id",
            get(handlers::fetch_one)
                .patch(handlers::update)
                .delete(handlers::destroy),
        )
        // Relationships
        .route(
            "/:resource_type/:id/relationships/:relationship",
            get(handlers::fetch_relationship)
                .patch(handlers::update_relationship)
                .post(handlers::attach_relationship)
                .delete(handlers::detach_relationship),
        )
        .route("/:resource_type/:id/:related", get(handlers::fetch_related));

    let base_path = base_path.trim_end_matches('/');
    let router = Router::new().route("/health", get(handlers::health_check));
    let router = if base_path.is_empty() {
        router.merge(api)
    } else {
        router.nest(base_path, api)
    };

    router.with_state(state)
}
