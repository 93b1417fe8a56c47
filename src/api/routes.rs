use axum::{
    routing::{get, post},
    Router,
};

use crate::api::handlers::AppState;
use crate::api::{branch_handlers, handlers};
use crate::store::traits::DatabaseStore;

pub fn create_router<S: DatabaseStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Database lifecycle
        .route("/api/db/:org", get(handlers::list_databases::<S>))
        .route(
            "/api/db/:org/:db",
            post(handlers::create_database::<S>)
                .delete(handlers::delete_database::<S>)
                .get(handlers::get_database::<S>),
        )
        // Branches, addressed by absolute descriptor
        .route(
            "/api/branch/*path",
            post(branch_handlers::create_branch::<S>).delete(branch_handlers::delete_branch::<S>),
        )
        // Remotes
        .route(
            "/api/remote/:org/:db",
            post(handlers::add_remote::<S>)
                .put(handlers::set_remote::<S>)
                .get(handlers::get_remote::<S>)
                .delete(handlers::delete_remote::<S>),
        )
}
