use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_doctor))
        .route("/", get(handlers::search_doctors))
        .route("/promote", post(handlers::promote_to_doctor))
        .route("/available-times", post(handlers::add_available_time))
        .route("/available-times", get(handlers::list_available_times))
        .route("/available-times/{id}", delete(handlers::remove_available_time))
        .route("/reviews", post(handlers::create_review))
        .route("/reviews", get(handlers::list_reviews))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}", put(handlers::update_doctor))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
