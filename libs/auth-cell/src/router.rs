use std::sync::Arc;

use axum::{routing::post, Router};

use shared_config::AppConfig;

use crate::handlers;

pub fn auth_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/validate", post(handlers::validate))
        .route("/verify", post(handlers::verify))
        .with_state(state)
}
