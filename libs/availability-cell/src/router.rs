use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::session_middleware;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    // Public routes (token forwarded if the caller sent one)
    let public_routes = Router::new()
        .route(
            "/practitioners/{practitioner_id}/calendar",
            get(handlers::get_practitioner_calendar),
        )
        .route(
            "/practitioners/{practitioner_id}/calendar/check-slot",
            post(handlers::check_practitioner_slot),
        );

    // Protected routes (bearer token required)
    let protected_routes = Router::new()
        .route(
            "/availability",
            get(handlers::get_my_availability).post(handlers::create_availability),
        )
        .route("/availability/bulk", post(handlers::bulk_create_availability))
        .route(
            "/availability/{rule_id}",
            put(handlers::update_availability).delete(handlers::delete_availability),
        )
        .layer(middleware::from_fn(session_middleware));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
