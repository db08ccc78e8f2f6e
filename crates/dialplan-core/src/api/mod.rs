//! REST API for dialplan-core

pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::admin::AdminService;
use crate::engine::ResolutionEngine;
use crate::store::DialplanStore;

pub use error::{ApiError, ApiResult, ErrorResponse};

/// Shared state of the HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ResolutionEngine>,
    pub admin: Arc<AdminService>,
    pub store: Arc<dyn DialplanStore>,
}

impl AppState {
    pub fn new(engine: Arc<ResolutionEngine>, admin: Arc<AdminService>, store: Arc<dyn DialplanStore>) -> Self {
        Self { engine, admin, store }
    }
}

/// Create the REST API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::health_check))
        // Resolution
        .route("/api/v1/resolve", post(handlers::resolve))
        // Inbound routes
        .route("/api/v1/routes", get(handlers::list_routes).post(handlers::create_route))
        .route(
            "/api/v1/routes/:phone",
            get(handlers::get_route)
                .put(handlers::update_route)
                .delete(handlers::delete_route),
        )
        // Dialplans
        .route("/api/v1/dialplans", get(handlers::list_plans).post(handlers::create_plan))
        .route(
            "/api/v1/dialplans/:id",
            get(handlers::get_plan)
                .put(handlers::update_plan)
                .delete(handlers::delete_plan),
        )
        .route("/api/v1/identity-cache/:phone", delete(handlers::invalidate_caller))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
