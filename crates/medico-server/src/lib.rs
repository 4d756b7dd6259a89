//! Medico HTTP API
//!
//! JSON CRUD over the laboratory record store, plus a token login.
//!
//! # Modules
//!
//! - [`config`]: clap CLI and environment configuration
//! - [`resources`]: Generic CRUD handlers and the collection table
//! - [`routes`]: Login, token middleware, health check
//! - [`error`]: `ApiError` and its JSON rendering

pub mod config;
pub mod error;
pub mod extract;
pub mod resources;
pub mod routes;

use std::sync::{Arc, Mutex, MutexGuard};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use medico_core::Database;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::error::ApiError;

/// Shared server state.
///
/// The connection is locked per request and never held across an await.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Database>>,
    require_auth: bool,
}

impl AppState {
    pub fn new(db: Database, require_auth: bool) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            require_auth,
        }
    }

    pub fn db(&self) -> Result<MutexGuard<'_, Database>, ApiError> {
        self.db
            .lock()
            .map_err(|e| ApiError::Internal(format!("Lock poisoned: {}", e)))
    }

    pub fn require_auth(&self) -> bool {
        self.require_auth
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    let protected = resources::routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        routes::auth::require_token,
    ));

    Router::new()
        .route("/health", get(routes::health))
        .route("/login", post(routes::auth::login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
