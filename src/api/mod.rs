//! HTTP API module - REST endpoints and WebSocket

mod auth;
mod extract;
mod spaces;
mod websocket;

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::accounts::AccountService;
use crate::db::Database;
use crate::presence::{PresenceHub, RoomRegistry};
use crate::spaces::SpaceStore;
pub use extract::AuthUser;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub accounts: Arc<AccountService>,
    pub spaces: Arc<SpaceStore>,
    pub presence: PresenceHub,
}

/// Build the API router around an existing room registry
pub fn router(db: Arc<Database>, registry: Arc<RoomRegistry>) -> Router {
    let accounts = Arc::new(AccountService::new(db.pool().clone()));
    let spaces = Arc::new(SpaceStore::new(db.pool().clone()));
    let presence = PresenceHub::new(registry, accounts.clone(), spaces.clone());

    let state = AppState {
        db,
        accounts,
        spaces,
        presence,
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
        .route("/ws", get(websocket::ws_handler))
        .nest("/api/v1", auth::router().merge(spaces::router()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

/// Error body shared by all endpoints
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub(crate) fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Root endpoint
async fn root() -> impl IntoResponse {
    Json(RootResponse {
        name: "spaced",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let rooms = state.presence.registry.room_count();
    match state.db.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "ok",
                rooms,
            }),
        ),
        Err(_) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "unhealthy",
                database: "error",
                rooms,
            }),
        ),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    rooms: usize,
}
